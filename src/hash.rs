//! 32-bit hash codes for bucket placement.
//!
//! Scalars hash their rendered fingerprint text with the classic
//! `h = h * 31 + unit` polynomial over UTF-16 code units. Sequences combine
//! the already computed element hashes with positional weights, so a
//! composite key is never re-rendered to text.

use core::fmt;

/// Positional weights cycle after this many elements.
pub const WEIGHT_TABLE_LEN: usize = 256;

const MODULUS: u64 = 2_147_483_647;

/// `WEIGHTS[i]` is the `i`-th odd prime raised to the power `i + 1`,
/// modulo 2^31 - 1.
static WEIGHTS: [i32; WEIGHT_TABLE_LEN] = build_weights();

const fn is_prime(n: u64) -> bool {
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

const fn pow_mod(base: u64, mut exp: u64) -> u64 {
    let mut acc = 1;
    let mut b = base % MODULUS;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * b % MODULUS;
        }
        b = b * b % MODULUS;
        exp >>= 1;
    }
    acc
}

const fn build_weights() -> [i32; WEIGHT_TABLE_LEN] {
    let mut table = [0i32; WEIGHT_TABLE_LEN];
    let mut i = 0;
    let mut candidate = 3;
    while i < WEIGHT_TABLE_LEN {
        if is_prime(candidate) {
            table[i] = pow_mod(candidate, i as u64 + 1) as i32;
            i += 1;
        }
        candidate += 2;
    }
    table
}

/// Weight applied to the element at `position`.
#[inline]
pub fn weight(position: usize) -> i32 {
    WEIGHTS[position & (WEIGHT_TABLE_LEN - 1)]
}

/// Streaming form of [`string_hash`]. Implements `fmt::Write` so numbers
/// can be hashed through their `Display` text without allocating.
#[derive(Copy, Clone, Debug, Default)]
pub struct StringHasher {
    h: i32,
}

impl StringHasher {
    pub const fn new() -> Self {
        Self { h: 0 }
    }

    /// Feeds the `Display` text of `value`.
    pub fn push_display(&mut self, value: &dyn fmt::Display) -> &mut Self {
        // `write_str` below never fails, so neither does this.
        fmt::write(self, format_args!("{}", value)).ok();
        self
    }

    #[inline]
    pub fn push_str(&mut self, s: &str) -> &mut Self {
        for unit in s.encode_utf16() {
            self.h = self.h.wrapping_mul(31).wrapping_add(i32::from(unit));
        }
        self
    }

    #[inline]
    pub fn push_char(&mut self, c: char) -> &mut Self {
        let mut buf = [0u16; 2];
        for unit in c.encode_utf16(&mut buf) {
            self.h = self.h.wrapping_mul(31).wrapping_add(i32::from(*unit));
        }
        self
    }

    pub fn finish(&self) -> i32 {
        self.h
    }
}

impl fmt::Write for StringHasher {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

pub fn string_hash(s: &str) -> i32 {
    StringHasher::new().push_str(s).finish()
}

/// Combine element hashes: start from the length, add each hash times
/// its positional weight.
pub fn sequence_hash<I>(len: usize, element_hashes: I) -> i32
where
    I: IntoIterator<Item = i32>,
{
    element_hashes
        .into_iter()
        .enumerate()
        .fold(len as i32, |h, (i, eh)| {
            h.wrapping_add(eh.wrapping_mul(weight(i)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    /// Invariant: matches the classic 31-polynomial string hash.
    #[test]
    fn string_hash_matches_polynomial() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
        // Well-known value for "hello" under this scheme.
        assert_eq!(string_hash("hello"), 99_162_322);
        // Non-BMP characters hash as two UTF-16 units.
        let mut h = StringHasher::new();
        h.push_char('\u{1F600}');
        assert_eq!(h.finish(), string_hash("\u{1F600}"));
    }

    /// Invariant: formatting into the hasher equals hashing the text.
    #[test]
    fn fmt_write_equals_text_hash() {
        let mut h = StringHasher::new();
        write!(h, "{}", -12345i64).unwrap();
        assert_eq!(h.finish(), string_hash("-12345"));
    }

    /// Invariant: the weight table holds odd prime powers, cycles every 256
    /// positions, and reordering distinct elements changes the hash.
    #[test]
    fn weights_cycle_and_order_matters() {
        assert_eq!(weight(0), 3);
        assert_eq!(weight(1), 25);
        assert_eq!(weight(2), 343);
        assert_eq!(weight(WEIGHT_TABLE_LEN), weight(0));
        assert_eq!(weight(WEIGHT_TABLE_LEN + 7), weight(7));
        assert!(WEIGHTS.iter().all(|&w| w > 0));

        let a = sequence_hash(2, [string_hash("x"), string_hash("y")]);
        let b = sequence_hash(2, [string_hash("y"), string_hash("x")]);
        assert_ne!(a, b);
        assert_eq!(sequence_hash(0, [0i32; 0]), 0);
        assert_eq!(sequence_hash(3, [0, 0, 0]), 3);
    }
}
