//! Bucket store geometry.

use crate::error::ConfigError;

pub const DEFAULT_WIDTH_BITS: u32 = 8;
pub const DEFAULT_DEPTH: u32 = 2;
pub const MAX_WIDTH_BITS: u32 = 16;

/// Geometry of a bucket store: every layer has `1 << width_bits` slots and
/// there are at most `depth` layers on any path. Fixed for the lifetime of
/// a store.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Layout {
    width_bits: u32,
    depth: u32,
}

impl Layout {
    pub const fn new() -> Self {
        Self {
            width_bits: DEFAULT_WIDTH_BITS,
            depth: DEFAULT_DEPTH,
        }
    }

    pub const fn with_width_bits(mut self, width_bits: u32) -> Self {
        self.width_bits = width_bits;
        self
    }

    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.width_bits == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        if self.depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.width_bits > MAX_WIDTH_BITS {
            return Err(ConfigError::WidthTooLarge {
                width_bits: self.width_bits,
                max: MAX_WIDTH_BITS,
            });
        }
        if self.width_bits * self.depth > 32 {
            return Err(ConfigError::TooWide {
                width_bits: self.width_bits,
                depth: self.depth,
            });
        }
        Ok(self)
    }

    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn slots(&self) -> usize {
        1usize << self.width_bits
    }

    pub(crate) fn mask(&self) -> u32 {
        (1u32 << self.width_bits) - 1
    }

    /// Slot index of `hash` at `level` (0 = top layer).
    #[inline]
    pub(crate) fn slot(&self, hash: i32, level: u32) -> usize {
        ((hash as u32 >> (level * self.width_bits)) & self.mask()) as usize
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}
