//! fingerprint-map: a single-threaded hash map keyed by dynamically typed
//! values, where key identity is decided by a canonical fingerprint rather
//! than by the key's representation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map that accepts any `Value` as a key: absent values,
//!   booleans, numbers, text, patterns, timestamps, sequences (compared
//!   element-wise, recursively) and opaque objects (compared by identity).
//! - Layers:
//!   - classify: assigns each value a `Category`.
//!   - fingerprint: turns a key into a `Digest` (hash code + fingerprint)
//!     in a single post-order pass over an explicit stack, so nesting
//!     depth costs heap rather than call stack. Objects get a surrogate id from
//!     `identity`.
//!   - hash: the string and sequence hash functions behind the digest.
//!   - BucketStore<V>: fixed-geometry trie of bucket layers. Each slot is
//!     empty, the head of a collision chain, or a deeper layer. Chains
//!     live in a `slotmap` arena.
//!   - ValueMap<V>: public API. Computes the digest once per call, keeps
//!     the live size, offers bulk construction and copying.
//!
//! Constraints
//! - Single-threaded: `Value` holds `Rc` and the surrogate registry is
//!   thread-local.
//! - Two keys are the same key iff their fingerprints are equal. Hash
//!   codes only route; collisions are resolved by fingerprint.
//! - Integral floats and integers are the same key (`1` and `1.0`); text
//!   never equals a number (`"1"` and `1` differ).
//! - Lookups never assign identities: probing with an object that was
//!   never stored misses without touching the registry.
//! - The last key stored under a fingerprint is the one reported by
//!   enumeration.
//!
//! Enumeration
//! - Order is by layer slot index, depth first, and by chain position
//!   within a slot. It is stable while the map is not mutated and is not
//!   insertion order.
//! - Iterators borrow the map, so the map cannot change mid-iteration.
//!   `entries()` returns an owned snapshot for callers that need to mutate
//!   while walking.
//!
//! Notes and non-goals
//! - No resizing: the layout is fixed when the store is created.
//! - No thread safety and no persistence.
//! - Mutating an object's properties does not change its key; mutating a
//!   sequence is impossible (`Rc<[Value]>`).

pub mod bucket_store;
mod bucket_store_proptest;
pub mod classify;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod identity;
pub mod value;
pub mod value_map;

// Public surface
pub use classify::{classify, Absence, Category};
pub use config::Layout;
pub use error::{ConfigError, InsertError};
pub use fingerprint::{Digest, Fingerprint};
pub use value::{ObjectKind, ObjectRef, Pattern, Value};
pub use value_map::ValueMap;
