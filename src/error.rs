//! Error types.

use thiserror::Error;

/// Failure to insert a key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    #[error("object key is not extensible and has no surrogate identity yet")]
    KeyNotExtensible,

    #[error("unpaired key: {count} arguments given, expected key/value pairs")]
    UnpairedKey { count: usize },
}

/// Invalid bucket layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("layer width must be at least one bit")]
    ZeroWidth,

    #[error("layout must have at least one layer")]
    ZeroDepth,

    #[error("layer width of {width_bits} bits exceeds the maximum of {max}")]
    WidthTooLarge { width_bits: u32, max: u32 },

    #[error("{depth} layers of {width_bits} bits exceed the 32-bit hash")]
    TooWide { width_bits: u32, depth: u32 },
}
