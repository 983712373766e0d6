use crate::block_state::Properties;
use thiserror::Error;

/// Everything that can go wrong while encoding or decoding chunk data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of chunk data")]
    ShortRead,
    #[error("unknown sub chunk version {0}")]
    UnknownVersion(u8),
    #[error("invalid bits per index {0}")]
    InvalidBitsPerIndex(u8),
    #[error("first biome storage pointed to previous one")]
    InvalidPaletteReference,
    #[error("invalid palette entry count {0}")]
    InvalidPaletteLength(i32),
    #[error("packed index {index} out of range for palette of length {len}")]
    IndexOutOfRange { index: u32, len: usize },
    #[error("sub chunk y index {0} outside the dimension range")]
    InvalidSubChunkIndex(u8),
    #[error("no runtime id for block state {name} {properties:?}")]
    UnknownState { name: String, properties: Properties },
    #[error("no block state for runtime id {0}")]
    UnknownRuntimeId(u32),
    #[error(transparent)]
    Nbt(#[from] bedrock_nbt::Error),
}
