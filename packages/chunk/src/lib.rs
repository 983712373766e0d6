//! In-memory chunk columns and the Bedrock chunk codec.
//!
//! A chunk is a 16xHx16 column of block runtime IDs split into 16-block-tall
//! sub chunks, each holding one or more layers of bit-packed paletted storage,
//! plus one biome storage per sub chunk. This crate owns the binary format of
//! those storages (disk, network and network-persistent framings) and the
//! sub chunk and biome serialisation built on top of them.
//!
//! The codec never talks to a block registry directly. Everything that needs
//! to translate between `(name, properties)` pairs and runtime IDs goes
//! through the [`StateLookup`] trait passed in by the caller.

mod block_state;
mod chunk;
mod decode;
mod encode;
mod encoding;
mod error;
mod paletted_storage;
mod sub_chunk;

pub use self::{
    block_state::{BlockState, Properties, PropertyValue, StateLookup, CURRENT_BLOCK_VERSION},
    chunk::{Chunk, Range},
    decode::{decode_sub_chunk, disk_decode, network_decode},
    encode::{encode, encode_sub_chunk, SerialisedData, SUB_CHUNK_VERSION},
    encoding::{Encoding, PaletteKind},
    error::Error,
    paletted_storage::{Palette, PalettedStorage},
    sub_chunk::SubChunk,
};
