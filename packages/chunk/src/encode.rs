use crate::block_state::StateLookup;
use crate::chunk::{Chunk, Range};
use crate::encoding::{encode_paletted_storage, write_inherit, Encoding, PaletteKind};
use crate::error::Error;
use crate::paletted_storage::PalettedStorage;
use crate::sub_chunk::SubChunk;

/// Version byte written ahead of every serialised sub chunk. Versions 1 and 8
/// are still decoded, but everything we write is version 9: explicit layer
/// count, explicit signed Y index.
pub const SUB_CHUNK_VERSION: u8 = 9;

/// A chunk as a set of byte strings, one per sub chunk plus one for the biome
/// storages, matching how the world database stores them.
#[derive(Debug, Clone, Default)]
pub struct SerialisedData {
    pub sub_chunks: Vec<Vec<u8>>,
    pub biomes: Vec<u8>,
}

/// Serialise a chunk in the given framing.
pub fn encode(c: &Chunk, e: Encoding, lookup: &dyn StateLookup) -> Result<SerialisedData, Error> {
    let mut sub_chunks = Vec::with_capacity(c.sub_chunks().len());
    for (i, sub) in c.sub_chunks().iter().enumerate() {
        sub_chunks.push(encode_sub_chunk(sub, e, c.range(), i, lookup)?);
    }
    Ok(SerialisedData { sub_chunks, biomes: encode_biomes(c.biomes(), e, lookup)? })
}

/// Serialise one sub chunk. `index` is its position within the chunk, from
/// which the signed on-disk Y byte is derived.
pub fn encode_sub_chunk(
    sub: &SubChunk,
    e: Encoding,
    range: Range,
    index: usize,
    lookup: &dyn StateLookup,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    out.push(SUB_CHUNK_VERSION);
    out.push(sub.layers().len() as u8);
    out.push((index as i32 + (range.min() >> 4)) as i8 as u8);
    for storage in sub.layers() {
        encode_paletted_storage(&mut out, storage, e, PaletteKind::Blocks, lookup)?;
    }
    Ok(out)
}

/// Serialise the biome storages in ascending sub chunk order, collapsing each
/// storage equal to its predecessor into the inherit marker.
pub(crate) fn encode_biomes(
    biomes: &[PalettedStorage],
    e: Encoding,
    lookup: &dyn StateLookup,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut previous: Option<&PalettedStorage> = None;
    for storage in biomes {
        if previous.is_some_and(|p| p == storage) {
            write_inherit(&mut out, e);
        } else {
            encode_paletted_storage(&mut out, storage, e, PaletteKind::Biomes, lookup)?;
        }
        previous = Some(storage);
    }
    Ok(out)
}
