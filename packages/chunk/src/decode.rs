use crate::block_state::{Properties, StateLookup};
use crate::chunk::{Chunk, Range};
use crate::encode::SerialisedData;
use crate::encoding::{decode_paletted_storage, Encoding, PaletteKind};
use crate::error::Error;
use crate::paletted_storage::PalettedStorage;
use crate::sub_chunk::SubChunk;
use bedrock_nbt as nbt;
use bedrock_nbt::Compound;

/// Decode a chunk from the byte strings read out of the world database.
///
/// Empty sub chunk entries are slots that had no key in the database; they
/// stay filled with air.
pub fn disk_decode(
    data: &SerialisedData,
    lookup: &dyn StateLookup,
    range: Range,
) -> Result<Chunk, Error> {
    let air = lookup
        .runtime_id("minecraft:air", &Properties::new())
        .ok_or(Error::UnknownState { name: "minecraft:air".into(), properties: Properties::new() })?;

    let mut c = Chunk::new(air, range);
    decode_biomes(&mut &data.biomes[..], &mut c, Encoding::Disk, lookup)?;
    for (i, sub) in data.sub_chunks.iter().enumerate() {
        if sub.is_empty() {
            continue;
        }
        let mut index = i as u8;
        let decoded = decode_sub_chunk(&mut &sub[..], air, range, &mut index, Encoding::Disk, lookup)?;
        let slot = c
            .sub_chunks_mut()
            .get_mut(index as usize)
            .ok_or(Error::InvalidSubChunkIndex(index))?;
        *slot = decoded;
    }
    Ok(c)
}

/// Decode a chunk from the network serialised form.
///
/// `sub_chunk_count` is the count from the LevelChunk packet. With
/// `old_biomes`, the stream ends in a flat 256-byte `(x, z)` biome array that
/// is replicated across the whole Y range instead of 3D biome storages. With
/// `hashed_rids`, palette entries are network block hashes and are translated
/// through the lookup; hashes the lookup does not know collapse to air.
///
/// Whatever trails the chunk data is an open-ended stream of block entity
/// compounds, returned alongside the chunk.
pub fn network_decode(
    air: u32,
    data: &[u8],
    sub_chunk_count: usize,
    old_biomes: bool,
    hashed_rids: bool,
    lookup: &dyn StateLookup,
    range: Range,
) -> Result<(Chunk, Vec<Compound>), Error> {
    let mut c = Chunk::new(air, range);
    let r = &mut &data[..];

    for i in 0..sub_chunk_count {
        let mut index = i as u8;
        let mut sub = decode_sub_chunk(r, air, range, &mut index, Encoding::Network, lookup)?;
        if hashed_rids {
            for storage in sub.layers_mut() {
                storage
                    .palette_mut()
                    .replace(|hash| lookup.runtime_id_from_hash(hash).unwrap_or(air));
            }
        }
        let slot = c
            .sub_chunks_mut()
            .get_mut(index as usize)
            .ok_or(Error::InvalidSubChunkIndex(index))?;
        *slot = sub;
    }

    if old_biomes {
        if r.len() < 256 {
            return Err(Error::ShortRead);
        }
        let (biomes, rest) = r.split_at(256);
        *r = rest;
        for x in 0..16u8 {
            for z in 0..16u8 {
                let id = biomes[(x as usize & 15) | ((z as usize & 15) << 4)];
                for y in range.min()..=range.max() {
                    c.set_biome(x, y, z, id as u32);
                }
            }
        }
    } else {
        let mut last: Option<PalettedStorage> = None;
        for i in 0..c.biomes().len() {
            let b = decode_paletted_storage(r, Encoding::Network, PaletteKind::Biomes, lookup)?;
            let storage = match b {
                Some(b) => {
                    last = Some(b.clone());
                    b
                }
                None => match &last {
                    Some(last) => last.clone(),
                    None => return Err(Error::InvalidPaletteReference),
                },
            };
            c.biomes_mut()[i] = storage;
        }
    }

    let mut block_entities = Vec::new();
    while !r.is_empty() {
        let map = nbt::read_compound(r, nbt::Encoding::NetworkLittleEndian)?;
        if !map.is_empty() {
            block_entities.push(map);
        }
    }
    Ok((c, block_entities))
}

/// Decode one sub chunk.
///
/// Version 1 carries a single implicit layer. Version 8 adds an explicit
/// layer count; version 9 additionally carries the sub chunk's own Y index,
/// which overwrites `index` when present.
pub fn decode_sub_chunk(
    r: &mut &[u8],
    air: u32,
    range: Range,
    index: &mut u8,
    e: Encoding,
    lookup: &dyn StateLookup,
) -> Result<SubChunk, Error> {
    let (&version, rest) = r.split_first().ok_or(Error::ShortRead)?;
    *r = rest;

    match version {
        1 => {
            let storage = decode_block_storage(r, e, lookup)?;
            Ok(SubChunk::with_storages(air, vec![storage]))
        }
        8 | 9 => {
            let (&count, rest) = r.split_first().ok_or(Error::ShortRead)?;
            *r = rest;
            if version == 9 {
                let (&y, rest) = r.split_first().ok_or(Error::ShortRead)?;
                *r = rest;
                // The byte on disk is the sub chunk's absolute Y coordinate
                // divided by 16, not its index within the chunk.
                *index = ((y as i8 as i32) - (range.min() >> 4)) as u8;
            }
            let mut storages = Vec::with_capacity(count as usize);
            for _ in 0..count {
                storages.push(decode_block_storage(r, e, lookup)?);
            }
            Ok(SubChunk::with_storages(air, storages))
        }
        version => Err(Error::UnknownVersion(version)),
    }
}

fn decode_block_storage(
    r: &mut &[u8],
    e: Encoding,
    lookup: &dyn StateLookup,
) -> Result<PalettedStorage, Error> {
    // The inherit marker has no meaning in a block storage.
    decode_paletted_storage(r, e, PaletteKind::Blocks, lookup)?
        .ok_or(Error::InvalidBitsPerIndex(0x7f))
}

/// Decode the biome storages of a disk chunk. An empty buffer leaves the
/// chunk's default biomes in place; otherwise one storage per sub chunk is
/// read, where all but the first may be the inherit marker.
pub(crate) fn decode_biomes(
    r: &mut &[u8],
    c: &mut Chunk,
    e: Encoding,
    lookup: &dyn StateLookup,
) -> Result<(), Error> {
    if r.is_empty() {
        return Ok(());
    }
    let mut last: Option<PalettedStorage> = None;
    for i in 0..c.biomes().len() {
        let b = decode_paletted_storage(r, e, PaletteKind::Biomes, lookup)?;
        let storage = match b {
            Some(b) => {
                last = Some(b.clone());
                b
            }
            None => match &last {
                Some(last) => last.clone(),
                None => return Err(Error::InvalidPaletteReference),
            },
        };
        c.biomes_mut()[i] = storage;
    }
    Ok(())
}
