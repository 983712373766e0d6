use crate::block_state::{BlockState, StateLookup};
use crate::error::Error;
use crate::paletted_storage::{Palette, PalettedStorage};
use bedrock_nbt as nbt;
use bedrock_nbt::varint::{read_vari32, write_vari32};

/// How a paletted storage is framed.
///
/// The three families share the word layout and differ in how the palette is
/// serialised: full NBT state records on disk and in network-persistent
/// streams, raw varint runtime IDs on the network. The low bit of the leading
/// width byte tells a network decoder which of the latter two it is looking
/// at.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Encoding {
    Disk,
    Network,
    NetworkPersistent,
}

impl Encoding {
    /// The flag mixed into the low bit of the leading width byte.
    pub(crate) fn network_bit(self) -> u8 {
        matches!(self, Encoding::Network) as u8
    }

    fn nbt_encoding(self) -> nbt::Encoding {
        match self {
            Encoding::Disk => nbt::Encoding::LittleEndian,
            Encoding::Network | Encoding::NetworkPersistent => nbt::Encoding::NetworkLittleEndian,
        }
    }
}

/// Whether a storage's palette holds block runtime IDs or biome IDs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PaletteKind {
    Blocks,
    Biomes,
}

impl PaletteKind {
    pub(crate) fn capacity(self) -> usize {
        match self {
            PaletteKind::Blocks => PalettedStorage::BLOCKS,
            PaletteKind::Biomes => PalettedStorage::BIOMES,
        }
    }
}

/// Width byte value marking "reuse the previous storage". Only biome storages
/// may carry it, and never as the first of a chunk.
const INHERIT: u8 = 0x7f;

/// Append the inherit marker for the given framing.
pub(crate) fn write_inherit(out: &mut Vec<u8>, e: Encoding) {
    out.push((INHERIT << 1) | e.network_bit());
}

/// Decode one paletted storage. `Ok(None)` is the inherit marker.
pub(crate) fn decode_paletted_storage(
    r: &mut &[u8],
    mut e: Encoding,
    kind: PaletteKind,
    lookup: &dyn StateLookup,
) -> Result<Option<PalettedStorage>, Error> {
    let (&header, rest) = r.split_first().ok_or(Error::ShortRead)?;
    *r = rest;

    if e == Encoding::Network && header & 1 != 1 {
        e = Encoding::NetworkPersistent;
    }
    let bits_per_index = header >> 1;
    if bits_per_index == INHERIT {
        return Ok(None);
    }
    if !crate::paletted_storage::valid_bits_per_index(bits_per_index) {
        return Err(Error::InvalidBitsPerIndex(bits_per_index));
    }

    let word_count = PalettedStorage::word_count(bits_per_index, kind.capacity());
    let byte_count = word_count * 4;
    if r.len() < byte_count {
        return Err(Error::ShortRead);
    }
    let (data, rest) = r.split_at(byte_count);
    *r = rest;
    let words = data
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();

    let palette = decode_palette(r, e, kind, bits_per_index, lookup)?;
    Ok(Some(PalettedStorage::new(bits_per_index, kind.capacity(), words, palette)?))
}

fn decode_palette(
    r: &mut &[u8],
    e: Encoding,
    kind: PaletteKind,
    bits_per_index: u8,
    lookup: &dyn StateLookup,
) -> Result<Palette, Error> {
    let count = if bits_per_index == 0 {
        1
    } else {
        let count = match e {
            Encoding::Disk => {
                if r.len() < 4 {
                    return Err(Error::ShortRead);
                }
                let (data, rest) = r.split_at(4);
                *r = rest;
                i32::from_le_bytes([data[0], data[1], data[2], data[3]])
            }
            Encoding::Network | Encoding::NetworkPersistent => read_vari32(r)?,
        };
        if count <= 0 {
            return Err(Error::InvalidPaletteLength(count));
        }
        count as usize
    };

    let mut values = Vec::with_capacity(count.min(kind.capacity()));
    for _ in 0..count {
        values.push(decode_palette_entry(r, e, kind, lookup)?);
    }
    Ok(Palette::with_values(values))
}

fn decode_palette_entry(
    r: &mut &[u8],
    e: Encoding,
    kind: PaletteKind,
    lookup: &dyn StateLookup,
) -> Result<u32, Error> {
    match (kind, e) {
        (PaletteKind::Blocks, Encoding::Disk) | (PaletteKind::Blocks, Encoding::NetworkPersistent) => {
            let map = nbt::read_compound(r, e.nbt_encoding())?;
            let state = BlockState::from_nbt(&map).ok_or_else(|| Error::UnknownState {
                name: String::new(),
                properties: Default::default(),
            })?;
            lookup
                .runtime_id(&state.name, &state.properties)
                .ok_or(Error::UnknownState { name: state.name, properties: state.properties })
        }
        (PaletteKind::Blocks, Encoding::Network) => Ok(read_vari32(r)? as u32),
        (PaletteKind::Biomes, Encoding::Disk) => {
            if r.len() < 4 {
                return Err(Error::ShortRead);
            }
            let (data, rest) = r.split_at(4);
            *r = rest;
            Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
        }
        (PaletteKind::Biomes, Encoding::Network)
        | (PaletteKind::Biomes, Encoding::NetworkPersistent) => Ok(read_vari32(r)? as u32),
    }
}

/// Append one paletted storage in the given framing.
pub(crate) fn encode_paletted_storage(
    out: &mut Vec<u8>,
    storage: &PalettedStorage,
    e: Encoding,
    kind: PaletteKind,
    lookup: &dyn StateLookup,
) -> Result<(), Error> {
    out.push((storage.bits_per_index() << 1) | e.network_bit());
    for word in storage.words() {
        out.extend_from_slice(&word.to_le_bytes());
    }

    if storage.bits_per_index() != 0 {
        let len = storage.palette().len() as i32;
        match e {
            Encoding::Disk => out.extend_from_slice(&len.to_le_bytes()),
            Encoding::Network | Encoding::NetworkPersistent => write_vari32(out, len),
        }
    }
    for &value in storage.palette().values() {
        encode_palette_entry(out, value, e, kind, lookup)?;
    }
    Ok(())
}

fn encode_palette_entry(
    out: &mut Vec<u8>,
    value: u32,
    e: Encoding,
    kind: PaletteKind,
    lookup: &dyn StateLookup,
) -> Result<(), Error> {
    match (kind, e) {
        (PaletteKind::Blocks, Encoding::Disk) | (PaletteKind::Blocks, Encoding::NetworkPersistent) => {
            let state = lookup.state(value).ok_or(Error::UnknownRuntimeId(value))?;
            nbt::write_compound(out, "", &state.to_nbt(), e.nbt_encoding());
            Ok(())
        }
        (PaletteKind::Blocks, Encoding::Network) => {
            write_vari32(out, value as i32);
            Ok(())
        }
        (PaletteKind::Biomes, Encoding::Disk) => {
            out.extend_from_slice(&value.to_le_bytes());
            Ok(())
        }
        (PaletteKind::Biomes, Encoding::Network)
        | (PaletteKind::Biomes, Encoding::NetworkPersistent) => {
            write_vari32(out, value as i32);
            Ok(())
        }
    }
}
