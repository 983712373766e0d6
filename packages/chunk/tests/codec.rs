//! Round trips and wire-level cases for the chunk codec.

use bedrock_nbt::{write_compound, Value};
use chunk::{
    disk_decode, encode, encode_sub_chunk, network_decode, BlockState, Chunk, Encoding, Error,
    Properties, PropertyValue, Range, SerialisedData, StateLookup,
};

/// Offset applied to runtime IDs to fake network block hashes in tests.
const HASH_OFFSET: u32 = 7700;

struct TestStates {
    states: Vec<BlockState>,
}

impl TestStates {
    fn new() -> TestStates {
        let mut states = vec![
            BlockState::new("minecraft:air"),
            BlockState::new("minecraft:stone"),
            BlockState::new("minecraft:grass"),
            BlockState::new("minecraft:water").with("liquid_depth", PropertyValue::I32(0)),
        ];
        for dirt_type in ["normal", "coarse"] {
            states.push(
                BlockState::new("minecraft:dirt")
                    .with("dirt_type", PropertyValue::String(dirt_type.into())),
            );
        }
        for axis in ["x", "y", "z"] {
            states.push(
                BlockState::new("minecraft:log")
                    .with("pillar_axis", PropertyValue::String(axis.into()))
                    .with("stripped_bit", PropertyValue::U8(0)),
            );
        }
        TestStates { states }
    }

    fn rid(&self, name: &str) -> u32 {
        self.states.iter().position(|s| s.name == name).unwrap() as u32
    }
}

impl StateLookup for TestStates {
    fn runtime_id(&self, name: &str, properties: &Properties) -> Option<u32> {
        self.states
            .iter()
            .position(|s| s.name == name && &s.properties == properties)
            .map(|i| i as u32)
    }

    fn state(&self, runtime_id: u32) -> Option<&BlockState> {
        self.states.get(runtime_id as usize)
    }

    fn runtime_id_from_hash(&self, hash: u32) -> Option<u32> {
        hash.checked_sub(HASH_OFFSET).filter(|&rid| (rid as usize) < self.states.len())
    }
}

fn sample_chunk(states: &TestStates, range: Range) -> Chunk {
    let air = states.rid("minecraft:air");
    let stone = states.rid("minecraft:stone");
    let grass = states.rid("minecraft:grass");
    let water = states.rid("minecraft:water");
    let log = states.rid("minecraft:log");

    let mut c = Chunk::new(air, range);
    for x in 0..16 {
        for z in 0..16 {
            c.set_block(x, range.min(), z, 0, stone);
            c.set_block(x, range.min() + 1, z, 0, grass);
        }
    }
    // A waterlogged log two sub chunks up.
    c.set_block(4, range.min() + 40, 9, 0, log);
    c.set_block(4, range.min() + 40, 9, 1, water);

    c.set_biome(0, range.min(), 0, 1);
    c.set_biome(15, range.max(), 15, 21);
    c
}

#[test]
fn disk_round_trip() {
    let states = TestStates::new();
    let c = sample_chunk(&states, Range(-64, 319));
    let data = encode(&c, Encoding::Disk, &states).unwrap();
    let back = disk_decode(&data, &states, c.range()).unwrap();
    assert_eq!(c, back);
}

#[test]
fn network_persistent_round_trip() {
    let states = TestStates::new();
    let c = sample_chunk(&states, Range(0, 255));
    let data = encode(&c, Encoding::NetworkPersistent, &states).unwrap();
    // Network-persistent streams are decoded through the network path, which
    // sniffs the persistence bit off each storage header.
    let mut buf = Vec::new();
    for sub in &data.sub_chunks {
        buf.extend_from_slice(sub);
    }
    buf.extend_from_slice(&data.biomes);
    let (back, block_entities) =
        network_decode(c.air(), &buf, c.sub_chunks().len(), false, false, &states, c.range())
            .unwrap();
    assert_eq!(c, back);
    assert!(block_entities.is_empty());
}

#[test]
fn network_round_trip_with_block_entities() {
    let states = TestStates::new();
    let c = sample_chunk(&states, Range(0, 127));
    let data = encode(&c, Encoding::Network, &states).unwrap();

    let mut buf = Vec::new();
    for sub in &data.sub_chunks {
        buf.extend_from_slice(sub);
    }
    buf.extend_from_slice(&data.biomes);

    let mut chest = bedrock_nbt::Compound::new();
    chest.insert("id".into(), Value::String("Chest".into()));
    chest.insert("x".into(), Value::Int(4));
    chest.insert("y".into(), Value::Int(40));
    chest.insert("z".into(), Value::Int(9));
    write_compound(&mut buf, "", &chest, bedrock_nbt::Encoding::NetworkLittleEndian);

    let (back, block_entities) =
        network_decode(c.air(), &buf, c.sub_chunks().len(), false, false, &states, c.range())
            .unwrap();
    assert_eq!(c, back);
    assert_eq!(block_entities, vec![chest]);
}

#[test]
fn network_decode_remaps_hashed_rids() {
    let states = TestStates::new();
    let air = states.rid("minecraft:air");
    let range = Range(0, 127);

    // Build a chunk whose "runtime IDs" are actually network hashes. The
    // network framing writes palette entries verbatim, so encoding it gives
    // us a hashed-palette stream.
    let real = sample_chunk(&states, range);
    let mut hashed = Chunk::new(air + HASH_OFFSET, range);
    for (i, sub) in real.sub_chunks().iter().enumerate() {
        for (layer, storage) in sub.layers().iter().enumerate() {
            for pos in 0..4096 {
                let y = range.sub_y(i) + (pos & 15) as i32;
                let (x, z) = ((pos >> 8) as u8, ((pos >> 4) & 15) as u8);
                hashed.set_block(x, y, z, layer, storage.at(pos) + HASH_OFFSET);
            }
        }
    }
    let data = encode(&hashed, Encoding::Network, &states).unwrap();
    let mut buf = Vec::new();
    for sub in &data.sub_chunks {
        buf.extend_from_slice(sub);
    }
    buf.extend_from_slice(&data.biomes);

    let (back, _) =
        network_decode(air, &buf, range.sub_chunk_count(), false, true, &states, range).unwrap();
    for (i, sub) in real.sub_chunks().iter().enumerate() {
        for (layer, storage) in sub.layers().iter().enumerate() {
            for pos in 0..4096 {
                assert_eq!(back.sub_chunks()[i].layers()[layer].at(pos), storage.at(pos));
            }
        }
    }
}

#[test]
fn legacy_2d_biomes_replicate_vertically() {
    let states = TestStates::new();
    let air = states.rid("minecraft:air");
    let range = Range(0, 127);
    let c = Chunk::new(air, range);

    let data = encode(&c, Encoding::Network, &states).unwrap();
    let mut buf = Vec::new();
    for sub in &data.sub_chunks {
        buf.extend_from_slice(sub);
    }
    // Flat (x, z) biome array of plains.
    buf.extend_from_slice(&[1u8; 256]);

    let (back, _) =
        network_decode(air, &buf, range.sub_chunk_count(), true, false, &states, range).unwrap();
    for y in [0, 13, 64, 127] {
        for (x, z) in [(0, 0), (7, 3), (15, 15)] {
            assert_eq!(back.biome(x, y, z), 1, "biome at {x} {y} {z}");
        }
    }
}

// A single-value biome storage on disk: zero-width header, no words, one
// little-endian palette entry.
fn biome_storage_bytes(biome: u32) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend_from_slice(&biome.to_le_bytes());
    out
}

#[test]
fn biome_inherit_reuses_previous_storage() {
    let states = TestStates::new();
    let range = Range(0, 127);

    let mut biomes = biome_storage_bytes(9);
    for _ in 1..range.sub_chunk_count() {
        biomes.push(0xfe);
    }
    let data = SerialisedData { sub_chunks: vec![Vec::new(); range.sub_chunk_count()], biomes };
    let c = disk_decode(&data, &states, range).unwrap();
    for storage in c.biomes() {
        assert_eq!(storage.at(0), 9);
    }
}

#[test]
fn biome_inherit_as_first_storage_fails() {
    let states = TestStates::new();
    let range = Range(0, 127);
    let data = SerialisedData {
        sub_chunks: vec![Vec::new(); range.sub_chunk_count()],
        biomes: vec![0xfe],
    };
    assert!(matches!(
        disk_decode(&data, &states, range),
        Err(Error::InvalidPaletteReference)
    ));
}

#[test]
fn sub_chunk_version_9_carries_its_own_y_index() {
    let states = TestStates::new();
    let range = Range(-64, 319);
    let c = sample_chunk(&states, range);

    let encoded = encode_sub_chunk(&c.sub_chunks()[0], Encoding::Disk, range, 0, &states).unwrap();
    assert_eq!(encoded[0], 9);
    assert_eq!(encoded[2], (-4i8) as u8);

    // Feed it back claiming the wrong slot; the embedded Y index wins.
    let mut index = 7u8;
    let sub = chunk::decode_sub_chunk(
        &mut &encoded[..],
        c.air(),
        range,
        &mut index,
        Encoding::Disk,
        &states,
    )
    .unwrap();
    assert_eq!(index, 0);
    assert_eq!(sub, c.sub_chunks()[0]);
}

#[test]
fn sub_chunk_versions_1_and_8() {
    let states = TestStates::new();
    let range = Range(0, 127);
    let stone = states.rid("minecraft:stone");

    let mut c = Chunk::new(states.rid("minecraft:air"), range);
    c.set_block(0, 0, 0, 0, stone);
    let v9 = encode_sub_chunk(&c.sub_chunks()[0], Encoding::Disk, range, 0, &states).unwrap();
    // Strip the version/count/index prelude down to the raw storage bytes.
    let storage = &v9[3..];

    let mut v1 = vec![1u8];
    v1.extend_from_slice(storage);
    let mut index = 0u8;
    let sub = chunk::decode_sub_chunk(&mut &v1[..], c.air(), range, &mut index, Encoding::Disk, &states)
        .unwrap();
    assert_eq!(sub.block(0, 0, 0, 0), stone);

    let mut v8 = vec![8u8, 1];
    v8.extend_from_slice(storage);
    let sub = chunk::decode_sub_chunk(&mut &v8[..], c.air(), range, &mut index, Encoding::Disk, &states)
        .unwrap();
    assert_eq!(sub.block(0, 0, 0, 0), stone);
}

#[test]
fn unknown_sub_chunk_version() {
    let states = TestStates::new();
    let mut index = 0u8;
    let result = chunk::decode_sub_chunk(
        &mut &[3u8, 0, 0][..],
        0,
        Range(0, 127),
        &mut index,
        Encoding::Disk,
        &states,
    );
    assert!(matches!(result, Err(Error::UnknownVersion(3))));
}

#[test]
fn unknown_palette_state_fails_decode() {
    let states = TestStates::new();
    let range = Range(0, 127);

    let mut storage = vec![0x00u8];
    let unknown = BlockState::new("minecraft:missingno");
    write_compound(&mut storage, "", &unknown.to_nbt(), bedrock_nbt::Encoding::LittleEndian);
    let mut sub = vec![9u8, 1, 0];
    sub.extend_from_slice(&storage);

    let mut sub_chunks = vec![Vec::new(); range.sub_chunk_count()];
    sub_chunks[0] = sub;
    let data = SerialisedData { sub_chunks, biomes: Vec::new() };
    assert!(matches!(
        disk_decode(&data, &states, range),
        Err(Error::UnknownState { name, .. }) if name == "minecraft:missingno"
    ));
}

#[test]
fn truncated_storage_is_a_short_read() {
    let states = TestStates::new();
    let range = Range(0, 127);
    // Claims 4 bits per index but carries no words at all.
    let sub = vec![9u8, 1, 0, 4 << 1];
    let mut sub_chunks = vec![Vec::new(); range.sub_chunk_count()];
    sub_chunks[0] = sub;
    let data = SerialisedData { sub_chunks, biomes: Vec::new() };
    assert!(matches!(disk_decode(&data, &states, range), Err(Error::ShortRead)));
}

#[test]
fn invalid_bits_per_index_rejected() {
    let states = TestStates::new();
    let range = Range(0, 127);
    // Width 13 is not a legal packing.
    let mut sub = vec![9u8, 1, 0, 13 << 1];
    sub.extend_from_slice(&vec![0u8; 4096]);
    let mut sub_chunks = vec![Vec::new(); range.sub_chunk_count()];
    sub_chunks[0] = sub;
    let data = SerialisedData { sub_chunks, biomes: Vec::new() };
    assert!(matches!(
        disk_decode(&data, &states, range),
        Err(Error::InvalidBitsPerIndex(13))
    ));
}
