//! The level.dat metadata record.

use super::Error;
use bedrock_nbt::{self as nbt, Compound, Value};

/// Version written into the 8-byte level.dat header and the
/// `StorageVersion` field.
const STORAGE_VERSION: i32 = 9;

/// World metadata as stored in `<dir>/level.dat`: an 8-byte
/// `{version, size}` little-endian header followed by one little-endian NBT
/// compound. Only the persistence-relevant subset of fields is modelled;
/// unknown fields in an existing file are dropped on the next write.
#[derive(Debug, Clone)]
pub struct LevelDat {
    pub level_name: String,
    pub storage_version: i32,
    pub last_played: i64,
    pub time: i64,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub spawn_z: i32,
    pub game_type: i32,
    pub difficulty: i32,
    pub random_seed: i64,
    pub rain_level: f32,
    pub lightning_level: f32,
    pub commands_enabled: bool,
}

impl Default for LevelDat {
    fn default() -> LevelDat {
        LevelDat {
            level_name: "World".into(),
            storage_version: STORAGE_VERSION,
            last_played: 0,
            time: 0,
            spawn_x: 0,
            spawn_y: 64,
            spawn_z: 0,
            game_type: 0,
            difficulty: 2,
            random_seed: 0,
            rain_level: 0.0,
            lightning_level: 0.0,
            commands_enabled: true,
        }
    }
}

impl LevelDat {
    pub fn decode(data: &[u8]) -> Result<LevelDat, Error> {
        if data.len() < 8 {
            return Err(Error::SchemaViolation("level.dat shorter than its header".into()));
        }
        // Header: {version: i32 LE, size: i32 LE}. The version has changed
        // many times without the layout moving, so it is not checked.
        let map = nbt::read_compound(&mut &data[8..], nbt::Encoding::LittleEndian)?;
        let defaults = LevelDat::default();
        Ok(LevelDat {
            level_name: string(&map, "LevelName", defaults.level_name),
            storage_version: int(&map, "StorageVersion", defaults.storage_version),
            last_played: long(&map, "LastPlayed", defaults.last_played),
            time: long(&map, "Time", defaults.time),
            spawn_x: int(&map, "SpawnX", defaults.spawn_x),
            spawn_y: int(&map, "SpawnY", defaults.spawn_y),
            spawn_z: int(&map, "SpawnZ", defaults.spawn_z),
            game_type: int(&map, "GameType", defaults.game_type),
            difficulty: int(&map, "Difficulty", defaults.difficulty),
            random_seed: long(&map, "RandomSeed", defaults.random_seed),
            rain_level: float(&map, "rainLevel", defaults.rain_level),
            lightning_level: float(&map, "lightningLevel", defaults.lightning_level),
            commands_enabled: byte(&map, "commandsEnabled", defaults.commands_enabled as u8) != 0,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut map = Compound::new();
        map.insert("LevelName".into(), Value::String(self.level_name.clone()));
        map.insert("StorageVersion".into(), Value::Int(self.storage_version));
        map.insert("LastPlayed".into(), Value::Long(self.last_played));
        map.insert("Time".into(), Value::Long(self.time));
        map.insert("SpawnX".into(), Value::Int(self.spawn_x));
        map.insert("SpawnY".into(), Value::Int(self.spawn_y));
        map.insert("SpawnZ".into(), Value::Int(self.spawn_z));
        map.insert("GameType".into(), Value::Int(self.game_type));
        map.insert("Difficulty".into(), Value::Int(self.difficulty));
        map.insert("RandomSeed".into(), Value::Long(self.random_seed));
        map.insert("rainLevel".into(), Value::Float(self.rain_level));
        map.insert("lightningLevel".into(), Value::Float(self.lightning_level));
        map.insert("commandsEnabled".into(), Value::Byte(self.commands_enabled as u8));

        let mut body = Vec::new();
        nbt::write_compound(&mut body, "", &map, nbt::Encoding::LittleEndian);
        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
        out.extend_from_slice(&(body.len() as i32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

fn string(map: &Compound, key: &str, default: String) -> String {
    map.get(key).and_then(Value::as_str).map(str::to_owned).unwrap_or(default)
}

fn int(map: &Compound, key: &str, default: i32) -> i32 {
    map.get(key).and_then(Value::as_int).unwrap_or(default)
}

fn long(map: &Compound, key: &str, default: i64) -> i64 {
    map.get(key).and_then(Value::as_long).unwrap_or(default)
}

fn float(map: &Compound, key: &str, default: f32) -> f32 {
    match map.get(key) {
        Some(&Value::Float(v)) => v,
        _ => default,
    }
}

fn byte(map: &Compound, key: &str, default: u8) -> u8 {
    map.get(key).and_then(Value::as_byte).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let ldat = LevelDat {
            level_name: "Realm of Tests".into(),
            last_played: 1_700_000_000,
            time: 24000,
            spawn_x: 10,
            spawn_y: 70,
            spawn_z: -4,
            random_seed: -12345,
            ..Default::default()
        };
        let encoded = ldat.encode();
        assert_eq!(&encoded[..4], &STORAGE_VERSION.to_le_bytes());
        assert_eq!(
            i32::from_le_bytes(encoded[4..8].try_into().unwrap()) as usize,
            encoded.len() - 8
        );

        let back = LevelDat::decode(&encoded).unwrap();
        assert_eq!(back.level_name, ldat.level_name);
        assert_eq!(back.last_played, ldat.last_played);
        assert_eq!(back.spawn_z, -4);
        assert_eq!(back.random_seed, -12345);
    }

    #[test]
    fn truncated_header_is_a_schema_violation() {
        assert!(matches!(
            LevelDat::decode(&[1, 2, 3]),
            Err(Error::SchemaViolation(_))
        ));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut body = Vec::new();
        nbt::write_compound(&mut body, "", &Compound::new(), nbt::Encoding::LittleEndian);
        let mut data = Vec::new();
        data.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
        data.extend_from_slice(&(body.len() as i32).to_le_bytes());
        data.extend_from_slice(&body);

        let ldat = LevelDat::decode(&data).unwrap();
        assert_eq!(ldat.level_name, "World");
        assert_eq!(ldat.difficulty, 2);
    }
}
