//! The world provider: the Bedrock level database layout over a sorted
//! key/value store.
//!
//! Every key is a binary concatenation. Per-chunk keys start with the chunk
//! index — `x: u32 LE ++ z: u32 LE`, plus `dimension: u32 LE` outside the
//! overworld — followed by a one-byte tag, and the sub chunk data tag is
//! further suffixed with a signed Y index byte. Entities live under their own
//! `actorprefix` keys, indexed per chunk by a `digp` list of unique IDs.
//! Player data hangs off string keys derived from the player's UUID.

mod iterator;
mod leveldat;

pub mod store;

pub use self::iterator::{ChunkIterator, IteratorRange};
pub use self::leveldat::LevelDat;

use self::store::{RedbStore, Store, StoreError};
use crate::{BlockRegistry, ChunkPos, Dimension, Entity, EntityRegistry};
use bedrock_nbt::{self as nbt, Compound, Value};
use chunk::{Chunk, Encoding, SerialisedData};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;
use vek::Vec3;

// One-byte tags appended to the chunk index.
const KEY_3D_DATA: u8 = 0x2b; // '+'
const KEY_SUB_CHUNK_DATA: u8 = 0x2c; // ','
const KEY_VERSION: u8 = 0x2f; // '/'
const KEY_BLOCK_ENTITIES: u8 = 0x31; // '1'
const KEY_ENTITIES: u8 = 0x32; // '2'
const KEY_FINALISATION: u8 = 0x36; // '6'
const KEY_VERSION_OLD: u8 = 0x76; // 'v'

const KEY_LOCAL_PLAYER: &[u8] = b"~local_player";

/// Value written under the chunk version key.
const CHUNK_VERSION: u8 = 40;

/// Finalisation state written for every saved chunk: fully populated.
const FINALISATION_POPULATED: u32 = 2;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Chunk(#[from] chunk::Error),
    #[error(transparent)]
    Nbt(#[from] bedrock_nbt::Error),
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An open world: a key/value store plus the directory holding `level.dat`
/// and `levelname.txt`.
///
/// The provider owns the store exclusively. Individual operations are atomic
/// from the store's perspective, but a chunk save is a sequence of writes;
/// the version key goes last so that a torn save reads back as an absent
/// chunk rather than a corrupt one.
pub struct Db {
    store: Box<dyn Store>,
    dir: PathBuf,
    registry: Arc<BlockRegistry>,
    ldat: Mutex<LevelDat>,
    closed: AtomicBool,
}

impl Db {
    /// Open the world at `dir`, with the store in `<dir>/db/`. Creates a
    /// fresh world if nothing is there yet.
    pub fn open(dir: impl AsRef<Path>, registry: Arc<BlockRegistry>) -> Result<Db, Error> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir.join("db"))?;
        let store = RedbStore::open(&dir.join("db").join("world.redb"))?;
        Db::open_with_store(dir, Box::new(store), registry)
    }

    /// Open a world over an arbitrary store implementation.
    pub fn open_with_store(
        dir: impl AsRef<Path>,
        store: Box<dyn Store>,
        registry: Arc<BlockRegistry>,
    ) -> Result<Db, Error> {
        let dir = dir.as_ref().to_path_buf();
        let ldat = match fs::read(dir.join("level.dat")) {
            Ok(data) => LevelDat::decode(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LevelDat::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(dir = %dir.display(), "opened world database");
        Ok(Db {
            store,
            dir,
            registry,
            ldat: Mutex::new(ldat),
            closed: AtomicBool::new(false),
        })
    }

    pub fn level_dat(&self) -> LevelDat {
        self.ldat.lock().unwrap().clone()
    }

    pub fn set_level_dat(&self, ldat: LevelDat) {
        *self.ldat.lock().unwrap() = ldat;
    }

    /// Load the chunk at `pos`. `Ok(None)` if no version key exists for it,
    /// current or legacy.
    pub fn load_chunk(&self, pos: ChunkPos, dim: Dimension) -> Result<Option<Chunk>, Error> {
        if self.store.get(&self.key(pos, dim, KEY_VERSION))?.is_none()
            && self.store.get(&self.key(pos, dim, KEY_VERSION_OLD))?.is_none()
        {
            return Ok(None);
        }

        let mut biomes = self.store.get(&self.key(pos, dim, KEY_3D_DATA))?.unwrap_or_default();
        if biomes.len() > 512 {
            // The 3D data blob leads with a 512-byte heightmap.
            biomes.drain(..512);
        }

        let range = dim.range();
        let mut sub_chunks = vec![Vec::new(); range.sub_chunk_count()];
        for (i, slot) in sub_chunks.iter_mut().enumerate() {
            if let Some(data) = self.store.get(&self.sub_chunk_key(pos, dim, i))? {
                *slot = data;
            }
        }

        let data = SerialisedData { sub_chunks, biomes };
        Ok(Some(chunk::disk_decode(&data, &*self.registry, range)?))
    }

    /// Save the chunk at `pos`. The version key is written last: a chunk
    /// missing it reads back as absent, so a torn save stays invisible.
    pub fn save_chunk(&self, pos: ChunkPos, c: &Chunk, dim: Dimension) -> Result<(), Error> {
        let data = chunk::encode(c, Encoding::Disk, &*self.registry)?;

        // The heightmap is not maintained at this layer; 512 zero bytes keep
        // the blob shaped as the client expects.
        let mut blob = vec![0u8; 512];
        blob.extend_from_slice(&data.biomes);
        self.store.put(&self.key(pos, dim, KEY_3D_DATA), &blob)?;
        self.store
            .put(&self.key(pos, dim, KEY_FINALISATION), &FINALISATION_POPULATED.to_le_bytes())?;
        for (i, sub) in data.sub_chunks.iter().enumerate() {
            self.store.put(&self.sub_chunk_key(pos, dim, i), sub)?;
        }
        self.store.put(&self.key(pos, dim, KEY_VERSION), &[CHUNK_VERSION])?;
        Ok(())
    }

    /// Load the entities of the chunk at `pos`: first the legacy inline
    /// stream, then every actor-storage record listed in the chunk's `digp`
    /// index. Records that fail to decode are logged and skipped.
    pub fn load_entities(
        &self,
        pos: ChunkPos,
        dim: Dimension,
        reg: &dyn EntityRegistry,
    ) -> Result<Vec<Box<dyn Entity>>, Error> {
        let mut entities = Vec::new();

        if let Some(data) = self.store.get(&self.key(pos, dim, KEY_ENTITIES))? {
            for map in nbt::read_compounds(&data, nbt::Encoding::LittleEndian)? {
                if let Some(entity) = self.load_entity(map, pos, reg) {
                    entities.push(entity);
                }
            }
        }

        let Some(digp) = self.store.get(&self.digp_key(pos, dim))? else {
            return Ok(entities);
        };
        for uid in digp.chunks_exact(8) {
            let uid = i64::from_le_bytes(uid.try_into().unwrap());
            let Some(data) = self.store.get(&actor_key(uid))? else {
                continue;
            };
            let map = nbt::read_compound(&mut &data[..], nbt::Encoding::LittleEndian)?;
            if let Some(entity) = self.load_entity(map, pos, reg) {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    fn load_entity(
        &self,
        mut data: Compound,
        pos: ChunkPos,
        reg: &dyn EntityRegistry,
    ) -> Option<Box<dyn Entity>> {
        let Some(identifier) = data.get("identifier").and_then(Value::as_str).map(str::to_owned)
        else {
            error!(?pos, "load entities: entity had data but no identifier");
            return None;
        };
        let Some(entity_type) = reg.lookup(&identifier) else {
            error!(?pos, identifier, "load entities: entity was not registered");
            return None;
        };
        if !data.contains_key("UniqueID") {
            data.insert("UniqueID".into(), Value::Long(rand::random()));
        }
        entity_type.decode_nbt(data)
    }

    /// Save the entities of the chunk at `pos` to actor storage: one record
    /// per entity, a rewritten `digp` index, records of dropped entities
    /// deleted, and the legacy inline stream removed.
    pub fn save_entities(
        &self,
        pos: ChunkPos,
        entities: &[Box<dyn Entity>],
        dim: Dimension,
    ) -> Result<(), Error> {
        let digp_key = self.digp_key(pos, dim);

        let mut previous = Vec::new();
        if let Some(data) = self.store.get(&digp_key)? {
            for uid in data.chunks_exact(8) {
                previous.push(i64::from_le_bytes(uid.try_into().unwrap()));
            }
        }

        let mut uids = Vec::with_capacity(entities.len());
        for entity in entities {
            let entity_type = entity.entity_type();
            let mut data = entity_type.encode_nbt(entity.as_ref());
            data.insert(
                "identifier".into(),
                Value::String(entity_type.encode_identifier().to_owned()),
            );
            let uid = match data.get("UniqueID").and_then(Value::as_long) {
                Some(uid) => uid,
                None => {
                    let uid = rand::random();
                    data.insert("UniqueID".into(), Value::Long(uid));
                    uid
                }
            };

            let mut buf = Vec::new();
            nbt::write_compound(&mut buf, "", &data, nbt::Encoding::LittleEndian);
            self.store.put(&actor_key(uid), &buf)?;
            uids.push(uid);
        }

        for uid in previous {
            if !uids.contains(&uid) {
                self.store.delete(&actor_key(uid))?;
            }
        }

        if uids.is_empty() {
            self.store.delete(&digp_key)?;
        } else {
            let mut digp = Vec::with_capacity(uids.len() * 8);
            for uid in &uids {
                digp.extend_from_slice(&uid.to_le_bytes());
            }
            self.store.put(&digp_key, &digp)?;
        }

        self.store.delete(&self.key(pos, dim, KEY_ENTITIES))?;
        Ok(())
    }

    /// Load the block entity records of the chunk at `pos`. A missing key is
    /// an empty list.
    pub fn load_block_nbt(&self, pos: ChunkPos, dim: Dimension) -> Result<Vec<Compound>, Error> {
        match self.store.get(&self.key(pos, dim, KEY_BLOCK_ENTITIES))? {
            Some(data) => Ok(nbt::read_compounds(&data, nbt::Encoding::LittleEndian)?),
            None => Ok(Vec::new()),
        }
    }

    /// Save the block entity records of the chunk at `pos`, deleting the key
    /// when there are none.
    pub fn save_block_nbt(
        &self,
        pos: ChunkPos,
        data: &[Compound],
        dim: Dimension,
    ) -> Result<(), Error> {
        let key = self.key(pos, dim, KEY_BLOCK_ENTITIES);
        if data.is_empty() {
            self.store.delete(&key)?;
            return Ok(());
        }
        let mut buf = Vec::new();
        for map in data {
            nbt::write_compound(&mut buf, "", map, nbt::Encoding::LittleEndian);
        }
        self.store.put(&key, &buf)?;
        Ok(())
    }

    /// Load a player's server data. The `player_<uuid>` record points at the
    /// real data through its `ServerId`; both the UUID match and a non-empty
    /// server ID are verified. Returns the data and the key it lives under.
    pub fn load_player_data(&self, id: Uuid) -> Result<Option<(Compound, String)>, Error> {
        let Some(data) = self.store.get(format!("player_{id}").as_bytes())? else {
            return Ok(None);
        };
        let record = nbt::read_compound(&mut &data[..], nbt::Encoding::LittleEndian)?;
        let uuid = record.get("MsaId").and_then(Value::as_str).unwrap_or_default();
        let server_id =
            record.get("ServerId").and_then(Value::as_str).unwrap_or_default().to_owned();
        if uuid != id.to_string() || server_id.is_empty() {
            return Err(Error::SchemaViolation(format!("invalid player data for uuid {id}")));
        }

        let Some(server_data) = self.store.get(server_id.as_bytes())? else {
            return Err(Error::SchemaViolation(format!(
                "missing server data for player {id} ({server_id})"
            )));
        };
        let map = nbt::read_compound(&mut &server_data[..], nbt::Encoding::LittleEndian)?;
        Ok(Some((map, server_id)))
    }

    /// Load a player's spawn position. `Ok(None)` for a UUID never seen.
    pub fn load_player_spawn_position(&self, id: Uuid) -> Result<Option<Vec3<i32>>, Error> {
        let Some((data, _)) = self.load_player_data(id)? else {
            return Ok(None);
        };
        match (
            data.get("SpawnX").and_then(Value::as_int),
            data.get("SpawnY").and_then(Value::as_int),
            data.get("SpawnZ").and_then(Value::as_int),
        ) {
            (Some(x), Some(y), Some(z)) => Ok(Some(Vec3::new(x, y, z))),
            _ => Err(Error::SchemaViolation(format!(
                "missing spawn fields in server data for player {id}"
            ))),
        }
    }

    /// Save a player's spawn position, creating the player reference record
    /// on first contact and updating only the server data blob otherwise.
    pub fn save_player_spawn_position(&self, id: Uuid, pos: Vec3<i32>) -> Result<(), Error> {
        let player_key = format!("player_{id}");
        let (mut data, server_key) = if self.store.get(player_key.as_bytes())?.is_none() {
            let server_key = format!("player_server_{id}");
            let mut record = Compound::new();
            record.insert("MsaId".into(), Value::String(id.to_string()));
            record.insert("ServerId".into(), Value::String(server_key.clone()));
            record.insert("SelfSignedId".into(), Value::String(String::new()));
            let mut buf = Vec::new();
            nbt::write_compound(&mut buf, "", &record, nbt::Encoding::LittleEndian);
            self.store.put(player_key.as_bytes(), &buf)?;
            (Compound::new(), server_key)
        } else {
            self.load_player_data(id)?.ok_or_else(|| {
                Error::SchemaViolation(format!("player data for uuid {id} disappeared"))
            })?
        };

        data.insert("SpawnX".into(), Value::Int(pos.x));
        data.insert("SpawnY".into(), Value::Int(pos.y));
        data.insert("SpawnZ".into(), Value::Int(pos.z));
        let mut buf = Vec::new();
        nbt::write_compound(&mut buf, "", &data, nbt::Encoding::LittleEndian);
        self.store.put(server_key.as_bytes(), &buf)?;
        Ok(())
    }

    pub fn load_local_player_data(&self) -> Result<Option<Compound>, Error> {
        match self.store.get(KEY_LOCAL_PLAYER)? {
            Some(data) => Ok(Some(nbt::read_compound(&mut &data[..], nbt::Encoding::LittleEndian)?)),
            None => Ok(None),
        }
    }

    pub fn save_local_player_data(&self, data: &Compound) -> Result<(), Error> {
        let mut buf = Vec::new();
        nbt::write_compound(&mut buf, "", data, nbt::Encoding::LittleEndian);
        self.store.put(KEY_LOCAL_PLAYER, &buf)?;
        Ok(())
    }

    /// Iterate every stored chunk, optionally restricted to a coordinate
    /// range and dimension.
    pub fn iter_chunks(&self, filter: Option<IteratorRange>) -> Result<ChunkIterator<'_>, Error> {
        ChunkIterator::new(self, filter)
    }

    /// Flush level metadata and release the store. Idempotent.
    pub fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let ldat = {
            let mut ldat = self.ldat.lock().unwrap();
            ldat.last_played = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            ldat.clone()
        };
        fs::write(self.dir.join("level.dat"), ldat.encode())?;
        fs::write(self.dir.join("levelname.txt"), ldat.level_name.as_bytes())?;
        self.store.close()?;
        debug!(dir = %self.dir.display(), "closed world database");
        Ok(())
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The chunk index: `x ++ z`, plus the dimension ID outside the
    /// overworld. 8 or 12 bytes.
    fn index(&self, pos: ChunkPos, dim: Dimension) -> Vec<u8> {
        let mut key = Vec::with_capacity(13);
        key.extend_from_slice(&(pos.x as u32).to_le_bytes());
        key.extend_from_slice(&(pos.z as u32).to_le_bytes());
        if dim.id() != 0 {
            key.extend_from_slice(&(dim.id() as u32).to_le_bytes());
        }
        key
    }

    fn key(&self, pos: ChunkPos, dim: Dimension, tag: u8) -> Vec<u8> {
        let mut key = self.index(pos, dim);
        key.push(tag);
        key
    }

    /// The key of the sub chunk at slot `i`, suffixed with the sub chunk's
    /// absolute Y coordinate divided by 16, as a signed byte.
    fn sub_chunk_key(&self, pos: ChunkPos, dim: Dimension, i: usize) -> Vec<u8> {
        let mut key = self.key(pos, dim, KEY_SUB_CHUNK_DATA);
        key.push((i as i32 + (dim.range().min() >> 4)) as i8 as u8);
        key
    }

    fn digp_key(&self, pos: ChunkPos, dim: Dimension) -> Vec<u8> {
        let mut key = b"digp".to_vec();
        key.extend_from_slice(&self.index(pos, dim));
        key
    }
}

/// The key of a single actor storage record.
fn actor_key(uid: i64) -> Vec<u8> {
    let mut key = b"actorprefix".to_vec();
    key.extend_from_slice(&uid.to_le_bytes());
    key
}
