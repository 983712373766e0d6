use super::{Db, Error, KEY_VERSION};
use crate::{ChunkPos, Dimension};
use chunk::Chunk;

/// Limits on which chunks an iteration visits. Both corners are inclusive.
#[derive(Debug, Copy, Clone)]
pub struct IteratorRange {
    pub min: ChunkPos,
    pub max: ChunkPos,
    /// Restrict to one dimension. Compared by persistence ID.
    pub dimension: Option<Dimension>,
}

/// Walks every chunk in the database by scanning for version keys, loading
/// each chunk as it is stepped over.
pub struct ChunkIterator<'a> {
    db: &'a Db,
    positions: std::vec::IntoIter<(ChunkPos, Dimension)>,
}

impl<'a> ChunkIterator<'a> {
    pub(super) fn new(db: &'a Db, filter: Option<IteratorRange>) -> Result<ChunkIterator<'a>, Error> {
        let mut positions = Vec::new();
        for (key, _) in db.store().iter_prefix(&[])? {
            let Some((pos, dim)) = parse_version_key(&key) else {
                continue;
            };
            if let Some(range) = &filter {
                if pos.x < range.min.x
                    || pos.x > range.max.x
                    || pos.z < range.min.z
                    || pos.z > range.max.z
                {
                    continue;
                }
                if range.dimension.is_some_and(|d| d.id() != dim.id()) {
                    continue;
                }
            }
            positions.push((pos, dim));
        }
        Ok(ChunkIterator { db, positions: positions.into_iter() })
    }
}

/// Recognise a chunk version key: an 8- or 12-byte chunk index followed by
/// the version tag.
fn parse_version_key(key: &[u8]) -> Option<(ChunkPos, Dimension)> {
    let dim = match key.len() {
        9 => Dimension::Overworld,
        13 => {
            let id = i32::from_le_bytes([key[8], key[9], key[10], key[11]]);
            Dimension::by_id(id)?
        }
        _ => return None,
    };
    if key[key.len() - 1] != KEY_VERSION {
        return None;
    }
    let x = i32::from_le_bytes([key[0], key[1], key[2], key[3]]);
    let z = i32::from_le_bytes([key[4], key[5], key[6], key[7]]);
    Some((ChunkPos::new(x, z), dim))
}

impl Iterator for ChunkIterator<'_> {
    type Item = Result<(ChunkPos, Dimension, Chunk), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (pos, dim) = self.positions.next()?;
            match self.db.load_chunk(pos, dim) {
                Ok(Some(c)) => return Some(Ok((pos, dim, c))),
                // The version key vanished between the scan and the load.
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
