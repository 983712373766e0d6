//! NBT as the Bedrock editions of the game speak it.
//!
//! Two flavours exist on disk and on the wire. `LittleEndian` is the storage
//! flavour: every fixed-width integer is little-endian and string lengths are
//! `u16`s. `NetworkLittleEndian` is the packet flavour: ints, longs and all
//! length prefixes become zigzag varints and string lengths become unsigned
//! varints. Both are streams of named tags rooted in a compound.
//!
//! Compounds are `BTreeMap`s rather than hash maps so that a value encodes to
//! the same bytes every time. Hashes of encoded compounds are compared across
//! processes, so this is not just cosmetic.

mod read;
mod write;

pub mod varint;

pub use self::{
    read::{read_compound, read_compounds},
    write::write_compound,
};

use std::collections::BTreeMap;
use thiserror::Error;

/// A compound tag: string keys mapped to arbitrary NBT values.
pub type Compound = BTreeMap<String, Value>;

/// A single NBT value of any tag type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Value {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Value::Byte(_) => 1,
            Value::Short(_) => 2,
            Value::Int(_) => 3,
            Value::Long(_) => 4,
            Value::Float(_) => 5,
            Value::Double(_) => 6,
            Value::ByteArray(_) => 7,
            Value::String(_) => 8,
            Value::List(_) => 9,
            Value::Compound(_) => 10,
            Value::IntArray(_) => 11,
            Value::LongArray(_) => 12,
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            &Value::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            &Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            &Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Value::Compound(v) => Some(v),
            _ => None,
        }
    }
}

/// Flavour of an NBT stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Encoding {
    /// Storage flavour: fixed-width little-endian integers everywhere.
    LittleEndian,
    /// Packet flavour: varint ints/longs/lengths, varuint string lengths.
    NetworkLittleEndian,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of nbt input")]
    UnexpectedEof,
    #[error("unknown nbt tag {0}")]
    UnknownTag(u8),
    #[error("root tag must be a compound, got tag {0}")]
    RootNotCompound(u8),
    #[error("nbt string is not valid utf-8")]
    InvalidString,
    #[error("negative nbt length {0}")]
    InvalidLength(i32),
    #[error("varint wider than {0} bits")]
    VarintOverflow(u32),
    #[error("non-empty nbt list with end element tag")]
    InvalidList,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Compound {
        let mut states = Compound::new();
        states.insert("pillar_axis".into(), Value::String("y".into()));
        states.insert("age".into(), Value::Int(-3));
        states.insert("open_bit".into(), Value::Byte(1));

        let mut root = Compound::new();
        root.insert("name".into(), Value::String("minecraft:log".into()));
        root.insert("states".into(), Value::Compound(states));
        root.insert("version".into(), Value::Int(18168832));
        root.insert("uid".into(), Value::Long(-9182));
        root.insert("weights".into(), Value::List(vec![Value::Float(0.5), Value::Float(1.0)]));
        root.insert("cells".into(), Value::IntArray(vec![1, -1, 70000]));
        root
    }

    #[test]
    fn round_trip_little_endian() {
        let root = sample();
        let mut buf = Vec::new();
        write_compound(&mut buf, "", &root, Encoding::LittleEndian);
        let back = read_compound(&mut &buf[..], Encoding::LittleEndian).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn round_trip_network() {
        let root = sample();
        let mut buf = Vec::new();
        write_compound(&mut buf, "", &root, Encoding::NetworkLittleEndian);
        let back = read_compound(&mut &buf[..], Encoding::NetworkLittleEndian).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn deterministic_bytes() {
        // Key order at insertion must not influence the encoded bytes.
        let mut a = Compound::new();
        a.insert("b".into(), Value::Byte(2));
        a.insert("a".into(), Value::Byte(1));
        let mut b = Compound::new();
        b.insert("a".into(), Value::Byte(1));
        b.insert("b".into(), Value::Byte(2));

        let (mut buf_a, mut buf_b) = (Vec::new(), Vec::new());
        write_compound(&mut buf_a, "", &a, Encoding::LittleEndian);
        write_compound(&mut buf_b, "", &b, Encoding::LittleEndian);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn stream_of_compounds() {
        let root = sample();
        let mut buf = Vec::new();
        write_compound(&mut buf, "", &root, Encoding::LittleEndian);
        write_compound(&mut buf, "", &root, Encoding::LittleEndian);
        let all = read_compounds(&buf, Encoding::LittleEndian).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], all[1]);
    }

    #[test]
    fn truncated_input() {
        let mut buf = Vec::new();
        write_compound(&mut buf, "", &sample(), Encoding::LittleEndian);
        buf.truncate(buf.len() - 4);
        assert!(matches!(
            read_compound(&mut &buf[..], Encoding::LittleEndian),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn root_must_be_compound() {
        let buf = [3u8, 0, 0, 1, 2, 3, 4];
        assert!(matches!(
            read_compound(&mut &buf[..], Encoding::LittleEndian),
            Err(Error::RootNotCompound(3))
        ));
    }
}
