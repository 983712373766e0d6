use bedrock_nbt::{Compound, Value};
use std::collections::BTreeMap;

/// Version stamped into every disk palette entry, packed as
/// `major << 24 | minor << 16 | patch << 8 | revision`.
pub const CURRENT_BLOCK_VERSION: i32 = (1 << 24) | (21 << 16) | (60 << 8);

/// The properties of a block state, keyed by property name.
///
/// A `BTreeMap` keeps the keys sorted, which both the canonical state hash and
/// the NBT form rely on.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single block state property value.
///
/// These four variants are the only value types that may legally appear in a
/// block state. The NBT form has no boolean, so `Bool` and `U8` coalesce when
/// hashed canonically: `Bool(true)` and `U8(1)` address the same state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Bool(bool),
    U8(u8),
    I32(i32),
    String(String),
}

impl PropertyValue {
    /// Convert an NBT value into a property value.
    ///
    /// Panics on any other tag type: a non-scalar property means the block
    /// catalogue itself is broken, and that should surface immediately rather
    /// than as misrendered blocks in game.
    pub fn from_nbt(value: &Value) -> PropertyValue {
        match value {
            Value::Byte(v) => PropertyValue::U8(*v),
            Value::Int(v) => PropertyValue::I32(*v),
            Value::String(v) => PropertyValue::String(v.clone()),
            other => panic!("invalid block property type {other:?}"),
        }
    }

    pub fn to_nbt(&self) -> Value {
        match self {
            PropertyValue::Bool(v) => Value::Byte(*v as u8),
            PropertyValue::U8(v) => Value::Byte(*v),
            PropertyValue::I32(v) => Value::Int(*v),
            PropertyValue::String(v) => Value::String(v.clone()),
        }
    }

    /// Append the canonical byte form of this value, as used in state hashes.
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            PropertyValue::Bool(v) => out.push(*v as u8),
            PropertyValue::U8(v) => out.push(*v),
            PropertyValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::String(v) => out.extend_from_slice(v.as_bytes()),
        }
    }
}

/// A fully qualified block state: name plus property map.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockState {
    pub name: String,
    pub properties: Properties,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> BlockState {
        BlockState { name: name.into(), properties: Properties::new() }
    }

    pub fn with(mut self, property: impl Into<String>, value: PropertyValue) -> BlockState {
        self.properties.insert(property.into(), value);
        self
    }

    /// The `{name, states, version}` compound written to disk palettes.
    pub fn to_nbt(&self) -> Compound {
        let mut states = Compound::new();
        for (name, value) in &self.properties {
            states.insert(name.clone(), value.to_nbt());
        }
        let mut map = Compound::new();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("states".into(), Value::Compound(states));
        map.insert("version".into(), Value::Int(CURRENT_BLOCK_VERSION));
        map
    }

    /// Parse a `{name, states, ...}` compound. `None` if `name` is missing.
    pub fn from_nbt(map: &Compound) -> Option<BlockState> {
        let name = map.get("name")?.as_str()?.to_owned();
        let mut properties = Properties::new();
        if let Some(states) = map.get("states").and_then(Value::as_compound) {
            for (key, value) in states {
                properties.insert(key.clone(), PropertyValue::from_nbt(value));
            }
        }
        Some(BlockState { name, properties })
    }
}

/// The registry as the codec sees it.
///
/// Implemented by the world's block registry and handed to the codec entry
/// points explicitly, so the codec carries no global state of its own.
pub trait StateLookup: Send + Sync {
    /// The runtime ID of `(name, properties)`, if registered.
    fn runtime_id(&self, name: &str, properties: &Properties) -> Option<u32>;

    /// The state a runtime ID refers to.
    fn state(&self, runtime_id: u32) -> Option<&BlockState>;

    /// Translate a network block hash into a runtime ID.
    fn runtime_id_from_hash(&self, hash: u32) -> Option<u32>;
}
