use bedrock_nbt::{self as nbt, Value};
use chunk::{BlockState, Properties, PropertyValue, StateLookup};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Capability flags derived for a block state at finalisation. These feed the
/// per-runtime-ID arrays that block behaviour code indexes; this layer only
/// stores them.
#[derive(Debug, Copy, Clone, Default)]
pub struct Capabilities {
    pub nbt: bool,
    pub random_tick: bool,
    pub liquid: bool,
    pub liquid_displacing: bool,
    pub water: bool,
    pub light_filter: u8,
    pub light_emission: u8,
}

type Classifier = dyn Fn(&BlockState) -> Capabilities + Send + Sync;

/// A custom block as announced by a client or behaviour pack: a name plus the
/// property values and traits whose Cartesian product defines its states.
#[derive(Debug, Clone)]
pub struct CustomBlockEntry {
    pub name: String,
    pub properties: Vec<BlockProperty>,
    /// Names of enabled traits, expanded through the fixed trait table.
    pub traits: Vec<String>,
}

/// One declared property of a custom block and its allowed values.
#[derive(Debug, Clone)]
pub struct BlockProperty {
    pub name: String,
    pub values: Vec<PropertyValue>,
}

/// Values contributed by a block trait, keyed by trait name.
fn trait_values(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "facing_direction" => Some(&["north", "east", "south", "west", "down", "up"]),
        _ => None,
    }
}

/// The registry of every known block state, bijectively mapping
/// `(name, properties)` pairs to dense `u32` runtime IDs.
///
/// Population happens in one single-threaded phase: load the embedded
/// catalogue, insert any custom blocks, then [`finalise`](Self::finalise)
/// into an `Arc` that the rest of the process shares. Inserting custom
/// blocks re-sorts the whole state list and reassigns every runtime ID, so
/// no runtime ID may be held across that call.
pub struct BlockRegistry {
    blocks: Vec<BlockState>,
    state_rids: HashMap<(String, Vec<u8>), u32>,
    hash_rids: HashMap<u32, u32>,
    network_hashes: Vec<u32>,
    default_properties: HashMap<String, Properties>,
    air: u32,
    classifier: Option<Box<Classifier>>,

    nbt_blocks: Vec<bool>,
    random_tick_blocks: Vec<bool>,
    liquid_blocks: Vec<bool>,
    liquid_displacing_blocks: Vec<bool>,
    water_blocks: Vec<bool>,
    filtering_blocks: Vec<u8>,
    light_blocks: Vec<u8>,
}

impl Debug for BlockRegistry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("blocks", &self.blocks.len())
            .field("air", &self.air)
            .finish_non_exhaustive()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        BlockRegistry::new()
    }
}

impl BlockRegistry {
    pub fn new() -> BlockRegistry {
        BlockRegistry {
            blocks: Vec::new(),
            state_rids: HashMap::new(),
            hash_rids: HashMap::new(),
            network_hashes: Vec::new(),
            default_properties: HashMap::new(),
            air: 0,
            classifier: None,
            nbt_blocks: Vec::new(),
            random_tick_blocks: Vec::new(),
            liquid_blocks: Vec::new(),
            liquid_displacing_blocks: Vec::new(),
            water_blocks: Vec::new(),
            filtering_blocks: Vec::new(),
            light_blocks: Vec::new(),
        }
    }

    /// A registry whose capability arrays are filled by `classifier` at each
    /// finalisation instead of staying all-default.
    pub fn with_classifier(
        classifier: impl Fn(&BlockState) -> Capabilities + Send + Sync + 'static,
    ) -> BlockRegistry {
        let mut registry = BlockRegistry::new();
        registry.classifier = Some(Box::new(classifier));
        registry
    }

    /// Load the embedded catalogue of vanilla block states.
    pub fn load_vanilla_states(&mut self) {
        self.load_states(include_bytes!("../data/block_states.nbt"))
            .expect("malformed embedded block state catalogue");
    }

    /// Load a catalogue: a little-endian NBT stream of `{name, states,
    /// version}` records, consumed until exhausted. Record order decides
    /// provisional runtime IDs, so catalogues must not be reordered.
    pub fn load_states(&mut self, data: &[u8]) -> Result<(), nbt::Error> {
        for map in nbt::read_compounds(data, nbt::Encoding::LittleEndian)? {
            let state = BlockState::from_nbt(&map)
                .unwrap_or_else(|| panic!("block state record without a name ({map:?})"));
            self.register_state(state);
        }
        Ok(())
    }

    /// Register one state under the next free runtime ID. Registering the
    /// same `(name, properties)` twice means the catalogue itself is broken.
    fn register_state(&mut self, state: BlockState) {
        let key = (state.name.clone(), hash_properties(&state.properties));
        if self.state_rids.contains_key(&key) {
            panic!("cannot register the same state twice ({state:?})");
        }
        self.default_properties
            .entry(state.name.clone())
            .or_insert_with(|| state.properties.clone());
        let rid = self.blocks.len() as u32;
        self.blocks.push(state);
        self.state_rids.insert(key, rid);
    }

    /// Register every state permutation of the given custom blocks, then
    /// re-finalise. Entries in the `minecraft:` namespace are ignored.
    ///
    /// All previously returned runtime IDs are invalid afterwards.
    pub fn insert_custom_blocks(&mut self, entries: &[CustomBlockEntry]) {
        for entry in entries {
            if namespace(&entry.name) == "minecraft" {
                continue;
            }

            let mut names = Vec::new();
            let mut axes = Vec::new();
            for property in &entry.properties {
                names.push(property.name.clone());
                axes.push(property.values.clone());
            }
            for trait_name in &entry.traits {
                let values = trait_values(trait_name)
                    .unwrap_or_else(|| panic!("unresolved trait {trait_name}"));
                names.push(trait_name.clone());
                axes.push(values.iter().map(|v| PropertyValue::String((*v).into())).collect());
            }

            for permutation in cartesian(&axes) {
                let mut properties = Properties::new();
                for (name, value) in names.iter().zip(permutation) {
                    properties.insert(name.clone(), value);
                }
                self.register_state(BlockState { name: entry.name.clone(), properties });
            }
        }
        self.refinalise();
    }

    /// Finalise the registry and wrap it in an `Arc` for sharing.
    pub fn finalise(mut self) -> Arc<BlockRegistry> {
        self.refinalise();
        Arc::new(self)
    }

    /// Re-sort the state list into its canonical order and rebuild every
    /// runtime-ID-indexed structure to match.
    fn refinalise(&mut self) {
        self.blocks
            .sort_by_cached_key(|s| (s.name.clone(), hash_properties(&s.properties)));

        self.state_rids.clear();
        self.hash_rids.clear();
        self.network_hashes.clear();
        self.nbt_blocks.clear();
        self.random_tick_blocks.clear();
        self.liquid_blocks.clear();
        self.liquid_displacing_blocks.clear();
        self.water_blocks.clear();
        self.filtering_blocks.clear();
        self.light_blocks.clear();

        for (rid, state) in self.blocks.iter().enumerate() {
            let rid = rid as u32;
            self.state_rids
                .insert((state.name.clone(), hash_properties(&state.properties)), rid);
            let hash = network_hash(state);
            self.network_hashes.push(hash);
            self.hash_rids.insert(hash, rid);

            let caps = match &self.classifier {
                Some(classifier) => classifier(state),
                None => Capabilities::default(),
            };
            self.nbt_blocks.push(caps.nbt);
            self.random_tick_blocks.push(caps.random_tick);
            self.liquid_blocks.push(caps.liquid);
            self.liquid_displacing_blocks.push(caps.liquid_displacing);
            self.water_blocks.push(caps.water);
            self.filtering_blocks.push(caps.light_filter);
            self.light_blocks.push(caps.light_emission);
        }

        self.air = self
            .lookup_rid("minecraft:air", &Properties::new())
            .expect("cannot find air runtime ID");
    }

    /// The runtime ID of air, fixed at finalisation.
    pub fn air(&self) -> u32 {
        self.air
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The runtime ID of `(name, properties)`. A partially specified state
    /// falls back to the default property set recorded for that name, which
    /// is the property set of the first state seen for it.
    pub fn rid_of(&self, name: &str, properties: &Properties) -> Option<u32> {
        if let Some(rid) = self.lookup_rid(name, properties) {
            return Some(rid);
        }
        let default = self.default_properties.get(name)?;
        self.lookup_rid(name, default)
    }

    fn lookup_rid(&self, name: &str, properties: &Properties) -> Option<u32> {
        self.state_rids
            .get(&(name.to_owned(), hash_properties(properties)))
            .copied()
    }

    /// The state a runtime ID refers to.
    pub fn state_of(&self, rid: u32) -> Option<&BlockState> {
        self.blocks.get(rid as usize)
    }

    /// The FNV-1a network hash of a state, for handshake validation against
    /// peers that send hashed runtime IDs.
    pub fn network_hash(&self, rid: u32) -> Option<u32> {
        self.network_hashes.get(rid as usize).copied()
    }

    pub fn nbt_block(&self, rid: u32) -> bool {
        self.nbt_blocks.get(rid as usize).copied().unwrap_or(false)
    }

    pub fn random_tick_block(&self, rid: u32) -> bool {
        self.random_tick_blocks.get(rid as usize).copied().unwrap_or(false)
    }

    pub fn liquid_block(&self, rid: u32) -> bool {
        self.liquid_blocks.get(rid as usize).copied().unwrap_or(false)
    }

    pub fn liquid_displacing_block(&self, rid: u32) -> bool {
        self.liquid_displacing_blocks.get(rid as usize).copied().unwrap_or(false)
    }

    pub fn water_block(&self, rid: u32) -> bool {
        self.water_blocks.get(rid as usize).copied().unwrap_or(false)
    }

    pub fn light_filter(&self, rid: u32) -> u8 {
        self.filtering_blocks.get(rid as usize).copied().unwrap_or(0)
    }

    pub fn light_emission(&self, rid: u32) -> u8 {
        self.light_blocks.get(rid as usize).copied().unwrap_or(0)
    }
}

impl StateLookup for BlockRegistry {
    fn runtime_id(&self, name: &str, properties: &Properties) -> Option<u32> {
        self.rid_of(name, properties)
    }

    fn state(&self, runtime_id: u32) -> Option<&BlockState> {
        self.state_of(runtime_id)
    }

    fn runtime_id_from_hash(&self, hash: u32) -> Option<u32> {
        self.hash_rids.get(&hash).copied()
    }
}

/// The canonical byte form of a property map: values appended in key order.
/// Only the values are hashed; the name the map belongs to disambiguates.
fn hash_properties(properties: &Properties) -> Vec<u8> {
    let mut out = Vec::new();
    for value in properties.values() {
        value.write_canonical(&mut out);
    }
    out
}

/// FNV-1a hash of the little-endian NBT form of `{name, states}`, matching
/// what peers compute for hashed runtime IDs on the network.
fn network_hash(state: &BlockState) -> u32 {
    let mut states = nbt::Compound::new();
    for (name, value) in &state.properties {
        states.insert(name.clone(), value.to_nbt());
    }
    let mut map = nbt::Compound::new();
    map.insert("name".into(), Value::String(state.name.clone()));
    map.insert("states".into(), Value::Compound(states));

    let mut buf = Vec::new();
    nbt::write_compound(&mut buf, "", &map, nbt::Encoding::LittleEndian);
    fnv1a32(&buf)
}

fn fnv1a32(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for &b in data {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

fn namespace(identifier: &str) -> &str {
    identifier.split(':').next().unwrap_or(identifier)
}

/// Every combination of one value per axis, in axis order. No axes yields a
/// single empty combination.
fn cartesian(axes: &[Vec<PropertyValue>]) -> Vec<Vec<PropertyValue>> {
    let mut out = vec![Vec::new()];
    for axis in axes {
        let mut next = Vec::with_capacity(out.len() * axis.len());
        for prefix in &out {
            for value in axis {
                let mut combination = prefix.clone();
                combination.push(value.clone());
                next.push(combination);
            }
        }
        out = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> BlockRegistry {
        let mut registry = BlockRegistry::new();
        registry.register_state(BlockState::new("minecraft:air"));
        registry.register_state(BlockState::new("minecraft:stone"));
        for depth in 0..4 {
            registry.register_state(
                BlockState::new("minecraft:water").with("liquid_depth", PropertyValue::I32(depth)),
            );
        }
        registry.register_state(
            BlockState::new("minecraft:lever")
                .with("open_bit", PropertyValue::U8(0))
                .with("direction", PropertyValue::I32(1)),
        );
        registry.register_state(
            BlockState::new("minecraft:lever")
                .with("open_bit", PropertyValue::U8(1))
                .with("direction", PropertyValue::I32(1)),
        );
        registry
    }

    #[test]
    fn rid_and_state_are_inverse() {
        let registry = catalogue().finalise();
        for rid in 0..registry.len() as u32 {
            let state = registry.state_of(rid).unwrap().clone();
            assert_eq!(registry.rid_of(&state.name, &state.properties), Some(rid));
        }
    }

    #[test]
    fn air_is_captured_at_finalisation() {
        let registry = catalogue().finalise();
        assert_eq!(
            registry.rid_of("minecraft:air", &Properties::new()),
            Some(registry.air())
        );
    }

    #[test]
    fn partial_states_fall_back_to_defaults() {
        let registry = catalogue().finalise();
        // No water state carries an empty property map, but the name alone
        // resolves to the first-seen state for it.
        let fallback = registry.rid_of("minecraft:water", &Properties::new()).unwrap();
        let state = registry.state_of(fallback).unwrap();
        assert_eq!(state.properties["liquid_depth"], PropertyValue::I32(0));
        assert_eq!(registry.rid_of("minecraft:unknown", &Properties::new()), None);
    }

    #[test]
    fn bool_and_byte_properties_coalesce() {
        let registry = catalogue().finalise();
        let mut via_byte = Properties::new();
        via_byte.insert("open_bit".into(), PropertyValue::U8(1));
        via_byte.insert("direction".into(), PropertyValue::I32(1));
        let mut via_bool = Properties::new();
        via_bool.insert("open_bit".into(), PropertyValue::Bool(true));
        via_bool.insert("direction".into(), PropertyValue::I32(1));
        assert_eq!(
            registry.rid_of("minecraft:lever", &via_bool),
            registry.rid_of("minecraft:lever", &via_byte),
        );
        assert!(registry.rid_of("minecraft:lever", &via_byte).is_some());
    }

    #[test]
    #[should_panic(expected = "cannot register the same state twice")]
    fn duplicate_registration_is_fatal() {
        let mut registry = catalogue();
        registry.register_state(BlockState::new("minecraft:stone"));
    }

    #[test]
    fn refinalisation_preserves_the_state_set() {
        let mut registry = catalogue();
        let before: Vec<BlockState> = registry.blocks.clone();

        registry.insert_custom_blocks(&[CustomBlockEntry {
            name: "ns:block".into(),
            properties: vec![BlockProperty {
                name: "color".into(),
                values: vec![
                    PropertyValue::String("red".into()),
                    PropertyValue::String("blue".into()),
                ],
            }],
            traits: vec!["facing_direction".into()],
        }]);
        let registry = registry.finalise();

        assert_eq!(registry.len(), before.len() + 12);
        for state in &before {
            let rid = registry.rid_of(&state.name, &state.properties).unwrap();
            assert_eq!(registry.state_of(rid), Some(state));
        }
    }

    #[test]
    fn custom_block_permutations_resolve() {
        let mut registry = catalogue();
        registry.insert_custom_blocks(&[CustomBlockEntry {
            name: "ns:block".into(),
            properties: vec![BlockProperty {
                name: "color".into(),
                values: vec![
                    PropertyValue::String("red".into()),
                    PropertyValue::String("blue".into()),
                ],
            }],
            traits: vec!["facing_direction".into()],
        }]);
        let registry = registry.finalise();

        let mut full = Properties::new();
        full.insert("color".into(), PropertyValue::String("red".into()));
        full.insert("facing_direction".into(), PropertyValue::String("north".into()));
        assert!(registry.rid_of("ns:block", &full).is_some());

        // A partial state falls back to the default (first registered)
        // permutation: red, facing north.
        let mut partial = Properties::new();
        partial.insert("color".into(), PropertyValue::String("red".into()));
        let rid = registry.rid_of("ns:block", &partial).unwrap();
        let state = registry.state_of(rid).unwrap();
        assert_eq!(state.properties["color"], PropertyValue::String("red".into()));
        assert_eq!(
            state.properties["facing_direction"],
            PropertyValue::String("north".into())
        );
    }

    #[test]
    fn minecraft_namespace_entries_are_ignored() {
        let mut registry = catalogue();
        let len = registry.len();
        registry.insert_custom_blocks(&[CustomBlockEntry {
            name: "minecraft:stone".into(),
            properties: Vec::new(),
            traits: Vec::new(),
        }]);
        assert_eq!(registry.len(), len);
    }

    #[test]
    fn network_hashes_round_trip_through_lookup() {
        let registry = catalogue().finalise();
        for rid in 0..registry.len() as u32 {
            let hash = registry.network_hash(rid).unwrap();
            assert_eq!(registry.runtime_id_from_hash(hash), Some(rid));
        }
    }

    #[test]
    fn classifier_feeds_capability_arrays() {
        let mut registry = BlockRegistry::with_classifier(|state| Capabilities {
            liquid: state.name.contains("water"),
            water: state.name.contains("water"),
            light_filter: if state.name.contains("water") { 2 } else { 15 },
            ..Default::default()
        });
        registry.register_state(BlockState::new("minecraft:air"));
        registry.register_state(BlockState::new("minecraft:water"));
        registry.register_state(BlockState::new("minecraft:stone"));
        let registry = registry.finalise();

        let water = registry.rid_of("minecraft:water", &Properties::new()).unwrap();
        let stone = registry.rid_of("minecraft:stone", &Properties::new()).unwrap();
        assert!(registry.liquid_block(water));
        assert!(registry.water_block(water));
        assert_eq!(registry.light_filter(water), 2);
        assert!(!registry.liquid_block(stone));
        assert_eq!(registry.light_filter(stone), 15);
    }

    #[test]
    fn vanilla_catalogue_loads() {
        let mut registry = BlockRegistry::new();
        registry.load_vanilla_states();
        let registry = registry.finalise();
        assert!(registry.len() > 100);
        assert!(registry.rid_of("minecraft:stone", &Properties::new()).is_some());
    }
}
