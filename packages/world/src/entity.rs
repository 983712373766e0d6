use bedrock_nbt::Compound;
use std::any::Any;

/// A live entity, as far as persistence is concerned. Behaviour lives
/// elsewhere; the provider only needs to know how to get an entity back into
/// NBT, which its [`EntityType`] does.
pub trait Entity: Send + Sync {
    fn entity_type(&self) -> &dyn EntityType;

    fn as_any(&self) -> &dyn Any;
}

/// A kind of entity that knows how to encode and decode its instances.
pub trait EntityType: Send + Sync {
    /// The savedata identifier, e.g. `minecraft:pig`.
    fn encode_identifier(&self) -> &str;

    /// Decode an entity from its saved NBT. `None` if the data does not
    /// describe a usable entity; the record is then skipped.
    ///
    /// The map always carries a `UniqueID`; the provider assigns a random one
    /// to records saved without it.
    fn decode_nbt(&self, data: Compound) -> Option<Box<dyn Entity>>;

    /// Encode an entity into the NBT map stored for it.
    fn encode_nbt(&self, entity: &dyn Entity) -> Compound;
}

/// Resolves savedata identifiers to entity types while loading chunks.
pub trait EntityRegistry: Send + Sync {
    fn lookup(&self, identifier: &str) -> Option<&dyn EntityType>;
}
