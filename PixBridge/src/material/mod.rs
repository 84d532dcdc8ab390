//! Materials, shader presets, looks and substances

pub mod aliasing;
mod definition;
mod looks;
mod presets;
mod substance;

pub use definition::{
    AttrFormat, AttributeValue, BASE_TEXTURE, FALLBACK_EFFECT, Material, NO_SUBSTANCE, NewAttributes,
    TextureSlot,
};
pub use looks::{DEFAULT_LOOK, LookTable, MaterialEdit};
pub use presets::{FlavorDef, PresetMatch, Schema, ShaderPreset, ShaderPresetCatalog};
pub use substance::{SUBSTANCE_LIBRARY, SubstanceCatalog};

#[cfg(test)]
pub(crate) use presets::tests::catalog as test_catalog;
