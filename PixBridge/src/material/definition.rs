//! Material state: effect, attributes, textures

use indexmap::IndexMap;

use super::presets::{Schema, ShaderPresetCatalog};
use crate::error::{Error, Result};
use crate::formats::pix::{Section, Value};
use crate::resolver::{to_file_form, to_scene_form};

/// Tag of the base color texture.
pub const BASE_TEXTURE: &str = "texture_base";

/// Substance value meaning "no physical material".
pub const NO_SUBSTANCE: &str = "none";

/// Effect used for synthesized stand-in materials.
pub const FALLBACK_EFFECT: &str = "eut2.dif";

/// Storage format of a material attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
}

impl AttrFormat {
    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            AttrFormat::Float => "FLOAT",
            AttrFormat::Float2 => "FLOAT2",
            AttrFormat::Float3 => "FLOAT3",
            AttrFormat::Float4 => "FLOAT4",
            AttrFormat::Int => "INT",
        }
    }

    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "FLOAT" => AttrFormat::Float,
            "FLOAT2" => AttrFormat::Float2,
            "FLOAT3" => AttrFormat::Float3,
            "FLOAT4" => AttrFormat::Float4,
            "INT" => AttrFormat::Int,
            _ => return None,
        })
    }

    #[must_use]
    pub fn width(self) -> usize {
        match self {
            AttrFormat::Float | AttrFormat::Int => 1,
            AttrFormat::Float2 => 2,
            AttrFormat::Float3 => 3,
            AttrFormat::Float4 => 4,
        }
    }

    fn for_width(width: usize) -> Self {
        match width {
            2 => AttrFormat::Float2,
            3 => AttrFormat::Float3,
            4 => AttrFormat::Float4,
            _ => AttrFormat::Float,
        }
    }
}

/// A numeric material attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    pub format: AttrFormat,
    pub values: Vec<f32>,
}

impl AttributeValue {
    #[must_use]
    pub fn floats(values: &[f32]) -> Self {
        Self {
            format: AttrFormat::for_width(values.len()),
            values: values.to_vec(),
        }
    }

    #[must_use]
    pub fn zeroed(format: AttrFormat) -> Self {
        Self {
            format,
            values: vec![0.0; format.width()],
        }
    }

    /// Read `Format` + `Value` from an `Attribute` section.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] for unknown formats or wrong widths.
    pub fn from_section(section: &Section) -> Result<Self> {
        let token = section.req_str("Format")?;
        let format = AttrFormat::parse(token)
            .ok_or_else(|| Error::inconsistent("Attribute", format!("unknown format '{token}'")))?;
        let value = section.req("Value")?;
        let values = value
            .as_floats()
            .ok_or_else(|| Error::inconsistent("Attribute", format!("{token} value is a {}", value.kind())))?;
        if values.len() != format.width() {
            return Err(Error::inconsistent(
                "Attribute",
                format!("{token} needs {} component(s), found {}", format.width(), values.len()),
            ));
        }
        Ok(Self { format, values })
    }

    fn to_value(&self) -> Value {
        match self.format {
            AttrFormat::Int => Value::Int(self.values.first().copied().unwrap_or(0.0) as i64),
            _ => Value::hex(&self.values),
        }
    }
}

/// One texture binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureSlot {
    pub tag: String,
    /// TOBJ path in scene form (`//` for project paths).
    pub path: String,
    pub flags: u32,
    /// UV layer aliases sampled by this texture.
    pub uv_aliases: Vec<String>,
}

/// How attributes new to a schema are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewAttributes {
    /// Preset defaults (fresh materials).
    Defaults,
    /// Zeroes (flavor toggles).
    Zeroed,
}

/// Material state as stored in one look cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub alias: String,
    pub effect: String,
    pub flags: u32,
    pub substance: String,
    pub attributes: IndexMap<String, AttributeValue>,
    pub textures: IndexMap<String, TextureSlot>,
}

impl Material {
    /// A material with preset defaults for `effect`.
    ///
    /// # Errors
    /// [`Error::UnknownEffect`].
    pub fn new(alias: impl Into<String>, effect: &str, catalog: &ShaderPresetCatalog) -> Result<Self> {
        let schema = catalog.schema(effect)?;
        let mut material = Self::untyped(alias, effect);
        material.migrate(&schema, NewAttributes::Defaults);
        Ok(material)
    }

    /// A material without schema attributes (model-only materials).
    #[must_use]
    pub fn untyped(alias: impl Into<String>, effect: &str) -> Self {
        Self {
            alias: alias.into(),
            effect: effect.to_string(),
            flags: 0,
            substance: NO_SUBSTANCE.to_string(),
            attributes: IndexMap::new(),
            textures: IndexMap::new(),
        }
    }

    /// Stand-in for a material referenced but not defined.
    #[must_use]
    pub fn fallback(index: usize) -> Self {
        Self::untyped(format!("_missing_material_{index}"), FALLBACK_EFFECT)
    }

    /// Reshape attributes and textures to `schema`: common tags keep their
    /// values, new tags are initialized per `init`, others are dropped.
    pub fn migrate(&mut self, schema: &Schema, init: NewAttributes) {
        let mut attributes = IndexMap::with_capacity(schema.attributes.len());
        for (tag, default) in &schema.attributes {
            let value = match self.attributes.get(tag) {
                Some(existing) if existing.format == default.format => existing.clone(),
                _ => match init {
                    NewAttributes::Defaults => default.clone(),
                    NewAttributes::Zeroed => AttributeValue::zeroed(default.format),
                },
            };
            attributes.insert(tag.clone(), value);
        }

        let mut textures = IndexMap::with_capacity(schema.textures.len());
        for (tag, default) in &schema.textures {
            let slot = match self.textures.get(tag) {
                Some(existing) => existing.clone(),
                None => match init {
                    NewAttributes::Defaults => TextureSlot {
                        path: to_scene_form(&default.path),
                        ..default.clone()
                    },
                    NewAttributes::Zeroed => TextureSlot {
                        tag: tag.clone(),
                        ..TextureSlot::default()
                    },
                },
            };
            textures.insert(tag.clone(), slot);
        }

        self.attributes = attributes;
        self.textures = textures;
    }

    /// Switch to another effect, migrating the attribute bag.
    ///
    /// # Errors
    /// [`Error::UnknownEffect`]; the material is untouched on failure.
    pub fn apply_effect(&mut self, catalog: &ShaderPresetCatalog, effect: &str) -> Result<()> {
        let schema = catalog.schema(effect)?;
        self.migrate(&schema, NewAttributes::Zeroed);
        self.effect = effect.to_string();
        Ok(())
    }

    /// Enable or disable one flavor.
    ///
    /// # Errors
    /// [`Error::UnknownFlavor`]; the material is untouched on failure.
    pub fn toggle_flavor(&mut self, catalog: &ShaderPresetCatalog, kind: &str, enable: bool) -> Result<()> {
        let effect = catalog.toggle_flavor(&self.effect, kind, enable)?;
        if effect != self.effect {
            tracing::debug!("Material '{}': {} -> {}", self.alias, self.effect, effect);
            self.apply_effect(catalog, &effect)?;
        }
        Ok(())
    }

    /// Set an attribute that exists in the current schema.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for tags outside the schema,
    /// [`Error::Inconsistent`] for a wrong component count.
    pub fn set_attribute(&mut self, tag: &str, values: &[f32]) -> Result<()> {
        let slot = self.attributes.get_mut(tag).ok_or_else(|| Error::UnknownName {
            kind: "attribute",
            name: tag.to_string(),
        })?;
        if slot.values.len() != values.len() {
            return Err(Error::inconsistent(
                "Material",
                format!("attribute '{tag}' has {} component(s), got {}", slot.values.len(), values.len()),
            ));
        }
        slot.values = values.to_vec();
        Ok(())
    }

    /// Point a texture slot of the current schema at `path`.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for tags outside the schema.
    pub fn set_texture(&mut self, tag: &str, path: &str) -> Result<()> {
        let slot = self.textures.get_mut(tag).ok_or_else(|| Error::UnknownName {
            kind: "texture",
            name: tag.to_string(),
        })?;
        slot.path = path.replace('\\', "/");
        Ok(())
    }

    #[must_use]
    pub fn attribute(&self, tag: &str) -> Option<&[f32]> {
        self.attributes.get(tag).map(|a| a.values.as_slice())
    }

    #[must_use]
    pub fn base_texture(&self) -> Option<&TextureSlot> {
        self.textures.get(BASE_TEXTURE)
    }

    /// Full `Material` section as written to trait files.
    #[must_use]
    pub fn to_section(&self) -> Section {
        let mut section = Section::new("Material")
            .with("Alias", Value::string(&self.alias))
            .with("Effect", Value::string(&self.effect))
            .with("Flags", Value::Int(i64::from(self.flags)))
            .with("AttributeCount", Value::Int(self.attributes.len() as i64 + 1))
            .with("TextureCount", Value::Int(self.textures.len() as i64));

        section.push_section(
            Section::new("Attribute")
                .with("Format", Value::token("STRING"))
                .with("Tag", Value::string("substance"))
                .with("Value", Value::string(&self.substance)),
        );
        for (tag, attr) in &self.attributes {
            section.push_section(
                Section::new("Attribute")
                    .with("Format", Value::token(attr.format.as_token()))
                    .with("Tag", Value::string(tag))
                    .with("Value", attr.to_value()),
            );
        }
        for (index, slot) in self.textures.values().enumerate() {
            section.push_section(
                Section::new("Texture")
                    .with("Tag", Value::string(format!("texture[{index}]:{}", slot.tag)))
                    .with("Value", Value::string(to_file_form(&slot.path)))
                    .with("Flags", Value::Int(i64::from(slot.flags)))
                    .with("TexCoords", Value::StrVec(slot.uv_aliases.clone())),
            );
        }
        section
    }

    /// Parse a `Material` section written by [`Material::to_section`].
    ///
    /// # Errors
    /// [`Error::Inconsistent`] on missing or mistyped fields.
    pub fn from_section(section: &Section) -> Result<Self> {
        let mut material = Self::untyped(section.req_str("Alias")?, section.req_str("Effect")?);
        material.flags = section.opt_int("Flags", 0) as u32;

        for attr in section.children_named("Attribute") {
            let tag = attr.req_str("Tag")?;
            if tag == "substance" {
                material.substance = attr.req_str("Value")?.to_string();
                continue;
            }
            material.attributes.insert(tag.to_string(), AttributeValue::from_section(attr)?);
        }
        for tex in section.children_named("Texture") {
            let raw_tag = tex.req_str("Tag")?;
            let tag = raw_tag.rsplit(':').next().unwrap_or(raw_tag).to_string();
            let uv_aliases = tex
                .prop("TexCoords")
                .and_then(Value::as_strs)
                .map(|v| v.into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            material.textures.insert(
                tag.clone(),
                TextureSlot {
                    tag,
                    path: to_scene_form(tex.opt_str("Value").unwrap_or_default()),
                    flags: tex.opt_int("Flags", 0) as u32,
                    uv_aliases,
                },
            );
        }

        let declared = section.opt_int("AttributeCount", -1);
        let realized = material.attributes.len() as i64 + 1;
        if declared >= 0 && declared != realized && declared != realized - 1 {
            return Err(Error::inconsistent(
                "Material",
                format!("AttributeCount declares {declared} but {realized} present"),
            ));
        }
        Ok(material)
    }
}
