//! Shader preset catalog
//!
//! Loaded once from a PIX-syntax library:
//!
//! ```text
//! Flavor {
//!     Type: "NMAP_TS"
//!     Name: "tsnmap"
//!     Texture {
//!         Tag: "texture_nmap"
//!         Value: ""
//!     }
//! }
//! Shader {
//!     PresetName: "Diffuse"
//!     Effect: "eut2.dif"
//!     Flavors: ( "NMAP_TS|NMAP_TS_UV" "SPEC" )
//!     Attribute {
//!         Format: FLOAT3
//!         Tag: "diffuse"
//!         Value: ( 1.0 1.0 1.0 )
//!     }
//! }
//! ```
//!
//! An effect string is the preset's base effect followed by at most one
//! flavor name per axis, in axis order.

use std::path::Path;

use indexmap::IndexMap;

use super::definition::{AttributeValue, TextureSlot};
use crate::error::{Error, Result};
use crate::formats::pix::{PixFile, Section, parse_pix};

/// One selectable flavor variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FlavorDef {
    /// Flavor type id (`NMAP_TS`).
    pub kind: String,
    /// Effect suffix, possibly dotted (`add.env`).
    pub name: String,
    pub attributes: IndexMap<String, AttributeValue>,
    pub textures: IndexMap<String, TextureSlot>,
}

/// A base shader preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPreset {
    pub preset_name: String,
    pub effect: String,
    /// Flavor axes; each holds mutually exclusive flavor types.
    pub axes: Vec<Vec<String>>,
    /// Whitelisted flavor suffixes, when restricted.
    pub combinations: Option<Vec<String>>,
    pub attributes: IndexMap<String, AttributeValue>,
    pub textures: IndexMap<String, TextureSlot>,
}

/// Result of matching an effect string.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetMatch<'a> {
    pub preset: &'a ShaderPreset,
    /// Active flavor type per axis (`None` where the axis is unused).
    pub active: Vec<Option<String>>,
}

impl PresetMatch<'_> {
    /// Active flavor types in axis order.
    pub fn flavors(&self) -> impl Iterator<Item = &str> {
        self.active.iter().flatten().map(String::as_str)
    }
}

/// Attribute and texture schema for an effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub attributes: IndexMap<String, AttributeValue>,
    pub textures: IndexMap<String, TextureSlot>,
}

/// The shader preset catalog.
#[derive(Debug, Clone, Default)]
pub struct ShaderPresetCatalog {
    presets: Vec<ShaderPreset>,
    flavors: IndexMap<String, FlavorDef>,
}

impl ShaderPresetCatalog {
    /// Load a library file.
    ///
    /// # Errors
    /// IO or parse errors.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = PixFile::read(path)?;
        let catalog = Self::from_pix(&file).map_err(|e| e.in_file(path))?;
        tracing::info!(
            "Loaded {} shader preset(s), {} flavor(s) from {}",
            catalog.presets.len(),
            catalog.flavors.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse library text.
    ///
    /// # Errors
    /// Grammar errors or [`Error::Inconsistent`] for dangling flavor types.
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_pix(&parse_pix(content)?)
    }

    fn from_pix(file: &PixFile) -> Result<Self> {
        let mut catalog = Self::default();
        for section in file.sections_named("Flavor") {
            let def = FlavorDef {
                kind: section.req_str("Type")?.to_string(),
                name: section.req_str("Name")?.to_string(),
                attributes: read_attributes(section)?,
                textures: read_textures(section)?,
            };
            catalog.flavors.insert(def.kind.clone(), def);
        }

        for section in file.sections_named("Shader") {
            let axes: Vec<Vec<String>> = match section.prop("Flavors") {
                Some(value) => value
                    .as_strs()
                    .ok_or_else(|| Error::inconsistent("Shader", "Flavors must be a string tuple"))?
                    .into_iter()
                    .map(|axis| axis.split('|').map(str::to_string).collect())
                    .collect(),
                None => Vec::new(),
            };
            for kind in axes.iter().flatten() {
                if !catalog.flavors.contains_key(kind) {
                    return Err(Error::inconsistent(
                        "Shader",
                        format!("flavor type '{kind}' is not defined"),
                    ));
                }
            }
            let combinations = section
                .prop("Combinations")
                .and_then(|v| v.as_strs())
                .map(|list| list.into_iter().map(str::to_string).collect());

            catalog.presets.push(ShaderPreset {
                preset_name: section.req_str("PresetName")?.to_string(),
                effect: section.req_str("Effect")?.to_string(),
                axes,
                combinations,
                attributes: read_attributes(section)?,
                textures: read_textures(section)?,
            });
        }
        Ok(catalog)
    }

    #[must_use]
    pub fn presets(&self) -> &[ShaderPreset] {
        &self.presets
    }

    #[must_use]
    pub fn flavor(&self, kind: &str) -> Option<&FlavorDef> {
        self.flavors.get(kind)
    }

    #[must_use]
    pub fn preset_by_name(&self, name: &str) -> Option<&ShaderPreset> {
        self.presets.iter().find(|p| p.preset_name == name)
    }

    /// Match an effect string to its preset and flavor list.
    ///
    /// # Errors
    /// [`Error::UnknownEffect`] when no preset matches, or more than one does.
    pub fn lookup(&self, effect: &str) -> Result<PresetMatch<'_>> {
        let mut found = Vec::new();
        for preset in &self.presets {
            let suffix = if effect == preset.effect {
                Some("")
            } else {
                effect
                    .strip_prefix(preset.effect.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
            };
            let Some(suffix) = suffix else { continue };
            let tokens: Vec<&str> = if suffix.is_empty() {
                Vec::new()
            } else {
                suffix.split('.').collect()
            };
            let mut active = vec![None; preset.axes.len()];
            self.match_axes(preset, &tokens, 0, &mut active, &mut |active: &[Option<String>]| {
                found.push(PresetMatch {
                    preset,
                    active: active.to_vec(),
                });
            });
        }

        found.retain(|m| self.combination_allowed(m));
        match found.len() {
            1 => Ok(found.remove(0)),
            _ => Err(Error::UnknownEffect {
                effect: effect.to_string(),
            }),
        }
    }

    fn match_axes(
        &self,
        preset: &ShaderPreset,
        tokens: &[&str],
        axis: usize,
        active: &mut [Option<String>],
        found: &mut dyn FnMut(&[Option<String>]),
    ) {
        if axis == preset.axes.len() {
            if tokens.is_empty() {
                found(active);
            }
            return;
        }
        // Axis unused
        self.match_axes(preset, tokens, axis + 1, active, found);

        for kind in &preset.axes[axis] {
            let Some(def) = self.flavors.get(kind) else { continue };
            let name_tokens: Vec<&str> = def.name.split('.').collect();
            if tokens.len() >= name_tokens.len() && tokens[..name_tokens.len()] == name_tokens[..] {
                active[axis] = Some(kind.clone());
                self.match_axes(preset, &tokens[name_tokens.len()..], axis + 1, active, found);
                active[axis] = None;
            }
        }
    }

    fn combination_allowed(&self, m: &PresetMatch<'_>) -> bool {
        match &m.preset.combinations {
            None => true,
            Some(list) => {
                let suffix = self.suffix(m.flavors());
                suffix.is_empty() || list.iter().any(|c| *c == suffix)
            }
        }
    }

    fn suffix<'a>(&self, kinds: impl Iterator<Item = &'a str>) -> String {
        kinds
            .filter_map(|k| self.flavors.get(k))
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Effect string for `preset` with the given active flavors.
    #[must_use]
    pub fn compose(&self, preset: &ShaderPreset, active: &[Option<String>]) -> String {
        let suffix = self.suffix(active.iter().flatten().map(String::as_str));
        if suffix.is_empty() {
            preset.effect.clone()
        } else {
            format!("{}.{suffix}", preset.effect)
        }
    }

    /// Attribute and texture schema of an effect: the preset's entries
    /// followed by those of each active flavor.
    ///
    /// # Errors
    /// [`Error::UnknownEffect`].
    pub fn schema(&self, effect: &str) -> Result<Schema> {
        let matched = self.lookup(effect)?;
        let mut schema = Schema {
            attributes: matched.preset.attributes.clone(),
            textures: matched.preset.textures.clone(),
        };
        for kind in matched.flavors() {
            if let Some(def) = self.flavors.get(kind) {
                for (tag, value) in &def.attributes {
                    schema.attributes.insert(tag.clone(), value.clone());
                }
                for (tag, slot) in &def.textures {
                    schema.textures.insert(tag.clone(), slot.clone());
                }
            }
        }
        Ok(schema)
    }

    /// Effect string after enabling or disabling flavor `kind`.
    ///
    /// Enabling replaces whatever flavor was active on the same axis.
    ///
    /// # Errors
    /// [`Error::UnknownEffect`] if `effect` itself is unknown, or
    /// [`Error::UnknownFlavor`] when the resulting combination is not in the
    /// catalog.
    pub fn toggle_flavor(&self, effect: &str, kind: &str, enable: bool) -> Result<String> {
        let matched = self.lookup(effect)?;
        let refused = |candidate: String| Error::UnknownFlavor {
            base: effect.to_string(),
            effect: candidate,
        };

        let Some(axis) = matched.preset.axes.iter().position(|a| a.iter().any(|k| k == kind)) else {
            let mut requested = effect.to_string();
            if let Some(def) = self.flavors.get(kind) {
                requested = format!("{effect}.{}", def.name);
            }
            return Err(refused(requested));
        };

        let mut active = matched.active.clone();
        if enable {
            active[axis] = Some(kind.to_string());
        } else if active[axis].as_deref() == Some(kind) {
            active[axis] = None;
        } else {
            return Ok(effect.to_string());
        }

        let candidate = self.compose(matched.preset, &active);
        match self.lookup(&candidate) {
            Ok(_) => Ok(candidate),
            Err(_) => Err(refused(candidate)),
        }
    }
}

fn read_attributes(section: &Section) -> Result<IndexMap<String, AttributeValue>> {
    section
        .children_named("Attribute")
        .map(|attr| {
            let tag = attr.req_str("Tag")?.to_string();
            Ok((tag, AttributeValue::from_section(attr)?))
        })
        .collect()
}

fn read_textures(section: &Section) -> Result<IndexMap<String, TextureSlot>> {
    section
        .children_named("Texture")
        .map(|tex| {
            let tag = tex.req_str("Tag")?.to_string();
            let slot = TextureSlot {
                tag: tag.clone(),
                path: tex.opt_str("Value").unwrap_or_default().to_string(),
                flags: tex.opt_int("Flags", 0) as u32,
                uv_aliases: Vec::new(),
            };
            Ok((tag, slot))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const LIBRARY: &str = r#"Flavor {
    Type: "NMAP_TS"
    Name: "tsnmap"
    Texture {
        Tag: "texture_nmap"
        Value: ""
    }
}
Flavor {
    Type: "NMAP_TS_UV"
    Name: "tsnmapuv"
    Texture {
        Tag: "texture_nmap"
        Value: ""
    }
}
Flavor {
    Type: "SPEC"
    Name: "spec"
    Attribute {
        Format: FLOAT3
        Tag: "specular"
        Value: ( 0.5 0.5 0.5 )
    }
}
Flavor {
    Type: "ENV"
    Name: "add.env"
    Texture {
        Tag: "texture_reflection"
        Value: "/material/environment/generic_reflection.tobj"
    }
}
Shader {
    PresetName: "Diffuse"
    Effect: "eut2.dif"
    Flavors: ( "NMAP_TS|NMAP_TS_UV" "SPEC" "ENV" )
    Combinations: ( "tsnmap" "tsnmapuv" "spec" "spec.add.env" "tsnmap.spec" )
    Attribute {
        Format: FLOAT3
        Tag: "diffuse"
        Value: ( 1.0 1.0 1.0 )
    }
    Texture {
        Tag: "texture_base"
        Value: ""
    }
}
Shader {
    PresetName: "Glass"
    Effect: "eut2.glass"
    Attribute {
        Format: FLOAT
        Tag: "shininess"
        Value: 60.0
    }
}
"#;

    pub(crate) fn catalog() -> ShaderPresetCatalog {
        ShaderPresetCatalog::parse(LIBRARY).unwrap()
    }

    #[test]
    fn test_lookup_flavors() {
        let catalog = catalog();
        let m = catalog.lookup("eut2.dif.spec.add.env").unwrap();
        assert_eq!(m.preset.preset_name, "Diffuse");
        assert_eq!(m.flavors().collect::<Vec<_>>(), ["SPEC", "ENV"]);
        assert_eq!(catalog.lookup("eut2.glass").unwrap().preset.preset_name, "Glass");
    }

    #[test]
    fn test_lookup_unknown() {
        let catalog = catalog();
        assert!(matches!(catalog.lookup("eut2.none"), Err(Error::UnknownEffect { .. })));
        // Out of axis order
        assert!(catalog.lookup("eut2.dif.spec.tsnmap").is_err());
        // Not whitelisted
        assert!(catalog.lookup("eut2.dif.tsnmap.spec.add.env").is_err());
    }

    #[test]
    fn test_schema_merges_flavors() {
        let schema = catalog().schema("eut2.dif.tsnmap.spec").unwrap();
        let attrs: Vec<_> = schema.attributes.keys().map(String::as_str).collect();
        let textures: Vec<_> = schema.textures.keys().map(String::as_str).collect();
        assert_eq!(attrs, ["diffuse", "specular"]);
        assert_eq!(textures, ["texture_base", "texture_nmap"]);
    }

    #[test]
    fn test_toggle() {
        let catalog = catalog();
        assert_eq!(catalog.toggle_flavor("eut2.dif", "NMAP_TS", true).unwrap(), "eut2.dif.tsnmap");
        assert_eq!(
            catalog.toggle_flavor("eut2.dif.tsnmap", "NMAP_TS_UV", true).unwrap(),
            "eut2.dif.tsnmapuv"
        );
        assert_eq!(catalog.toggle_flavor("eut2.dif.spec", "SPEC", false).unwrap(), "eut2.dif");
    }

    #[test]
    fn test_toggle_into_unknown_combination() {
        let catalog = catalog();
        let err = catalog.toggle_flavor("eut2.dif.tsnmap", "ENV", true).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownFlavor { ref base, ref effect } if base == "eut2.dif.tsnmap" && effect == "eut2.dif.tsnmap.add.env"
        ));
        assert!(matches!(
            catalog.toggle_flavor("eut2.glass", "SPEC", true),
            Err(Error::UnknownFlavor { .. })
        ));
    }
}
