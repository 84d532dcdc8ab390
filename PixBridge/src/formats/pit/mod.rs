//! PIT trait files: looks and variants
//!
//! Each `Look` holds one full `Material` section per model material. Each
//! `Variant` lists every part with a `visible` attribute.

mod textures;

use std::path::Path;

use super::pix::{FileKind, Header, PixFile, Section, Value, WriteOptions, global_section, validate_globals};
use crate::error::{Diagnostic, Error, Location, Result};
use crate::material::Material;
use crate::object::Variant;

pub use textures::{TextureExport, relocate_textures};

pub const FORMAT_VERSION: i64 = 1;

const VISIBLE: &str = "visible";

/// Parsed trait file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitTrait {
    pub name: String,
    /// `(look name, materials)` in file order.
    pub looks: Vec<(String, Vec<Material>)>,
    pub variants: Vec<Variant>,
}

impl PitTrait {
    /// Material aliases of the first look, the table's column order.
    #[must_use]
    pub fn material_ids(&self) -> Vec<String> {
        self.looks
            .first()
            .map(|(_, materials)| materials.iter().map(|m| m.alias.clone()).collect())
            .unwrap_or_default()
    }
}

fn read_variant(section: &Section, diagnostics: &mut Vec<Diagnostic>) -> Result<Variant> {
    let name = section.req_str("Name")?;
    let mut variant = Variant::including_all(name, std::iter::empty::<&str>());
    for part in section.children_named("Part") {
        let part_name = part.req_str("Name")?;
        let visible = part
            .children_named("Attribute")
            .find(|a| a.opt_str("Tag") == Some(VISIBLE))
            .map(|a| a.req_int("Value"))
            .transpose()?;
        let included = visible.unwrap_or_else(|| {
            diagnostics.push(Diagnostic::new(
                Location::section(format!("Variant:{name}/Part:{part_name}")),
                "no visible attribute, part treated as included",
            ));
            1
        });
        variant.add_part(part_name, included != 0);
    }
    Ok(variant)
}

fn write_variant(variant: &Variant) -> Section {
    let mut section = Section::new("Variant")
        .with("Name", Value::string(&variant.name))
        .with("PartCount", Value::Int(variant.parts().count() as i64));
    for (part, included) in variant.parts() {
        let mut part_section = Section::new("Part")
            .with("Name", Value::string(part))
            .with("AttributeCount", Value::Int(1));
        part_section.push_section(
            Section::new("Attribute")
                .with("Format", Value::token("INT"))
                .with("Tag", Value::string(VISIBLE))
                .with("Value", Value::Int(i64::from(included))),
        );
        section.push_section(part_section);
    }
    section
}

/// Read a trait file.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`], [`Error::Inconsistent`].
pub fn read_pit<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PitTrait, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading trait {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pit(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed trait file.
///
/// # Errors
/// See [`read_pit`].
pub fn parse_pit(file: &mut PixFile, recount: bool) -> Result<(PitTrait, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Trait, &[FORMAT_VERSION])?;
    let mut diagnostics = validate_globals(file, FileKind::Trait, recount)?;

    let looks = file
        .sections_named("Look")
        .map(|look| {
            let name = look.req_str("Name")?.to_string();
            let materials = look
                .children_named("Material")
                .map(Material::from_section)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| match e {
                    Error::Inconsistent { mut location, message } => {
                        location.section_path = format!("Look:{name}/{}", location.section_path);
                        Error::Inconsistent { location, message }
                    }
                    other => other,
                })?;
            Ok((name, materials))
        })
        .collect::<Result<Vec<_>>>()?;

    let variants = file
        .sections_named("Variant")
        .map(|v| read_variant(v, &mut diagnostics))
        .collect::<Result<Vec<_>>>()?;

    for diagnostic in &diagnostics {
        tracing::warn!("{}", diagnostic);
    }
    tracing::debug!("Trait '{}': {} look(s), {} variant(s)", header.name, looks.len(), variants.len());
    Ok((
        PitTrait {
            name: header.name,
            looks,
            variants,
        },
        diagnostics,
    ))
}

/// Encode a trait file.
///
/// # Errors
/// [`Error::Inconsistent`] when looks disagree on their material count.
pub fn to_pix(pit: &PitTrait) -> Result<PixFile> {
    let material_count = pit.looks.first().map_or(0, |(_, m)| m.len());
    if let Some((name, _)) = pit.looks.iter().find(|(_, m)| m.len() != material_count) {
        return Err(Error::inconsistent(
            &format!("Look:{name}"),
            format!("look differs from the first look's {material_count} material(s)"),
        ));
    }
    let part_count = pit.variants.first().map_or(0, |v| v.parts().count());

    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Trait, FORMAT_VERSION, &pit.name).to_section());

    let mut body = PixFile::new();
    for (name, materials) in &pit.looks {
        let mut look = Section::new("Look").with("Name", Value::string(name));
        for material in materials {
            look.push_section(material.to_section());
        }
        body.push(look);
    }
    for variant in &pit.variants {
        body.push(write_variant(variant));
    }

    file.push(global_section(
        &body,
        FileKind::Trait,
        vec![
            ("MaterialCount", Value::Int(material_count as i64)),
            ("PartCount", Value::Int(part_count as i64)),
        ],
    ));
    file.items.extend(body.items);
    Ok(file)
}

/// Write a trait file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pit<P: AsRef<Path>>(pit: &PitTrait, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing trait {}", path.display());
    to_pix(pit)?.write(path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::test_catalog as catalog;
    use pretty_assertions::assert_eq;

    fn sample() -> PitTrait {
        let catalog = catalog();
        let paint = Material::new("paint", "eut2.dif", &catalog).unwrap();
        let mut dark = paint.clone();
        dark.set_attribute("diffuse", &[0.1, 0.1, 0.1]).unwrap();
        let glass = Material::new("glass", "eut2.dif.spec", &catalog).unwrap();

        let mut light_only = Variant::including_all("light", ["body", "lights"]);
        light_only.set("body", false);
        PitTrait {
            name: "truck".into(),
            looks: vec![
                ("default".into(), vec![paint, glass.clone()]),
                ("dark".into(), vec![dark, glass]),
            ],
            variants: vec![Variant::including_all("default", ["body", "lights"]), light_only],
        }
    }

    #[test]
    fn test_roundtrip() {
        let pit = sample();
        let file = to_pix(&pit).unwrap();
        let global = file.section("Global").unwrap();
        assert_eq!(global.req_int("LookCount").unwrap(), 2);
        assert_eq!(global.req_int("VariantCount").unwrap(), 2);
        assert_eq!(global.req_int("MaterialCount").unwrap(), 2);

        let text = file.to_pix_string(&WriteOptions::default());
        let mut reparsed = PixFile::parse(&text).unwrap();
        let (back, diagnostics) = parse_pit(&mut reparsed, false).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(back, pit);
        assert_eq!(back.material_ids(), vec!["paint".to_string(), "glass".to_string()]);
    }

    #[test]
    fn test_variant_visibility_attribute() {
        let file = to_pix(&sample()).unwrap();
        let variant = file.sections_named("Variant").nth(1).unwrap();
        let body = variant.children_named("Part").next().unwrap();
        let attr = body.child("Attribute").unwrap();
        assert_eq!(attr.req_str("Tag").unwrap(), "visible");
        assert_eq!(attr.req_int("Value").unwrap(), 0);
    }

    #[test]
    fn test_ragged_looks_rejected() {
        let mut pit = sample();
        pit.looks[1].1.pop();
        assert!(matches!(to_pix(&pit), Err(Error::Inconsistent { .. })));
    }
}
