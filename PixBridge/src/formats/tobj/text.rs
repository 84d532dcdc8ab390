//! Textual TOBJ encoding (a single `TextureObject` PIX section)

use super::{AddressMode, ColorSpace, MipFilter, TextureObject, TobjType};
use crate::error::{Error, Result};
use crate::formats::pix::{PixFile, Section, Value, WriteOptions, parse_pix, serialize_pix};

const SECTION: &str = "TextureObject";

fn bad(key: &str, value: &str) -> Error {
    Error::inconsistent(SECTION, format!("unknown {key} '{value}'"))
}

/// Parse the textual encoding.
///
/// # Errors
/// Grammar errors, or [`Error::Inconsistent`] for unknown enum values.
pub fn parse_tobj_text(content: &str) -> Result<TextureObject> {
    let file = parse_pix(content)?;
    let section = file.req_section(SECTION)?;

    let kind_name = section.opt_str("Type").unwrap_or("map2d");
    let kind = TobjType::parse(kind_name).ok_or_else(|| bad("Type", kind_name))?;
    let maps = section
        .req("Maps")?
        .as_strs()
        .ok_or_else(|| Error::inconsistent(SECTION, "Maps must be a string tuple"))?
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut address = [AddressMode::Repeat; 3];
    for (slot, key) in address.iter_mut().zip(["AddrU", "AddrV", "AddrW"]) {
        if let Some(text) = section.opt_str(key) {
            *slot = AddressMode::parse(text).ok_or_else(|| bad(key, text))?;
        }
    }

    let color_space = match section.opt_str("ColorSpace") {
        Some(text) => ColorSpace::parse(text).ok_or_else(|| bad("ColorSpace", text))?,
        None => ColorSpace::Srgb,
    };
    let mip_filter = match section.opt_str("MipFilter") {
        Some(text) => MipFilter::parse(text).ok_or_else(|| bad("MipFilter", text))?,
        None => MipFilter::Default,
    };

    let tobj = TextureObject {
        kind,
        maps,
        address,
        color_space,
        normal_map: section.opt_int("NormalMap", 0) != 0,
        no_compress: section.opt_int("NoCompress", 0) != 0,
        mip_filter,
    };
    tobj.validate()?;
    Ok(tobj)
}

/// Serialize to the textual encoding.
#[must_use]
pub fn serialize_tobj_text(tobj: &TextureObject) -> String {
    let section = Section::new(SECTION)
        .with("Type", Value::string(tobj.kind.as_str()))
        .with("Maps", Value::StrVec(tobj.maps.clone()))
        .with("AddrU", Value::string(tobj.address[0].as_str()))
        .with("AddrV", Value::string(tobj.address[1].as_str()))
        .with("AddrW", Value::string(tobj.address[2].as_str()))
        .with("ColorSpace", Value::string(tobj.color_space.as_str()))
        .with("NormalMap", Value::Int(i64::from(tobj.normal_map)))
        .with("NoCompress", Value::Int(i64::from(tobj.no_compress)))
        .with("MipFilter", Value::string(tobj.mip_filter.as_str()));
    let mut file = PixFile::new();
    file.push(section);
    serialize_pix(&file, &WriteOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_layout() {
        let mut tobj = TextureObject::map_2d("paint_nmap.dds");
        tobj.normal_map = true;
        tobj.color_space = ColorSpace::Linear;
        let text = serialize_tobj_text(&tobj);
        assert!(text.starts_with("TextureObject {\n    Type: \"map2d\"\n    Maps: ( \"paint_nmap.dds\" )\n"));
        assert_eq!(parse_tobj_text(&text).unwrap(), tobj);
    }

    #[test]
    fn test_defaults_when_omitted() {
        let tobj = parse_tobj_text("TextureObject {\n    Maps: ( \"a.dds\" )\n}\n").unwrap();
        assert_eq!(tobj, TextureObject::map_2d("a.dds"));
    }

    #[test]
    fn test_unknown_address_mode() {
        let err = parse_tobj_text("TextureObject {\n    Maps: ( \"a.dds\" )\n    AddrU: \"wrap\"\n}\n");
        assert!(matches!(err, Err(Error::Inconsistent { .. })));
    }
}
