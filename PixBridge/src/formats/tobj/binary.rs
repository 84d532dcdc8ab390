//! Binary TOBJ descriptor
//!
//! Layout (little endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `0x70b10a01` |
//! | 4 | 20 | reserved, zero |
//! | 24 | 1 | type (1 map1d, 2 map2d, 3 map3d, 5 cubemap) |
//! | 25 | 1 | mip filter |
//! | 26 | 3 | address mode U, V, W |
//! | 29 | 1 | no-compress flag |
//! | 30 | 1 | normal-map flag |
//! | 31 | 1 | color space (0 sRGB, 1 linear) |
//! | 32 | .. | per map: `u32` length, `u32` zero, UTF-8 bytes |

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{AddressMode, ColorSpace, MipFilter, TextureObject, TobjType};
use crate::error::{Error, Location, Result};

/// Magic number of binary TOBJ files.
pub const TOBJ_MAGIC: u32 = 0x70b1_0a01;

const RESERVED: usize = 20;

fn invalid(message: impl Into<String>) -> Error {
    Error::Malformed {
        location: Location::section("tobj"),
        message: message.into(),
    }
}

fn truncated(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Truncated {
            location: Location::section("tobj"),
        }
    } else {
        Error::Io(err)
    }
}

/// Parse a binary descriptor.
///
/// # Errors
/// [`Error::Malformed`] on a bad magic or unknown codes, [`Error::Truncated`]
/// when the data ends early.
pub fn parse_tobj_binary(data: &[u8]) -> Result<TextureObject> {
    let mut cursor = Cursor::new(data);

    let magic = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
    if magic != TOBJ_MAGIC {
        return Err(invalid(format!("bad magic {magic:#010x}")));
    }
    let mut reserved = [0u8; RESERVED];
    cursor.read_exact(&mut reserved).map_err(truncated)?;

    let mut fields = [0u8; 8];
    cursor.read_exact(&mut fields).map_err(truncated)?;
    let kind = TobjType::from_code(fields[0]).ok_or_else(|| invalid(format!("unknown type {}", fields[0])))?;
    let mip_filter =
        MipFilter::from_code(fields[1]).ok_or_else(|| invalid(format!("unknown mip filter {}", fields[1])))?;
    let mut address = [AddressMode::Repeat; 3];
    for (slot, &code) in address.iter_mut().zip(&fields[2..5]) {
        *slot = AddressMode::from_code(code).ok_or_else(|| invalid(format!("unknown address mode {code}")))?;
    }
    let color_space = if fields[7] == 0 { ColorSpace::Srgb } else { ColorSpace::Linear };

    let mut maps = Vec::with_capacity(kind.map_count());
    for _ in 0..kind.map_count() {
        let len = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let _pad = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        if len > data.len() {
            return Err(Error::Truncated {
                location: Location::section("tobj"),
            });
        }
        let mut bytes = vec![0u8; len];
        cursor.read_exact(&mut bytes).map_err(truncated)?;
        maps.push(String::from_utf8_lossy(&bytes).into_owned());
    }

    Ok(TextureObject {
        kind,
        maps,
        address,
        color_space,
        normal_map: fields[6] != 0,
        no_compress: fields[5] != 0,
        mip_filter,
    })
}

/// Serialize to the binary descriptor.
///
/// # Errors
/// [`Error::Inconsistent`] when the map count does not match the type.
pub fn serialize_tobj_binary(tobj: &TextureObject) -> Result<Vec<u8>> {
    tobj.validate()?;
    let mut out = Vec::with_capacity(64);
    out.write_u32::<LittleEndian>(TOBJ_MAGIC)?;
    out.write_all(&[0u8; RESERVED])?;
    out.write_all(&[
        tobj.kind.code(),
        tobj.mip_filter.code(),
        tobj.address[0].code(),
        tobj.address[1].code(),
        tobj.address[2].code(),
        u8::from(tobj.no_compress),
        u8::from(tobj.normal_map),
        u8::from(tobj.color_space == ColorSpace::Linear),
    ])?;
    for map in &tobj.maps {
        let normalized = map.replace('\\', "/");
        out.write_u32::<LittleEndian>(normalized.len() as u32)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_all(normalized.as_bytes())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_layout() {
        let tobj = TextureObject::map_2d("/material/a.dds");
        let bytes = serialize_tobj_binary(&tobj).unwrap();
        assert_eq!(&bytes[..4], &TOBJ_MAGIC.to_le_bytes());
        assert_eq!(bytes[24], 2);
        assert_eq!(&bytes[32..36], &15u32.to_le_bytes());
        assert_eq!(&bytes[40..], b"/material/a.dds");
        assert_eq!(parse_tobj_binary(&bytes).unwrap(), tobj);
    }

    #[test]
    fn test_cubemap_binary() {
        let faces = ["a+x", "a-x", "a+y", "a-y", "a+z", "a-z"].map(String::from);
        let tobj = TextureObject::cubemap(faces);
        let parsed = parse_tobj_binary(&serialize_tobj_binary(&tobj).unwrap()).unwrap();
        assert_eq!(parsed.maps[3], "a-y");
        assert_eq!(parsed.address, [AddressMode::ClampToEdge; 3]);
    }

    #[test]
    fn test_truncated_binary() {
        let bytes = serialize_tobj_binary(&TextureObject::map_2d("abc.dds")).unwrap();
        assert!(matches!(
            parse_tobj_binary(&bytes[..bytes.len() - 2]),
            Err(Error::Truncated { .. })
        ));
        assert!(matches!(parse_tobj_binary(&[1, 2, 3, 4]), Err(Error::Malformed { .. })));
    }
}
