//! Texture object descriptors (`.tobj`)
//!
//! A TOBJ names one image (or six for cubemaps, in `+x -x +y -y +z -z`
//! order) plus sampler state. Two encodings are supported: a textual PIX
//! form and the binary game descriptor. [`read_tobj`] detects which one a
//! file uses.

mod binary;
mod text;

pub use binary::{TOBJ_MAGIC, parse_tobj_binary, serialize_tobj_binary};
pub use text::{parse_tobj_text, serialize_tobj_text};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TobjEncoding;
use crate::error::{Error, Result};
use crate::resolver::ProjectResolver;

/// Image extensions considered when looking for a TOBJ's texture, in
/// preference order.
pub const TEXTURE_EXTENSIONS: [&str; 3] = ["dds", "png", "tga"];

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TobjType {
    Map1D,
    #[default]
    Map2D,
    Map3D,
    Cubemap,
}

impl TobjType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TobjType::Map1D => "map1d",
            TobjType::Map2D => "map2d",
            TobjType::Map3D => "map3d",
            TobjType::Cubemap => "cubemap",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "map1d" => TobjType::Map1D,
            "map2d" => TobjType::Map2D,
            "map3d" => TobjType::Map3D,
            "cubemap" => TobjType::Cubemap,
            _ => return None,
        })
    }

    /// Number of map names this type carries.
    #[must_use]
    pub fn map_count(self) -> usize {
        if self == TobjType::Cubemap { 6 } else { 1 }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            TobjType::Map1D => 1,
            TobjType::Map2D => 2,
            TobjType::Map3D => 3,
            TobjType::Cubemap => 5,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => TobjType::Map1D,
            2 => TobjType::Map2D,
            3 => TobjType::Map3D,
            5 => TobjType::Cubemap,
            _ => return None,
        })
    }
}

/// Per-axis address mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    Clamp,
    ClampToEdge,
    Mirror,
}

impl AddressMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AddressMode::Repeat => "repeat",
            AddressMode::Clamp => "clamp",
            AddressMode::ClampToEdge => "clamp_to_edge",
            AddressMode::Mirror => "mirror",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "repeat" => AddressMode::Repeat,
            "clamp" => AddressMode::Clamp,
            "clamp_to_edge" => AddressMode::ClampToEdge,
            "mirror" => AddressMode::Mirror,
            _ => return None,
        })
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            AddressMode::Repeat => 0,
            AddressMode::Clamp => 1,
            AddressMode::ClampToEdge => 2,
            AddressMode::Mirror => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => AddressMode::Repeat,
            1 => AddressMode::Clamp,
            2 => AddressMode::ClampToEdge,
            3 => AddressMode::Mirror,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

impl ColorSpace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColorSpace::Srgb => "srgb",
            ColorSpace::Linear => "linear",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "srgb" => Some(ColorSpace::Srgb),
            "linear" => Some(ColorSpace::Linear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MipFilter {
    #[default]
    Default,
    Nearest,
    Linear,
    NoMips,
}

impl MipFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MipFilter::Default => "default",
            MipFilter::Nearest => "nearest",
            MipFilter::Linear => "linear",
            MipFilter::NoMips => "nomips",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "default" => MipFilter::Default,
            "nearest" => MipFilter::Nearest,
            "linear" => MipFilter::Linear,
            "nomips" => MipFilter::NoMips,
            _ => return None,
        })
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            MipFilter::Default => 0,
            MipFilter::Nearest => 1,
            MipFilter::Linear => 2,
            MipFilter::NoMips => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => MipFilter::Default,
            1 => MipFilter::Nearest,
            2 => MipFilter::Linear,
            3 => MipFilter::NoMips,
            _ => return None,
        })
    }
}

/// A parsed texture object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureObject {
    pub kind: TobjType,
    /// Map names as written: relative to the TOBJ, or `/`-prefixed
    /// project-relative.
    pub maps: Vec<String>,
    /// U, V, W address modes.
    pub address: [AddressMode; 3],
    pub color_space: ColorSpace,
    pub normal_map: bool,
    pub no_compress: bool,
    pub mip_filter: MipFilter,
}

impl TextureObject {
    /// A 2D texture with default sampler state.
    #[must_use]
    pub fn map_2d(map: impl Into<String>) -> Self {
        Self {
            maps: vec![map.into()],
            ..Self::default()
        }
    }

    /// A cubemap from six faces in `+x -x +y -y +z -z` order.
    #[must_use]
    pub fn cubemap(faces: [String; 6]) -> Self {
        Self {
            kind: TobjType::Cubemap,
            maps: faces.to_vec(),
            address: [AddressMode::ClampToEdge; 3],
            ..Self::default()
        }
    }

    /// Check the map count against the type.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] when the count is wrong.
    pub fn validate(&self) -> Result<()> {
        let expected = self.kind.map_count();
        if self.maps.len() != expected {
            return Err(Error::inconsistent(
                "TextureObject",
                format!(
                    "{} expects {expected} map(s), found {}",
                    self.kind.as_str(),
                    self.maps.len()
                ),
            ));
        }
        Ok(())
    }

    /// Absolute paths of the referenced images.
    ///
    /// Names starting with `/` need a resolver; everything else is taken
    /// relative to the directory holding the TOBJ.
    ///
    /// # Errors
    /// [`Error::Resolve`] when a project-relative name cannot be located.
    pub fn resolve_maps(&self, tobj_path: &Path, resolver: Option<&ProjectResolver>) -> Result<Vec<PathBuf>> {
        let dir = tobj_path.parent().unwrap_or_else(|| Path::new("."));
        self.maps
            .iter()
            .map(|map| {
                let normalized = map.replace('\\', "/");
                if normalized.starts_with('/') {
                    match resolver {
                        Some(r) => r.resolve(&normalized),
                        None => Err(Error::Resolve {
                            path: normalized,
                            bases: 0,
                        }),
                    }
                } else {
                    Ok(dir.join(normalized))
                }
            })
            .collect()
    }
}

/// Read a TOBJ in either encoding.
///
/// # Errors
/// IO errors, or parse errors of the detected encoding.
pub fn read_tobj<P: AsRef<Path>>(path: P) -> Result<TextureObject> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    parse_tobj_bytes(&bytes).map_err(|e| e.in_file(path))
}

/// Parse TOBJ bytes, detecting binary by its magic.
///
/// # Errors
/// Parse errors of the detected encoding.
pub fn parse_tobj_bytes(bytes: &[u8]) -> Result<TextureObject> {
    if is_binary(bytes) {
        parse_tobj_binary(bytes)
    } else {
        let text = String::from_utf8_lossy(bytes);
        parse_tobj_text(&text)
    }
}

/// Whether `bytes` start with the binary descriptor magic.
#[must_use]
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == TOBJ_MAGIC
}

/// Write a TOBJ with the given encoding.
///
/// # Errors
/// IO errors, or [`Error::Inconsistent`] for an invalid map count.
pub fn write_tobj<P: AsRef<Path>>(tobj: &TextureObject, path: P, encoding: TobjEncoding) -> Result<()> {
    tobj.validate()?;
    let path = path.as_ref();
    tracing::debug!("Writing TOBJ {}", path.display());
    match encoding {
        TobjEncoding::Text => fs::write(path, serialize_tobj_text(tobj))?,
        TobjEncoding::Binary => fs::write(path, serialize_tobj_binary(tobj)?)?,
    }
    Ok(())
}

/// First image sharing the TOBJ's stem in its directory.
#[must_use]
pub fn discover_sibling_texture(tobj_path: &Path) -> Option<PathBuf> {
    let stem = tobj_path.file_stem()?.to_string_lossy();
    let dir = tobj_path.parent().unwrap_or_else(|| Path::new("."));
    TEXTURE_EXTENSIONS.iter().find_map(|ext| {
        let candidate = dir.join(format!("{stem}.{ext}"));
        candidate.is_file().then_some(candidate)
    })
}

/// Create `<stem>.tobj` next to `image_path` unless one already exists.
///
/// Returns the TOBJ path and whether it was newly written.
///
/// # Errors
/// IO errors while writing.
pub fn synthesize_for_texture(image_path: &Path, encoding: TobjEncoding) -> Result<(PathBuf, bool)> {
    let tobj_path = image_path.with_extension("tobj");
    if tobj_path.exists() {
        return Ok((tobj_path, false));
    }
    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Resolve {
            path: image_path.display().to_string(),
            bases: 0,
        })?;
    write_tobj(&TextureObject::map_2d(file_name), &tobj_path, encoding)?;
    tracing::info!("Synthesized {}", tobj_path.display());
    Ok((tobj_path, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_encoding() {
        let tobj = TextureObject::map_2d("a.dds");
        let text = serialize_tobj_text(&tobj);
        let bin = serialize_tobj_binary(&tobj).unwrap();
        assert!(!is_binary(text.as_bytes()));
        assert!(is_binary(&bin));
        assert_eq!(parse_tobj_bytes(text.as_bytes()).unwrap(), tobj);
        assert_eq!(parse_tobj_bytes(&bin).unwrap(), tobj);
    }

    #[test]
    fn test_sibling_discovery_prefers_dds() {
        let dir = tempfile::tempdir().unwrap();
        let tobj_path = dir.path().join("paint.tobj");
        fs::write(dir.path().join("paint.png"), b"png").unwrap();
        assert_eq!(discover_sibling_texture(&tobj_path), Some(dir.path().join("paint.png")));
        fs::write(dir.path().join("paint.dds"), b"dds").unwrap();
        assert_eq!(discover_sibling_texture(&tobj_path), Some(dir.path().join("paint.dds")));
    }

    #[test]
    fn test_synthesize_once() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("decal.tga");
        fs::write(&image, b"tga").unwrap();
        let (path, created) = synthesize_for_texture(&image, TobjEncoding::Text).unwrap();
        assert!(created);
        assert_eq!(read_tobj(&path).unwrap().maps, vec!["decal.tga".to_string()]);
        let (_, again) = synthesize_for_texture(&image, TobjEncoding::Text).unwrap();
        assert!(!again);
    }

    #[test]
    fn test_resolve_maps() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        fs::create_dir_all(root.join("material")).unwrap();
        fs::write(root.join("material/sky.dds"), b"").unwrap();
        let resolver = ProjectResolver::new(&root, false);

        let tobj = TextureObject::map_2d("/material/sky.dds");
        let tobj_path = root.join("model/sky.tobj");
        let maps = tobj.resolve_maps(&tobj_path, Some(&resolver)).unwrap();
        assert_eq!(maps, vec![root.join("material/sky.dds")]);
        assert!(tobj.resolve_maps(&tobj_path, None).is_err());

        let local = TextureObject::map_2d("sky.dds");
        assert_eq!(local.resolve_maps(&tobj_path, None).unwrap(), vec![root.join("model/sky.dds")]);
    }

    #[test]
    fn test_cubemap_count() {
        let faces = ["px", "nx", "py", "ny", "pz", "nz"].map(String::from);
        assert!(TextureObject::cubemap(faces).validate().is_ok());
        let mut broken = TextureObject::map_2d("a.dds");
        broken.kind = TobjType::Cubemap;
        assert!(broken.validate().is_err());
    }
}
