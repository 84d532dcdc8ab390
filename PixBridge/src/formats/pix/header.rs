//! `Header` / `Global` discipline shared by every PIX file kind

use super::section::{PixFile, Section, Value};
use crate::error::{Diagnostic, Error, Location, Result};

/// Tool identification written to `Header.Source`.
pub const SOURCE_TAG: &str = concat!("PixBridge ", env!("CARGO_PKG_VERSION"));

/// The `Header.Type` of a PIX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Model,
    Trait,
    Collision,
    Prefab,
    Skeleton,
    Animation,
}

impl FileKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Model => "Model",
            FileKind::Trait => "Trait",
            FileKind::Collision => "Collision",
            FileKind::Prefab => "Prefab",
            FileKind::Skeleton => "Skeleton",
            FileKind::Animation => "Animation",
        }
    }

    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "Model" => FileKind::Model,
            "Trait" => FileKind::Trait,
            "Collision" => FileKind::Collision,
            "Prefab" => FileKind::Prefab,
            "Skeleton" => FileKind::Skeleton,
            "Animation" => FileKind::Animation,
            _ => return None,
        })
    }

    /// Kind implied by a file name (`.pim.ef` counts as a model).
    #[must_use]
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".ef").unwrap_or(&name);
        let ext = name.rsplit('.').next()?;
        Some(match ext {
            "pim" => FileKind::Model,
            "pit" => FileKind::Trait,
            "pic" => FileKind::Collision,
            "pip" => FileKind::Prefab,
            "pis" => FileKind::Skeleton,
            "pia" => FileKind::Animation,
            _ => return None,
        })
    }

    /// `Global` count keys paired with the section type they count.
    #[must_use]
    pub fn count_keys(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FileKind::Model => &[
                ("MaterialCount", "Material"),
                ("PieceCount", "Piece"),
                ("PartCount", "Part"),
                ("LocatorCount", "Locator"),
            ],
            FileKind::Trait => &[
                ("LookCount", "Look"),
                ("VariantCount", "Variant"),
            ],
            FileKind::Collision => &[
                ("MaterialCount", "Material"),
                ("PieceCount", "Piece"),
                ("PartCount", "Part"),
                ("LocatorCount", "Locator"),
            ],
            FileKind::Prefab => &[
                ("NodeCount", "Node"),
                ("CurveCount", "Curve"),
                ("SignCount", "Sign"),
                ("SpawnPointCount", "SpawnPoint"),
                ("SemaphoreCount", "Semaphore"),
                ("MapPointCount", "MapPoint"),
                ("TriggerPointCount", "TriggerPoint"),
                ("IntersectionCount", "Intersection"),
            ],
            FileKind::Skeleton => &[],
            FileKind::Animation => &[
                ("BoneChannelCount", "BoneChannel"),
                ("CustomChannelCount", "CustomChannel"),
            ],
        }
    }
}

/// Parsed `Header` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub format_version: i64,
    pub source: String,
    pub kind: FileKind,
    pub name: String,
}

impl Header {
    #[must_use]
    pub fn new(kind: FileKind, format_version: i64, name: impl Into<String>) -> Self {
        Self {
            format_version,
            source: SOURCE_TAG.to_string(),
            kind,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn to_section(&self) -> Section {
        Section::new("Header")
            .with("FormatVersion", Value::Int(self.format_version))
            .with("Source", Value::string(&self.source))
            .with("Type", Value::string(self.kind.as_str()))
            .with("Name", Value::string(&self.name))
    }

    /// Read and check the header of `file`.
    ///
    /// # Errors
    /// [`Error::SchemaMismatch`] when the type differs from `expected` or the
    /// version is not in `versions`.
    pub fn read(file: &PixFile, expected: FileKind, versions: &[i64]) -> Result<Self> {
        let first = file
            .sections()
            .next()
            .ok_or_else(|| Error::inconsistent("Header", "file has no sections"))?;
        if first.type_name != "Header" {
            return Err(Error::inconsistent(
                &first.type_name,
                "file must start with a Header section",
            ));
        }

        let type_name = first.req_str("Type")?;
        let kind = FileKind::from_type_name(type_name).ok_or_else(|| Error::SchemaMismatch {
            what: "file type".to_string(),
            found: type_name.to_string(),
        })?;
        if kind != expected {
            return Err(Error::SchemaMismatch {
                what: format!("file type (expected {})", expected.as_str()),
                found: type_name.to_string(),
            });
        }

        let format_version = first.req_int("FormatVersion")?;
        if !versions.contains(&format_version) {
            return Err(Error::SchemaMismatch {
                what: format!("{} format version", expected.as_str()),
                found: format_version.to_string(),
            });
        }

        Ok(Self {
            format_version,
            source: first.opt_str("Source").unwrap_or_default().to_string(),
            kind,
            name: first.opt_str("Name").unwrap_or_default().to_string(),
        })
    }
}

/// Compare `Global` counts against the realized sections.
///
/// With `recount` the counts are corrected in place and each correction
/// is reported as a diagnostic; otherwise the first mismatch is an error.
///
/// # Errors
/// [`Error::Inconsistent`] on a mismatch when `recount` is false.
pub fn validate_globals(file: &mut PixFile, kind: FileKind, recount: bool) -> Result<Vec<Diagnostic>> {
    let realized: Vec<(&str, usize)> = kind
        .count_keys()
        .iter()
        .map(|&(key, section)| (key, file.count(section)))
        .collect();

    let global = file
        .section_mut("Global")
        .ok_or_else(|| Error::inconsistent("Global", "section is missing"))?;

    let mut diagnostics = Vec::new();
    for (key, actual) in realized {
        let declared = global.opt_int(key, 0);
        if declared == actual as i64 {
            continue;
        }
        let message = format!("{key} declares {declared} but {actual} present");
        if !recount {
            return Err(Error::Inconsistent {
                location: Location::section("Global"),
                message,
            });
        }
        tracing::warn!("Recounting Global.{}: {}", key, message);
        global.set_prop(key, Value::Int(actual as i64));
        diagnostics.push(Diagnostic::new(Location::section("Global"), message));
    }
    Ok(diagnostics)
}

/// Build a `Global` section with realized counts for `kind`, followed by
/// any extra properties.
#[must_use]
pub fn global_section(file: &PixFile, kind: FileKind, extra: Vec<(&str, Value)>) -> Section {
    let mut global = Section::new("Global");
    for &(key, section) in kind.count_keys() {
        global.push_prop(key, Value::Int(file.count(section) as i64));
    }
    for (key, value) in extra {
        global.push_prop(key, value);
    }
    global
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pix::parse_pix;

    fn sample(count: i64) -> PixFile {
        parse_pix(&format!(
            "Header {{\n    FormatVersion: 1\n    Source: \"t\"\n    Type: \"Trait\"\n    Name: \"n\"\n}}\nGlobal {{\n    LookCount: {count}\n    VariantCount: 0\n}}\nLook {{\n}}\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_header_checks() {
        let file = sample(1);
        let header = Header::read(&file, FileKind::Trait, &[1]).unwrap();
        assert_eq!(header.name, "n");
        assert!(matches!(
            Header::read(&file, FileKind::Model, &[1]),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            Header::read(&file, FileKind::Trait, &[2]),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_global_mismatch_rejected() {
        let mut file = sample(2);
        assert!(matches!(
            validate_globals(&mut file, FileKind::Trait, false),
            Err(Error::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_global_recount() {
        let mut file = sample(2);
        let diagnostics = validate_globals(&mut file, FileKind::Trait, true).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(file.section("Global").unwrap().req_int("LookCount").unwrap(), 1);
    }

    #[test]
    fn test_kind_from_extension() {
        use std::path::Path;
        assert_eq!(FileKind::from_extension(Path::new("a/truck.pim.ef")), Some(FileKind::Model));
        assert_eq!(FileKind::from_extension(Path::new("x.PIA")), Some(FileKind::Animation));
        assert_eq!(FileKind::from_extension(Path::new("x.tobj")), None);
    }
}
