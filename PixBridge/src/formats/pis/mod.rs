//! PIS skeleton files
//!
//! An ordered bone list. That order is the bone index used by model skin
//! streams and animation channels.

use std::path::Path;

use glam::Mat4;

use super::pix::{FileKind, Header, PixFile, Section, Value, WriteOptions, global_section, validate_globals};
use crate::error::{Diagnostic, Error, Result};

pub const FORMAT_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct PisBone {
    pub name: String,
    pub parent: Option<usize>,
    /// Rest matrix, game basis. The file stores it transposed: each file
    /// row is one matrix column.
    pub transformation: Mat4,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PisSkeleton {
    pub name: String,
    pub bones: Vec<PisBone>,
}

impl PisSkeleton {
    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Parents must exist and precede their children; names are unique.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] naming the bad bone.
    pub fn validate(&self) -> Result<()> {
        for (index, bone) in self.bones.iter().enumerate() {
            let path = format!("Bone:{}", bone.name);
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(Error::inconsistent(
                        &path,
                        format!("parent {parent} does not precede bone {index}"),
                    ));
                }
            }
            if self.bones[..index].iter().any(|b| b.name == bone.name) {
                return Err(Error::inconsistent(&path, "duplicate bone name"));
            }
        }
        Ok(())
    }
}

/// Read a skeleton file.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`], [`Error::Inconsistent`].
pub fn read_pis<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PisSkeleton, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading skeleton {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pis(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed skeleton file.
///
/// # Errors
/// See [`read_pis`].
pub fn parse_pis(file: &mut PixFile, recount: bool) -> Result<(PisSkeleton, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Skeleton, &[FORMAT_VERSION])?;
    let diagnostics = validate_globals(file, FileKind::Skeleton, recount)?;

    let bones = match file.section("Bones") {
        Some(section) => section
            .children_named("Bone")
            .map(|bone| {
                let parent = bone.opt_int("Parent", -1);
                Ok(PisBone {
                    name: bone.req_str("Name")?.to_string(),
                    parent: usize::try_from(parent).ok(),
                    transformation: Mat4::from_cols_array(&bone.req_floats::<16>("Transformation")?),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    if let Some(declared) = file.section("Global").and_then(|g| g.prop("BoneCount")).and_then(Value::as_int) {
        if declared != bones.len() as i64 {
            return Err(Error::inconsistent(
                "Global",
                format!("BoneCount declares {declared} but {} present", bones.len()),
            ));
        }
    }

    let skeleton = PisSkeleton {
        name: header.name,
        bones,
    };
    skeleton.validate()?;
    tracing::debug!("Skeleton '{}': {} bone(s)", skeleton.name, skeleton.bones.len());
    Ok((skeleton, diagnostics))
}

/// Encode a skeleton.
///
/// # Errors
/// [`Error::Inconsistent`] when the bone list fails validation.
pub fn to_pix(skeleton: &PisSkeleton) -> Result<PixFile> {
    skeleton.validate()?;
    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Skeleton, FORMAT_VERSION, &skeleton.name).to_section());

    let mut bones = Section::new("Bones");
    for bone in &skeleton.bones {
        bones.push_section(
            Section::new("Bone")
                .with("Name", Value::string(&bone.name))
                .with("Parent", Value::Int(bone.parent.map_or(-1, |p| p as i64)))
                .with("Transformation", Value::hex(&bone.transformation.to_cols_array())),
        );
    }
    let mut body = PixFile::new();
    body.push(bones);

    file.push(global_section(
        &body,
        FileKind::Skeleton,
        vec![("BoneCount", Value::Int(skeleton.bones.len() as i64))],
    ));
    file.items.extend(body.items);
    Ok(file)
}

/// Write a skeleton file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pis<P: AsRef<Path>>(skeleton: &PisSkeleton, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing skeleton {}", path.display());
    to_pix(skeleton)?.write(path, options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::Vec3;

    pub(crate) fn two_bones() -> PisSkeleton {
        PisSkeleton {
            name: "arm".into(),
            bones: vec![
                PisBone {
                    name: "root".into(),
                    parent: None,
                    transformation: Mat4::IDENTITY,
                },
                PisBone {
                    name: "hinge".into(),
                    parent: Some(0),
                    transformation: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                },
            ],
        }
    }

    #[test]
    fn test_roundtrip() {
        let skeleton = two_bones();
        let file = to_pix(&skeleton).unwrap();
        let text = file.to_pix_string(&WriteOptions::default());
        let mut reparsed = PixFile::parse(&text).unwrap();
        assert_eq!(parse_pis(&mut reparsed, false).unwrap().0, skeleton);
    }

    #[test]
    fn test_transposed_layout() {
        let file = to_pix(&two_bones()).unwrap();
        let bone = file.section("Bones").unwrap().children_named("Bone").nth(1).unwrap();
        let values = bone.req_floats::<16>("Transformation").unwrap();
        // Translation lands in the last file row
        assert_eq!(&values[12..], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parent_must_precede() {
        let mut skeleton = two_bones();
        skeleton.bones[0].parent = Some(1);
        assert!(matches!(to_pix(&skeleton), Err(Error::Inconsistent { .. })));
    }
}
