//! Texture relocation for trait export
//!
//! Texture paths inside the project become `//` paths. Paths outside it
//! are copied next to the exported trait file, with a TOBJ synthesized for
//! bare images.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ExportSettings;
use crate::error::Result;
use crate::formats::tobj::{discover_sibling_texture, synthesize_for_texture};
use crate::material::Material;
use crate::resolver::{ProjectResolver, is_virtual, normalize_path};

/// Files touched while relocating textures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureExport {
    pub copied: Vec<PathBuf>,
    pub synthesized: Vec<PathBuf>,
}

fn copy_into(source: &Path, out_dir: &Path, report: &mut TextureExport) -> Result<Option<PathBuf>> {
    let Some(name) = source.file_name() else {
        return Ok(None);
    };
    let target = out_dir.join(name);
    if target != source {
        fs::copy(source, &target)?;
        tracing::debug!("Copied {} -> {}", source.display(), target.display());
        report.copied.push(target.clone());
    }
    Ok(Some(target))
}

/// Copy one external texture. Returns the TOBJ path to reference.
fn relocate_one(source: &Path, out_dir: &Path, settings: &ExportSettings, report: &mut TextureExport) -> Result<Option<PathBuf>> {
    let is_tobj = source
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("tobj"));
    if is_tobj {
        if let Some(image) = discover_sibling_texture(source) {
            copy_into(&image, out_dir, report)?;
        }
        return copy_into(source, out_dir, report);
    }
    let Some(image) = copy_into(source, out_dir, report)? else {
        return Ok(None);
    };
    let (tobj, created) = synthesize_for_texture(&image, settings.tobj_encoding)?;
    if created {
        report.synthesized.push(tobj.clone());
    }
    Ok(Some(tobj))
}

/// Rewrite texture paths of `materials` for a trait file written to
/// `out_dir`.
///
/// Project paths are left alone; absolute paths under the project become
/// `//` paths; other absolute paths are copied when
/// `copy_external_textures` is set and referenced by file name.
///
/// # Errors
/// IO errors while copying or writing TOBJ files.
pub fn relocate_textures<'a>(
    materials: impl IntoIterator<Item = &'a mut Material>,
    out_dir: &Path,
    resolver: Option<&ProjectResolver>,
    settings: &ExportSettings,
) -> Result<TextureExport> {
    let mut report = TextureExport::default();
    let mut done: HashMap<String, String> = HashMap::new();

    for material in materials {
        for slot in material.textures.values_mut() {
            if slot.path.is_empty() || is_virtual(&slot.path) {
                continue;
            }
            if let Some(rewritten) = done.get(&slot.path) {
                slot.path.clone_from(rewritten);
                continue;
            }
            let source = PathBuf::from(&slot.path);
            if !source.is_absolute() {
                continue;
            }

            let rewritten = if let Some(virtual_path) = resolver.and_then(|r| r.to_virtual(&source)) {
                virtual_path
            } else if !settings.copy_external_textures {
                tracing::warn!("Texture {} lies outside the project and is not copied", source.display());
                continue;
            } else {
                match relocate_one(&source, out_dir, settings, &mut report)? {
                    Some(tobj) => resolver
                        .and_then(|r| r.to_virtual(&tobj))
                        .or_else(|| tobj.file_name().map(normalize_path))
                        .unwrap_or_else(|| normalize_path(&tobj)),
                    None => continue,
                }
            };
            done.insert(slot.path.clone(), rewritten.clone());
            slot.path = rewritten;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BASE_TEXTURE, test_catalog};

    fn material_with(path: &Path) -> Material {
        let mut material = Material::new("paint", "eut2.dif", &test_catalog()).unwrap();
        material.set_texture(BASE_TEXTURE, &normalize_path(path)).unwrap();
        material
    }

    #[test]
    fn test_external_image_is_copied_with_tobj() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        let root = dir.path().join("proj");
        let out_dir = root.join("vehicle/truck");
        fs::create_dir_all(&outside).unwrap();
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(outside.join("decal.png"), b"png").unwrap();

        let resolver = ProjectResolver::new(&root, false);
        let mut materials = vec![material_with(&outside.join("decal.png"))];
        let report = relocate_textures(&mut materials, &out_dir, Some(&resolver), &ExportSettings::default()).unwrap();

        assert!(out_dir.join("decal.png").is_file());
        assert_eq!(report.synthesized, vec![out_dir.join("decal.tobj")]);
        assert_eq!(materials[0].base_texture().unwrap().path, "//vehicle/truck/decal.tobj");
    }

    #[test]
    fn test_project_texture_not_copied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        fs::create_dir_all(root.join("material")).unwrap();
        fs::write(root.join("material/metal.tobj"), b"").unwrap();

        let resolver = ProjectResolver::new(&root, false);
        let mut materials = vec![material_with(&root.join("material/metal.tobj"))];
        let report = relocate_textures(&mut materials, &root, Some(&resolver), &ExportSettings::default()).unwrap();

        assert!(report.copied.is_empty());
        assert_eq!(materials[0].base_texture().unwrap().path, "//material/metal.tobj");
    }
}
