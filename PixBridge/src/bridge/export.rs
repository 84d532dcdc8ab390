//! Game object export
//!
//! Writes the model, trait and, when the scene carries them, collision,
//! prefab, skeleton and animation files of one root. Every file is encoded
//! before the first one is written, so a consistency error leaves the
//! output directory untouched.

use std::fs;
use std::path::{Path, PathBuf};

use super::Session;
use super::collision::collider_to_pic;
use super::convert::{GamePlacement, relative_to};
use super::mesh::mesh_to_pieces;
use super::prefab::export_prefab;
use crate::animation::{armature_to_skeleton, export_animation};
use crate::config::PimDialectSetting;
use crate::error::{Diagnostic, Error, Result};
use crate::formats::pic::{self, PicModel};
use crate::formats::pim::{self, ModelLocator, PimDialect, PimMaterial, PimModel, PimPart};
use crate::formats::pit::{self, PitTrait, TextureExport, relocate_textures};
use crate::formats::pix::PixFile;
use crate::formats::{pia, pip, pis};
use crate::object::GameObject;
use crate::scene::{ArmatureData, LocatorData, ObjectId, ObjectKind, SceneSource};

/// Outcome of an export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    /// Files written, model first.
    pub written: Vec<PathBuf>,
    pub textures: TextureExport,
    /// Data the file formats could not hold, dropped from the output.
    pub diagnostics: Vec<Diagnostic>,
}

/// Model dialect to write. `Preserve` keeps the dialect the object was
/// imported from, compact for objects created in the scene.
fn dialect(setting: PimDialectSetting, source: Option<PimDialect>) -> PimDialect {
    match setting {
        PimDialectSetting::Preserve => source.unwrap_or_default(),
        PimDialectSetting::Compact => PimDialect::Compact,
        PimDialectSetting::Exchange => PimDialect::Exchange,
    }
}

/// Output directory: the object's export path under the project root when
/// both are set, `out_dir` otherwise.
fn target_dir(session: &Session, game_object: &GameObject, out_dir: &Path) -> PathBuf {
    match &session.resolver {
        Some(resolver) if !game_object.export_path.is_empty() => {
            resolver.root().join(game_object.export_path.trim_start_matches('/'))
        }
        _ => out_dir.to_path_buf(),
    }
}

fn empty_parts(game_object: &GameObject) -> Vec<PimPart> {
    game_object
        .parts()
        .map(|name| PimPart {
            name: name.to_string(),
            ..PimPart::default()
        })
        .collect()
}

/// Export the game object rooted at `root`.
///
/// # Errors
/// [`Error::UnknownObject`] / [`Error::TypeMismatch`] for a bad root;
/// [`Error::Inconsistent`] from game object validation or geometry
/// conversion, and any encoding error of the prefab or animation files;
/// nothing is written then. IO errors.
pub fn export_game_object<S: SceneSource + ?Sized>(
    session: &mut Session,
    source: &S,
    root: ObjectId,
    out_dir: &Path,
) -> Result<ExportReport> {
    let root_object = source.object(root).ok_or(Error::UnknownObject(root))?;
    let game_object = root_object.game_object().ok_or_else(|| Error::TypeMismatch {
        message: format!("'{}' is not a game object root", root_object.name),
    })?;
    game_object.validate()?;
    if game_object.part_count() == 0 {
        return Err(Error::inconsistent("Part", "a game object needs at least one part"));
    }
    let name = game_object.name.clone();
    let dir = target_dir(session, game_object, out_dir);
    tracing::info!("Exporting '{}' to {}", name, dir.display());

    let config = &session.config;
    let scale = config.export.export_scale;
    let options = session.write_options();
    let root_transform = root_object.transform;
    let first_part = game_object.parts().next().unwrap_or_default().to_string();
    let part_slot = |id: ObjectId| {
        let part = game_object.part_of(id).unwrap_or(&first_part);
        game_object.part_index(part).unwrap_or(0)
    };

    let material_ids: Vec<String> = game_object.looks.material_ids().map(str::to_string).collect();
    let mut model = PimModel {
        name: name.clone(),
        dialect: dialect(config.export.pim_dialect, game_object.source_dialect),
        materials: game_object
            .looks
            .active_materials()
            .map(|m| PimMaterial {
                alias: m.alias.clone(),
                effect: m.effect.clone(),
            })
            .collect(),
        parts: empty_parts(game_object),
        ..PimModel::default()
    };
    let mut collision = PicModel {
        name: name.clone(),
        parts: empty_parts(game_object),
        ..PicModel::default()
    };
    let mut armature: Option<&ArmatureData> = None;

    for id in source.descendants(root) {
        let Some(object) = source.object(id) else { continue };
        let local = relative_to(root_transform, object.transform);
        match &object.kind {
            ObjectKind::Mesh(mesh) => {
                let slot = part_slot(id);
                for piece in mesh_to_pieces(mesh, &object.name, local, &material_ids, scale)? {
                    model.parts[slot].pieces.push(model.pieces.len());
                    model.pieces.push(piece);
                }
            }
            ObjectKind::Locator(LocatorData::Model { hookup }) => {
                let placement = GamePlacement::from_host(local, scale);
                let slot = part_slot(id);
                model.parts[slot].locators.push(model.locators.len());
                model.locators.push(ModelLocator {
                    name: object.name.clone(),
                    hookup: hookup.clone(),
                    position: placement.position,
                    rotation: placement.rotation,
                    scale: placement.scale,
                });
            }
            ObjectKind::Locator(LocatorData::Collision(collider)) => {
                let locator = collider_to_pic(
                    &object.name,
                    collider,
                    local,
                    &mut collision.pieces,
                    &config.collision,
                    scale,
                )?;
                let slot = part_slot(id);
                collision.parts[slot].locators.push(collision.locators.len());
                collision.locators.push(locator);
            }
            ObjectKind::Armature(data) => {
                if armature.is_some() {
                    tracing::warn!("'{}': extra armature '{}' ignored", name, object.name);
                } else {
                    armature = Some(data);
                }
            }
            ObjectKind::Locator(LocatorData::Prefab(_)) | ObjectKind::Root(_) | ObjectKind::Empty => {}
        }
    }

    let skeleton_file = format!("{name}.pis");
    if model.is_skinned() {
        let Some(armature) = armature else {
            return Err(Error::inconsistent(&format!("Model:{name}"), "skinned meshes need an armature"));
        };
        model.bones = armature.bones.iter().map(|b| b.name.clone()).collect();
        model.skeleton = Some(skeleton_file.clone());
    }

    let mut report = ExportReport::default();
    let model_path = dir.join(format!("{name}.{}", model.dialect.extension()));
    let model_file = pim::to_pix(&model, model.dialect)?;
    let mut staged: Vec<(PathBuf, PixFile)> = Vec::new();

    if !collision.locators.is_empty() {
        staged.push((dir.join(format!("{name}.pic")), pic::to_pix(&collision)?));
    }

    if let Some(armature) = armature {
        let skeleton = armature_to_skeleton(&name, armature, scale.recip());
        staged.push((dir.join(&skeleton_file), pis::to_pix(&skeleton)?));
        for animation in &armature.animations {
            let exported = export_animation(animation, armature, &skeleton_file, config.export.frame_step, scale)?;
            staged.push((dir.join(format!("{}.pia", animation.name)), pia::to_pix(&exported)?));
        }
    }

    let prefab_settings = config.prefab.clone();
    if let Some(prefab) = export_prefab(source, root, &mut session.registry, scale, &mut report.diagnostics)? {
        staged.push((dir.join(format!("{name}.pip")), pip::to_pix(&prefab, &prefab_settings)?));
    }

    let mut looks = Vec::with_capacity(game_object.looks.look_count());
    for look in game_object.looks.look_names() {
        looks.push((look.to_string(), game_object.looks.look_materials(look)?.to_vec()));
    }
    fs::create_dir_all(&dir)?;
    report.textures = relocate_textures(
        looks.iter_mut().flat_map(|(_, materials)| materials.iter_mut()),
        &dir,
        session.resolver.as_ref(),
        &session.config.export,
    )?;
    let traits = PitTrait {
        name: name.clone(),
        looks,
        variants: game_object.variants().cloned().collect(),
    };
    let trait_file = pit::to_pix(&traits)?;
    let mut files = vec![(model_path, model_file), (dir.join(format!("{name}.pit")), trait_file)];
    files.extend(staged);

    for (path, file) in files {
        tracing::debug!("Writing {}", path.display());
        file.write(&path, &options)?;
        report.written.push(path);
    }

    tracing::info!("Exported '{}': {} file(s)", name, report.written.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserve_follows_source_dialect() {
        let preserve = PimDialectSetting::Preserve;
        assert_eq!(dialect(preserve, Some(PimDialect::Exchange)), PimDialect::Exchange);
        assert_eq!(dialect(preserve, None), PimDialect::Compact);
        assert_eq!(dialect(PimDialectSetting::Compact, Some(PimDialect::Exchange)), PimDialect::Compact);
    }
}
