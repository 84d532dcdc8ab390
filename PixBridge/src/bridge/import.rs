//! Game object import
//!
//! Every sibling file is parsed before a single host object is created, so
//! a malformed file aborts the import with nothing published. Consistency
//! problems that have a sensible fallback become diagnostics instead.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::Session;
use super::collision::collider_from_pic;
use super::convert::host_transform;
use super::mesh::piece_to_mesh;
use super::prefab::import_prefab;
use crate::animation::{import_animation, skeleton_to_armature};
use crate::error::{Diagnostic, Error, Location, Result};
use crate::formats::pic::{PicModel, read_pic};
use crate::formats::pim::{PimModel, PimPart, read_pim, weld_piece};
use crate::formats::pip::{PipPrefab, read_pip};
use crate::formats::pis::{PisSkeleton, read_pis};
use crate::formats::pia::read_pia;
use crate::formats::pit::{PitTrait, read_pit};
use crate::material::aliasing::{check_eligible, import_alias};
use crate::material::{DEFAULT_LOOK, LookTable, Material};
use crate::object::{DEFAULT_PART, DEFAULT_VARIANT, GameObject};
use crate::prefab::{LocatorSnapshot, PrefabLocator};
use crate::scene::{LocatorData, ObjectId, ObjectKind, SceneObject, SceneSink};

/// The files making up one game object, found next to its model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFiles {
    /// Object name: the model file name without `.pim` / `.pim.ef`.
    pub stem: String,
    pub model: PathBuf,
    pub traits: Option<PathBuf>,
    pub collision: Option<PathBuf>,
    pub prefab: Option<PathBuf>,
    pub skeleton: Option<PathBuf>,
    /// Every `.pia` in the directory; the ones animating this skeleton are
    /// picked after parsing.
    pub animations: Vec<PathBuf>,
}

fn model_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let lower = name.to_ascii_lowercase();
    let cut = if lower.ends_with(".pim.ef") {
        ".pim.ef".len()
    } else if lower.ends_with(".pim") {
        ".pim".len()
    } else {
        return None;
    };
    Some(name[..name.len() - cut].to_string())
}

impl ObjectFiles {
    /// Find the sibling files of a model.
    ///
    /// # Errors
    /// [`Error::SchemaMismatch`] when `model` is not a model file; IO
    /// errors while listing the directory.
    pub fn discover(model: &Path) -> Result<Self> {
        let stem = model_stem(model).ok_or_else(|| Error::SchemaMismatch {
            what: "model file".to_string(),
            found: model.display().to_string(),
        })?;
        let dir = model.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let sibling = |extension: &str| Some(dir.join(format!("{stem}.{extension}"))).filter(|p| p.is_file());

        let mut animations = Vec::new();
        if sibling("pis").is_some() {
            for entry in WalkDir::new(&dir).max_depth(1).sort_by_file_name() {
                let entry = entry?;
                let is_pia = entry
                    .path()
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("pia"));
                if entry.file_type().is_file() && is_pia {
                    animations.push(entry.into_path());
                }
            }
        }

        Ok(Self {
            traits: sibling("pit"),
            collision: sibling("pic"),
            prefab: sibling("pip"),
            skeleton: sibling("pis"),
            model: model.to_path_buf(),
            stem,
            animations,
        })
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub root: ObjectId,
    /// Descendants created under the root, in creation order.
    pub objects: Vec<ObjectId>,
    /// Files that contributed.
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Staged {
    object: SceneObject,
    part: Option<String>,
}

/// Everything parsed and converted, waiting for host ids.
struct Plan {
    game_object: GameObject,
    objects: Vec<Staged>,
    /// Prefab connections as indices into `objects`.
    connections: Vec<(usize, usize)>,
    files: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

fn note(diagnostics: &mut Vec<Diagnostic>, section: impl Into<String>, message: impl Into<String>) {
    let diagnostic = Diagnostic::new(Location::section(section), message);
    tracing::warn!("{}", diagnostic);
    diagnostics.push(diagnostic);
}

fn part_holding(parts: &[PimPart], pick: impl Fn(&PimPart) -> bool) -> Option<String> {
    parts.iter().find(|p| pick(p)).map(|p| p.name.clone())
}

/// Import the game object whose model is `model`, publishing it to `sink`.
///
/// # Errors
/// Any parse or consistency error of a sibling file (nothing is created);
/// sink errors while publishing.
pub fn import_game_object<S: SceneSink + ?Sized>(session: &mut Session, model: &Path, sink: &mut S) -> Result<ImportReport> {
    tracing::info!("Importing game object from {}", model.display());
    let files = ObjectFiles::discover(model)?;
    let plan = stage(session, &files)?;
    commit(plan, session, sink)
}

struct Parsed {
    model: PimModel,
    traits: Option<PitTrait>,
    collision: Option<PicModel>,
    skeleton: Option<PisSkeleton>,
    prefab: Option<PipPrefab>,
    files: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

/// Record a parsed sibling file.
fn keep<T>(path: &Path, parsed: Result<(T, Vec<Diagnostic>)>, seen: &mut (Vec<PathBuf>, Vec<Diagnostic>)) -> Result<T> {
    let (value, diagnostics) = parsed?;
    seen.0.push(path.to_path_buf());
    seen.1.extend(diagnostics);
    Ok(value)
}

fn parse_all(session: &Session, files: &ObjectFiles) -> Result<Parsed> {
    let recount = session.config.pix.recount_globals;
    let mut seen = (Vec::new(), Vec::new());
    let model = keep(&files.model, read_pim(&files.model, recount), &mut seen)?;
    let traits = files
        .traits
        .as_ref()
        .map(|p| keep(p, read_pit(p, recount), &mut seen))
        .transpose()?;
    let collision = files
        .collision
        .as_ref()
        .map(|p| keep(p, read_pic(p, recount), &mut seen))
        .transpose()?;
    let skeleton = files
        .skeleton
        .as_ref()
        .map(|p| keep(p, read_pis(p, recount), &mut seen))
        .transpose()?;
    let prefab = files
        .prefab
        .as_ref()
        .map(|p| keep(p, read_pip(p, recount), &mut seen))
        .transpose()?;
    let (files_read, diagnostics) = seen;
    Ok(Parsed {
        model,
        traits,
        collision,
        skeleton,
        prefab,
        files: files_read,
        diagnostics,
    })
}

fn stage(session: &Session, files: &ObjectFiles) -> Result<Plan> {
    let config = &session.config;
    let scale = config.import.import_scale;
    let Parsed {
        mut model,
        traits,
        collision,
        skeleton,
        prefab,
        files: mut files_read,
        mut diagnostics,
    } = parse_all(session, files)?;

    let mut animations = Vec::new();
    if let (Some(skeleton_path), Some(_)) = (&files.skeleton, &skeleton) {
        let wanted = skeleton_path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        for path in &files.animations {
            match read_pia(path, config.pix.recount_globals) {
                Ok((animation, found)) => {
                    let target = Path::new(&animation.skeleton)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_ascii_lowercase());
                    if target.as_deref() == Some(wanted.as_str()) {
                        files_read.push(path.clone());
                        diagnostics.extend(found);
                        animations.push(animation);
                    }
                }
                Err(e) => note(&mut diagnostics, path.display().to_string(), format!("animation skipped: {e}")),
            }
        }
    }

    // Parts
    let mut game_object = GameObject::empty(&files.stem);
    game_object.source_dialect = Some(model.dialect);
    let collision_parts = collision.as_ref().map_or(&[][..], |c| &c.parts[..]);
    for part in model.parts.iter().chain(collision_parts) {
        if game_object.part_index(&part.name).is_none() {
            game_object.add_part(&part.name)?;
        }
    }
    if game_object.part_count() == 0 {
        game_object.add_part(DEFAULT_PART)?;
    }
    let first_part = game_object.parts().next().unwrap_or(DEFAULT_PART).to_string();

    // Looks
    let material_ids: Vec<String> = model.materials.iter().map(|m| m.alias.clone()).collect();
    let mut looks = match &traits {
        Some(traits) => traits.looks.clone(),
        None => {
            let mut materials = Vec::with_capacity(model.materials.len());
            for reference in &model.materials {
                let material = Material::new(&reference.alias, &reference.effect, &session.catalog).unwrap_or_else(|e| {
                    note(
                        &mut diagnostics,
                        format!("Material:{}", reference.alias),
                        format!("{e}, kept without attributes"),
                    );
                    Material::untyped(&reference.alias, &reference.effect)
                });
                materials.push(material);
            }
            vec![(DEFAULT_LOOK.to_string(), materials)]
        }
    };
    if let Some(resolver) = &session.resolver {
        for material in looks.iter_mut().flat_map(|(_, materials)| materials.iter_mut()) {
            if check_eligible(material, &config.materials).is_err() {
                continue;
            }
            if let Err(e) = import_alias(material, &session.catalog, &config.materials, resolver) {
                note(&mut diagnostics, format!("Material:{}", material.alias), format!("alias not imported: {e}"));
            }
        }
    }
    let (table, found) = LookTable::assemble(&material_ids, looks);
    diagnostics.extend(found);
    game_object.looks = table;
    if session.substances.names().next().is_some() {
        let mut unknown = Vec::new();
        for material in game_object.looks.active_materials() {
            if let Err(e) = session.substances.validate(material) {
                unknown.push((material.alias.clone(), e.to_string()));
            }
        }
        for (alias, message) in unknown {
            note(&mut diagnostics, format!("Material:{alias}"), message);
        }
    }

    // Variants
    for variant in traits.map(|t| t.variants).unwrap_or_default() {
        let name = variant.name.clone();
        if let Err(e) = game_object.push_variant(variant) {
            note(&mut diagnostics, format!("Variant:{name}"), format!("{e}, variant dropped"));
        }
    }
    if game_object.variant_count() == 0 {
        game_object.add_variant(DEFAULT_VARIANT)?;
    }

    // Skin bones
    let bones: Vec<Option<usize>> = match &skeleton {
        Some(skeleton) => model
            .bones
            .iter()
            .map(|name| {
                let index = skeleton.bone_index(name);
                if index.is_none() {
                    note(
                        &mut diagnostics,
                        format!("Bone:{name}"),
                        format!("bone not in skeleton '{}', influences dropped", skeleton.name),
                    );
                }
                index
            })
            .collect(),
        None => {
            if model.is_skinned() {
                note(&mut diagnostics, "Bones", "skinned model without a skeleton file, skin dropped");
            }
            Vec::new()
        }
    };

    let mut objects = Vec::new();
    let pieces = std::mem::take(&mut model.pieces);
    for (index, mut piece) in pieces.into_iter().enumerate() {
        if config.import.weld {
            weld_piece(&mut piece, config.import.weld_precision);
        }
        let alias = match model.materials.get(piece.material) {
            Some(material) => material.alias.clone(),
            None => {
                let fallback = Material::fallback(index);
                note(
                    &mut diagnostics,
                    format!("Piece:{index}"),
                    format!("material {} missing, using '{}'", piece.material, fallback.alias),
                );
                let alias = fallback.alias.clone();
                game_object.looks.add_material(fallback)?;
                alias
            }
        };
        let mesh = piece_to_mesh(&piece, &alias, &bones, scale);
        objects.push(Staged {
            object: SceneObject::new(format!("piece_{index}"), ObjectKind::Mesh(mesh)),
            part: part_holding(&model.parts, |p| p.pieces.contains(&index)).or_else(|| Some(first_part.clone())),
        });
    }

    for (index, locator) in model.locators.iter().enumerate() {
        let transform = host_transform(locator.position, locator.rotation, locator.scale, scale);
        let kind = ObjectKind::Locator(LocatorData::Model {
            hookup: locator.hookup.clone(),
        });
        objects.push(Staged {
            object: SceneObject::new(&locator.name, kind).with_transform(transform),
            part: part_holding(&model.parts, |p| p.locators.contains(&index)).or_else(|| Some(first_part.clone())),
        });
    }

    if let Some(collision) = &collision {
        for (index, locator) in collision.locators.iter().enumerate() {
            let (collider, transform) = collider_from_pic(locator, &collision.pieces, scale)?;
            let kind = ObjectKind::Locator(LocatorData::Collision(collider));
            objects.push(Staged {
                object: SceneObject::new(&locator.name, kind).with_transform(transform),
                part: part_holding(&collision.parts, |p| p.locators.contains(&index))
                    .or_else(|| Some(first_part.clone())),
            });
        }
    }

    let mut connections = Vec::new();
    if let Some(prefab) = &prefab {
        let staged = import_prefab(prefab, scale);
        let offset = objects.len();
        connections.extend(staged.connections.iter().map(|(a, b)| (offset + a, offset + b)));
        for locator in staged.locators {
            let kind = ObjectKind::Locator(LocatorData::Prefab(locator.locator));
            objects.push(Staged {
                object: SceneObject::new(locator.name, kind).with_transform(locator.transform),
                part: None,
            });
        }
    }

    if let Some(skeleton) = &skeleton {
        let mut armature = skeleton_to_armature(skeleton, scale);
        for animation in &animations {
            let (data, found) = import_animation(animation, skeleton, config.import.fps, scale);
            diagnostics.extend(found);
            armature.animations.push(data);
        }
        let name = if skeleton.name.is_empty() { files.stem.as_str() } else { skeleton.name.as_str() };
        objects.push(Staged {
            object: SceneObject::new(name, ObjectKind::Armature(armature)),
            part: None,
        });
    }

    Ok(Plan {
        game_object,
        objects,
        connections,
        files: files_read,
        diagnostics,
    })
}

fn commit<S: SceneSink + ?Sized>(plan: Plan, session: &mut Session, sink: &mut S) -> Result<ImportReport> {
    let Plan {
        mut game_object,
        objects,
        connections,
        files,
        mut diagnostics,
    } = plan;

    let name = game_object.name.clone();
    let root_object = SceneObject::new(&name, ObjectKind::Root(Box::new(game_object.clone())));
    let root = sink.add_object(root_object)?;

    let mut ids = Vec::with_capacity(objects.len());
    let mut prefab_locators: Vec<Option<(glam::Mat4, PrefabLocator)>> = Vec::with_capacity(objects.len());
    for staged in objects {
        let prefab = staged
            .object
            .prefab_locator()
            .map(|locator| (staged.object.transform, locator.clone()));
        let id = sink.add_object(staged.object.with_parent(root))?;
        if let Some(part) = &staged.part {
            game_object.assign(id, part)?;
        }
        ids.push(id);
        prefab_locators.push(prefab);
    }
    sink.update_game_object(root, game_object)?;

    for (a, b) in connections {
        let (Some((ta, la)), Some((tb, lb))) = (&prefab_locators[a], &prefab_locators[b]) else {
            continue;
        };
        let start = LocatorSnapshot {
            id: ids[a],
            root: Some(root),
            transform: *ta,
            locator: la,
        };
        let end = LocatorSnapshot {
            id: ids[b],
            root: Some(root),
            transform: *tb,
            locator: lb,
        };
        if let Err(e) = session.registry.connect(&start, &end) {
            note(&mut diagnostics, format!("Connection:{a}-{b}"), format!("{e}, connection dropped"));
        }
    }

    tracing::info!(
        "Imported '{}': {} object(s) from {} file(s), {} diagnostic(s)",
        name,
        ids.len(),
        files.len(),
        diagnostics.len()
    );
    Ok(ImportReport {
        root,
        objects: ids,
        files,
        diagnostics,
    })
}
