//! PIM model files
//!
//! Two dialects share one in-memory [`PimModel`]: the compact format
//! (version 5, per-vertex streams) and the exchange format (`.pim.ef`,
//! version 1, per-corner face streams). Pieces keep positions per vertex
//! and every other attribute per triangle corner, so either dialect can be
//! written from whatever was read.
//!
//! All coordinates are in game basis. Triangles are stored in scene
//! winding; the writers flip to file winding and the readers flip back.

mod compact;
mod exchange;
mod streams;
mod weld;

use std::path::Path;

use super::pix::{FileKind, Header, PixFile, Value, WriteOptions, global_section, validate_globals};
use crate::error::{Diagnostic, Error, Result};

pub use weld::weld_piece;

pub const COMPACT_VERSION: i64 = 5;
pub const EXCHANGE_VERSION: i64 = 1;

/// Extension of exchange-format model files.
pub const EXCHANGE_EXTENSION: &str = "pim.ef";

/// On-disk model dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PimDialect {
    #[default]
    Compact,
    Exchange,
}

impl PimDialect {
    #[must_use]
    pub fn format_version(self) -> i64 {
        match self {
            PimDialect::Compact => COMPACT_VERSION,
            PimDialect::Exchange => EXCHANGE_VERSION,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            PimDialect::Compact => "pim",
            PimDialect::Exchange => EXCHANGE_EXTENSION,
        }
    }

    /// Dialect implied by a file name.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name.ends_with(".pim.ef") {
            PimDialect::Exchange
        } else {
            PimDialect::Compact
        }
    }
}

/// Material reference of a model: alias and effect only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PimMaterial {
    pub alias: String,
    pub effect: String,
}

/// A UV layer with the texture-coordinate aliases it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct UvChannel {
    pub aliases: Vec<String>,
    /// One entry per triangle corner.
    pub corners: Vec<[f32; 2]>,
}

/// One bone influence on a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    pub bone: usize,
    pub weight: f32,
}

/// A single-material mesh chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Piece {
    pub material: usize,
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    /// Per corner.
    pub normals: Vec<[f32; 3]>,
    /// Per corner, empty when absent.
    pub tangents: Vec<[f32; 4]>,
    /// Color layers, each per corner.
    pub colors: Vec<Vec<[f32; 4]>>,
    pub uvs: Vec<UvChannel>,
    /// Per vertex, empty when unskinned.
    pub skin: Vec<Vec<Influence>>,
}

impl Piece {
    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Check stream lengths against vertex and corner counts.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] naming the first bad stream.
    pub fn validate(&self, index: usize) -> Result<()> {
        let path = format!("Piece:{index}");
        let corners = self.corner_count();
        let check = |what: &str, len: usize, expected: usize| {
            if len == expected {
                Ok(())
            } else {
                Err(Error::inconsistent(&path, format!("{what} has {len} entries, expected {expected}")))
            }
        };
        check("normal stream", self.normals.len(), corners)?;
        if !self.tangents.is_empty() {
            check("tangent stream", self.tangents.len(), corners)?;
        }
        for layer in &self.colors {
            check("color stream", layer.len(), corners)?;
        }
        for uv in &self.uvs {
            check("uv stream", uv.corners.len(), corners)?;
        }
        if !self.skin.is_empty() {
            check("skin stream", self.skin.len(), self.positions.len())?;
        }
        let vertex_count = self.positions.len() as u32;
        if let Some(bad) = self.triangles.iter().flatten().find(|&&v| v >= vertex_count) {
            return Err(Error::inconsistent(
                &path,
                format!("triangle references vertex {bad}, only {vertex_count} exist"),
            ));
        }
        Ok(())
    }
}

/// Named grouping of pieces and locators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PimPart {
    pub name: String,
    pub pieces: Vec<usize>,
    pub locators: Vec<usize>,
}

/// Model locator (hookup anchor).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelLocator {
    pub name: String,
    pub hookup: Option<String>,
    pub position: [f32; 3],
    /// `( w x y z )`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

/// A parsed model file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PimModel {
    pub name: String,
    pub dialect: PimDialect,
    pub materials: Vec<PimMaterial>,
    pub pieces: Vec<Piece>,
    pub parts: Vec<PimPart>,
    pub locators: Vec<ModelLocator>,
    pub bones: Vec<String>,
    /// Skeleton file referenced by the model, if skinned.
    pub skeleton: Option<String>,
}

impl PimModel {
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.pieces.iter().any(|p| !p.skin.is_empty())
    }

    /// Structural checks run before writing.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] for bad references or stream lengths.
    pub fn validate(&self) -> Result<()> {
        for (index, piece) in self.pieces.iter().enumerate() {
            piece.validate(index)?;
            if piece.material >= self.materials.len() {
                return Err(Error::inconsistent(
                    &format!("Piece:{index}"),
                    format!("material {} out of range ({} defined)", piece.material, self.materials.len()),
                ));
            }
            for influence in piece.skin.iter().flatten() {
                if influence.bone >= self.bones.len() {
                    return Err(Error::inconsistent(
                        &format!("Piece:{index}"),
                        format!("skin references bone {}, only {} exist", influence.bone, self.bones.len()),
                    ));
                }
            }
        }
        for part in &self.parts {
            let path = format!("Part:{}", part.name);
            if let Some(bad) = part.pieces.iter().find(|&&p| p >= self.pieces.len()) {
                return Err(Error::inconsistent(&path, format!("piece {bad} out of range")));
            }
            if let Some(bad) = part.locators.iter().find(|&&l| l >= self.locators.len()) {
                return Err(Error::inconsistent(&path, format!("locator {bad} out of range")));
            }
        }
        Ok(())
    }
}

/// Read a model file; the dialect comes from the header version.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`] for other versions or file
/// types, [`Error::Inconsistent`] for bad counts or references.
pub fn read_pim<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PimModel, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading model {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pim(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed model file.
///
/// # Errors
/// See [`read_pim`].
pub fn parse_pim(file: &mut PixFile, recount: bool) -> Result<(PimModel, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Model, &[COMPACT_VERSION, EXCHANGE_VERSION])?;
    let diagnostics = validate_globals(file, FileKind::Model, recount)?;
    let dialect = if header.format_version == EXCHANGE_VERSION {
        PimDialect::Exchange
    } else {
        PimDialect::Compact
    };

    let global = file.req_section("Global")?;
    let skeleton = global.opt_str("Skeleton").filter(|s| !s.is_empty()).map(str::to_string);

    let materials = file
        .sections_named("Material")
        .map(|s| {
            Ok(PimMaterial {
                alias: s.req_str("Alias")?.to_string(),
                effect: s.req_str("Effect")?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut pieces = match dialect {
        PimDialect::Compact => file
            .sections_named("Piece")
            .map(compact::read_piece)
            .collect::<Result<Vec<_>>>()?,
        PimDialect::Exchange => file
            .sections_named("Piece")
            .map(exchange::read_piece)
            .collect::<Result<Vec<_>>>()?,
    };

    let parts = file
        .sections_named("Part")
        .map(|s| {
            let indices = |key: &str| -> Result<Vec<usize>> {
                s.opt_ints(key)
                    .into_iter()
                    .map(|i| usize::try_from(i).map_err(|_| Error::inconsistent("Part", format!("negative index in {key}"))))
                    .collect()
            };
            let part = PimPart {
                name: s.req_str("Name")?.to_string(),
                pieces: indices("Pieces")?,
                locators: indices("Locators")?,
            };
            if s.opt_int("PieceCount", part.pieces.len() as i64) != part.pieces.len() as i64
                || s.opt_int("LocatorCount", part.locators.len() as i64) != part.locators.len() as i64
            {
                return Err(Error::inconsistent(&format!("Part:{}", part.name), "declared counts differ from lists"));
            }
            Ok(part)
        })
        .collect::<Result<Vec<_>>>()?;

    let locators = file
        .sections_named("Locator")
        .map(|s| {
            Ok(ModelLocator {
                name: s.req_str("Name")?.to_string(),
                hookup: s.opt_str("Hookup").filter(|h| !h.is_empty()).map(str::to_string),
                position: s.req_floats::<3>("Position")?,
                rotation: s.req_floats::<4>("Rotation")?,
                scale: s.req_floats::<3>("Scale")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let bones = match file.section("Bones") {
        Some(section) => streams::read_name_rows(section)?,
        None => Vec::new(),
    };

    if let Some(skin) = file.section("Skin") {
        streams::read_global_skin(skin, &mut pieces)?;
    }
    for section in file.sections_named("PieceSkin") {
        streams::read_piece_skin(section, &mut pieces)?;
    }

    let model = PimModel {
        name: header.name,
        dialect,
        materials,
        pieces,
        parts,
        locators,
        bones,
        skeleton,
    };
    model.validate()?;
    tracing::debug!(
        "Model '{}': {} piece(s), {} part(s), {} locator(s), {} bone(s)",
        model.name,
        model.pieces.len(),
        model.parts.len(),
        model.locators.len(),
        model.bones.len()
    );
    Ok((model, diagnostics))
}

/// Encode a model in `dialect`.
///
/// # Errors
/// [`Error::Inconsistent`] when the model fails validation.
pub fn to_pix(model: &PimModel, dialect: PimDialect) -> Result<PixFile> {
    model.validate()?;
    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Model, dialect.format_version(), &model.name).to_section());

    let mut body = PixFile::new();
    for material in &model.materials {
        body.push(
            super::pix::Section::new("Material")
                .with("Alias", Value::string(&material.alias))
                .with("Effect", Value::string(&material.effect)),
        );
    }

    let mut vertex_total = 0;
    let mut face_total = 0;
    let mut compact_maps = Vec::with_capacity(model.pieces.len());
    for (index, piece) in model.pieces.iter().enumerate() {
        let section = match dialect {
            PimDialect::Compact => {
                let (section, map) = compact::write_piece(index, piece);
                vertex_total += map.len();
                compact_maps.push(map);
                section
            }
            PimDialect::Exchange => {
                vertex_total += piece.positions.len();
                exchange::write_piece(index, piece)
            }
        };
        face_total += piece.triangles.len();
        body.push(section);
    }

    for part in &model.parts {
        body.push(
            super::pix::Section::new("Part")
                .with("Name", Value::string(&part.name))
                .with("PieceCount", Value::Int(part.pieces.len() as i64))
                .with("LocatorCount", Value::Int(part.locators.len() as i64))
                .with("Pieces", Value::ints(&part.pieces.iter().map(|&p| p as i64).collect::<Vec<_>>()))
                .with("Locators", Value::ints(&part.locators.iter().map(|&l| l as i64).collect::<Vec<_>>())),
        );
    }

    for (index, locator) in model.locators.iter().enumerate() {
        body.push(
            super::pix::Section::new("Locator")
                .with("Name", Value::string(&locator.name))
                .with("Index", Value::Int(index as i64))
                .with("Hookup", Value::string(locator.hookup.as_deref().unwrap_or_default()))
                .with("Position", Value::hex(&locator.position))
                .with("Rotation", Value::hex(&locator.rotation))
                .with("Scale", Value::hex(&locator.scale)),
        );
    }

    if !model.bones.is_empty() {
        body.push(streams::write_name_rows("Bones", &model.bones));
    }
    if model.is_skinned() {
        match dialect {
            PimDialect::Compact => body.push(streams::write_global_skin(&model.pieces, &compact_maps)),
            PimDialect::Exchange => {
                for (index, piece) in model.pieces.iter().enumerate() {
                    if !piece.skin.is_empty() {
                        body.push(streams::write_piece_skin(index, piece));
                    }
                }
            }
        }
    }

    file.push(global_section(
        &body,
        FileKind::Model,
        vec![
            ("VertexCount", Value::Int(vertex_total as i64)),
            ("FaceCount", Value::Int(face_total as i64)),
            ("BoneCount", Value::Int(model.bones.len() as i64)),
            ("Skeleton", Value::string(model.skeleton.as_deref().unwrap_or_default())),
        ],
    ));
    file.items.extend(body.items);
    Ok(file)
}

/// Write a model file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pim<P: AsRef<Path>>(model: &PimModel, dialect: PimDialect, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing model {} ({:?})", path.display(), dialect);
    to_pix(model, dialect)?.write(path, options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn triangle_model() -> PimModel {
        let normal = [0.0, 1.0, 0.0];
        PimModel {
            name: "tri".into(),
            materials: vec![PimMaterial {
                alias: "paint".into(),
                effect: "eut2.dif".into(),
            }],
            pieces: vec![Piece {
                material: 0,
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
                triangles: vec![[0, 1, 2]],
                normals: vec![normal; 3],
                uvs: vec![UvChannel {
                    aliases: vec!["_TEXCOORD0".into()],
                    corners: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
                }],
                ..Piece::default()
            }],
            parts: vec![PimPart {
                name: "defaultpart".into(),
                pieces: vec![0],
                locators: vec![0],
            }],
            locators: vec![ModelLocator {
                name: "hook".into(),
                hookup: Some("lamp.front".into()),
                position: [0.5, 0.1, -0.3],
                rotation: [1.0, 0.0, 0.0, 0.0],
                scale: [1.0; 3],
            }],
            ..PimModel::default()
        }
    }

    fn reparse(file: &PixFile) -> PimModel {
        let mut reparsed = PixFile::parse(&file.to_pix_string(&WriteOptions::default())).unwrap();
        parse_pim(&mut reparsed, false).unwrap().0
    }

    #[test]
    fn test_compact_roundtrip() {
        let model = triangle_model();
        let file = to_pix(&model, PimDialect::Compact).unwrap();
        let global = file.section("Global").unwrap();
        assert_eq!(global.req_int("PieceCount").unwrap(), 1);
        assert_eq!(global.req_int("FaceCount").unwrap(), 1);

        let back = reparse(&file);
        assert_eq!(back.dialect, PimDialect::Compact);
        assert_eq!(back.pieces[0].positions, model.pieces[0].positions);
        assert_eq!(back.pieces[0].triangles, model.pieces[0].triangles);
        assert_eq!(back.locators, model.locators);
        assert_eq!(back.parts, model.parts);
    }

    #[test]
    fn test_writer_flips_winding() {
        let file = to_pix(&triangle_model(), PimDialect::Compact).unwrap();
        let piece = file.section("Piece").unwrap();
        let triangles = piece.child("Triangles").unwrap();
        let row = triangles.rows().next().unwrap();
        assert_eq!(row.0.last().and_then(Value::as_ints), Some(&[0, 2, 1][..]));
    }

    #[test]
    fn test_exchange_roundtrip() {
        let mut model = triangle_model();
        model.pieces[0].colors = vec![vec![[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]]];
        let file = to_pix(&model, PimDialect::Exchange).unwrap();
        assert_eq!(file.section("Header").unwrap().req_int("FormatVersion").unwrap(), 1);

        let back = reparse(&file);
        assert_eq!(back.dialect, PimDialect::Exchange);
        assert_eq!(back.pieces[0], model.pieces[0]);
    }

    #[test]
    fn test_empty_model() {
        let model = PimModel {
            name: "empty".into(),
            parts: vec![PimPart {
                name: "defaultpart".into(),
                ..PimPart::default()
            }],
            ..PimModel::default()
        };
        let file = to_pix(&model, PimDialect::Compact).unwrap();
        let global = file.section("Global").unwrap();
        assert_eq!(global.req_int("PieceCount").unwrap(), 0);
        assert_eq!(global.req_int("PartCount").unwrap(), 1);
        assert_eq!(global.req_int("LocatorCount").unwrap(), 0);
        assert_eq!(reparse(&file), model);
    }

    #[test]
    fn test_bad_reference_rejected() {
        let mut model = triangle_model();
        model.pieces[0].material = 3;
        assert!(matches!(to_pix(&model, PimDialect::Compact), Err(Error::Inconsistent { .. })));
    }

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(PimDialect::from_path(Path::new("a/truck.pim.ef")), PimDialect::Exchange);
        assert_eq!(PimDialect::from_path(Path::new("truck.pim")), PimDialect::Compact);
    }
}
