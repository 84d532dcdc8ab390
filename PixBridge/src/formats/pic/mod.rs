//! PIC collision files
//!
//! Collider locators of five primitive types. Convex colliders point at a
//! `Piece` section holding their hull. Collision materials are written
//! once each and referenced by index.

mod hull;

use std::path::Path;

use super::pim::PimPart;
use super::pix::{FileKind, Header, PixFile, Section, Value, WriteOptions, global_section, indexed_row, read_float_rows, read_int_rows, validate_globals};
use crate::error::{Diagnostic, Error, Result};

pub use hull::{Hull, build_hull, convex_hull};

pub const FORMAT_VERSION: i64 = 2;

/// Type-specific collider geometry, game basis.
#[derive(Debug, Clone, PartialEq)]
pub enum PicShape {
    Box { size: [f32; 3] },
    Sphere { radius: f32 },
    Capsule { radius: f32, length: f32 },
    Cylinder { radius: f32, length: f32 },
    /// Index of the hull piece.
    Convex { piece: usize },
}

impl PicShape {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            PicShape::Box { .. } => "Box",
            PicShape::Sphere { .. } => "Sphere",
            PicShape::Capsule { .. } => "Capsule",
            PicShape::Cylinder { .. } => "Cylinder",
            PicShape::Convex { .. } => "Convex",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColliderLocator {
    pub name: String,
    pub shape: PicShape,
    pub position: [f32; 3],
    /// `( w x y z )`.
    pub rotation: [f32; 4],
    pub mass: f32,
    /// Collision material tag.
    pub material: String,
    pub flags: u32,
}

/// Hull geometry of a convex collider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvexPiece {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl From<Hull> for ConvexPiece {
    fn from(hull: Hull) -> Self {
        Self {
            vertices: hull.vertices,
            triangles: hull.triangles,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PicModel {
    pub name: String,
    pub pieces: Vec<ConvexPiece>,
    /// Parts list collider locators only; `pieces` is unused here.
    pub parts: Vec<PimPart>,
    pub locators: Vec<ColliderLocator>,
}

impl PicModel {
    /// Check convex piece references and triangle indices.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] naming the offending locator or piece.
    pub fn validate(&self) -> Result<()> {
        for locator in &self.locators {
            if let PicShape::Convex { piece } = locator.shape {
                if piece >= self.pieces.len() {
                    return Err(Error::inconsistent(
                        &format!("Locator:{}", locator.name),
                        format!("convex piece {piece} out of range ({} present)", self.pieces.len()),
                    ));
                }
            }
        }
        for (index, piece) in self.pieces.iter().enumerate() {
            let count = piece.vertices.len() as u32;
            if piece.triangles.iter().flatten().any(|&v| v >= count) {
                return Err(Error::inconsistent(&format!("Piece:{index}"), "triangle index out of range"));
            }
        }
        for part in &self.parts {
            if part.locators.iter().any(|&l| l >= self.locators.len()) {
                return Err(Error::inconsistent(&format!("Part:{}", part.name), "locator index out of range"));
            }
        }
        Ok(())
    }
}

fn read_shape(section: &Section) -> Result<PicShape> {
    let kind = section.req_str("Type")?;
    Ok(match kind {
        "Box" => PicShape::Box {
            size: section.req_floats::<3>("Size")?,
        },
        "Sphere" => PicShape::Sphere {
            radius: section.req_float("Radius")?,
        },
        "Capsule" => PicShape::Capsule {
            radius: section.req_float("Radius")?,
            length: section.req_float("Length")?,
        },
        "Cylinder" => PicShape::Cylinder {
            radius: section.req_float("Radius")?,
            length: section.req_float("Length")?,
        },
        "Convex" => PicShape::Convex {
            piece: section.req_usize("ConvexPiece")?,
        },
        other => {
            return Err(Error::SchemaMismatch {
                what: "collider type".to_string(),
                found: other.to_string(),
            });
        }
    })
}

fn write_shape(section: &mut Section, shape: &PicShape) {
    match *shape {
        PicShape::Box { size } => section.push_prop("Size", Value::hex(&size)),
        PicShape::Sphere { radius } => section.push_prop("Radius", Value::hex_scalar(radius)),
        PicShape::Capsule { radius, length } | PicShape::Cylinder { radius, length } => {
            section.push_prop("Radius", Value::hex_scalar(radius));
            section.push_prop("Length", Value::hex_scalar(length));
        }
        PicShape::Convex { piece } => section.push_prop("ConvexPiece", Value::Int(piece as i64)),
    }
}

fn read_piece(section: &Section) -> Result<ConvexPiece> {
    let vertex_count = section.req_usize("VertexCount")?;
    let vertices = match section.child("Stream") {
        Some(stream) => read_float_rows(stream, 3)?
            .into_iter()
            .map(|r| [r[0], r[1], r[2]])
            .collect(),
        None => Vec::new(),
    };
    if vertices.len() != vertex_count {
        return Err(Error::inconsistent(
            "Piece",
            format!("VertexCount declares {vertex_count} but {} present", vertices.len()),
        ));
    }
    let triangles = match section.child("Triangles") {
        Some(rows) => read_int_rows(rows, 3)?
            .into_iter()
            .map(|r| {
                let mut triangle = [0u32; 3];
                for (slot, v) in triangle.iter_mut().zip(r) {
                    *slot = u32::try_from(v).map_err(|_| Error::inconsistent("Piece/Triangles", "negative index"))?;
                }
                // File winding to scene winding
                Ok([triangle[0], triangle[2], triangle[1]])
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(ConvexPiece { vertices, triangles })
}

fn write_piece(index: usize, piece: &ConvexPiece) -> Section {
    let mut section = Section::new("Piece")
        .with("Index", Value::Int(index as i64))
        .with("VertexCount", Value::Int(piece.vertices.len() as i64))
        .with("TriangleCount", Value::Int(piece.triangles.len() as i64))
        .with("StreamCount", Value::Int(1));
    let mut stream = Section::new("Stream")
        .with("Format", Value::token("FLOAT3"))
        .with("Tag", Value::string("_POSITION"));
    for (i, vertex) in piece.vertices.iter().enumerate() {
        stream.push_row(indexed_row(i, Value::hex(vertex)));
    }
    section.push_section(stream);
    let mut triangles = Section::new("Triangles");
    for (i, &[a, b, c]) in piece.triangles.iter().enumerate() {
        triangles.push_row(indexed_row(i, Value::ints(&[a.into(), c.into(), b.into()])));
    }
    section.push_section(triangles);
    section
}

/// Read a collision file.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`], [`Error::Inconsistent`].
pub fn read_pic<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PicModel, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading collision {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pic(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed collision file.
///
/// # Errors
/// See [`read_pic`].
pub fn parse_pic(file: &mut PixFile, recount: bool) -> Result<(PicModel, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Collision, &[FORMAT_VERSION])?;
    let diagnostics = validate_globals(file, FileKind::Collision, recount)?;

    let materials: Vec<String> = file
        .sections_named("Material")
        .map(|s| s.req_str("Alias").map(str::to_string))
        .collect::<Result<_>>()?;
    let pieces = file.sections_named("Piece").map(read_piece).collect::<Result<Vec<_>>>()?;

    let locators = file
        .sections_named("Locator")
        .map(|s| {
            let name = s.req_str("Name")?.to_string();
            let material_index = s.opt_int("Material", -1);
            let material = match usize::try_from(material_index) {
                Ok(i) => materials.get(i).cloned().ok_or_else(|| {
                    Error::inconsistent(&format!("Locator:{name}"), format!("material {i} out of range"))
                })?,
                Err(_) => String::new(),
            };
            Ok(ColliderLocator {
                shape: read_shape(s)?,
                position: s.req_floats::<3>("Position")?,
                rotation: s.req_floats::<4>("Rotation")?,
                mass: s.opt_float("Weight", 0.0),
                material,
                flags: u32::try_from(s.opt_int("Flags", 0)).unwrap_or_default(),
                name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let parts = file
        .sections_named("Part")
        .map(|s| {
            Ok(PimPart {
                name: s.req_str("Name")?.to_string(),
                pieces: Vec::new(),
                locators: s
                    .opt_ints("Locators")
                    .into_iter()
                    .map(|i| usize::try_from(i).map_err(|_| Error::inconsistent("Part", "negative locator index")))
                    .collect::<Result<_>>()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let model = PicModel {
        name: header.name,
        pieces,
        parts,
        locators,
    };
    model.validate()?;
    tracing::debug!(
        "Collision '{}': {} collider(s), {} convex piece(s)",
        model.name,
        model.locators.len(),
        model.pieces.len()
    );
    Ok((model, diagnostics))
}

/// Encode a collision model.
///
/// # Errors
/// [`Error::Inconsistent`] when the model fails validation.
pub fn to_pix(model: &PicModel) -> Result<PixFile> {
    model.validate()?;
    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Collision, FORMAT_VERSION, &model.name).to_section());

    let mut materials: Vec<&str> = Vec::new();
    for locator in &model.locators {
        if !locator.material.is_empty() && !materials.contains(&locator.material.as_str()) {
            materials.push(&locator.material);
        }
    }

    let mut body = PixFile::new();
    for material in &materials {
        body.push(Section::new("Material").with("Alias", Value::string(*material)));
    }
    for (index, piece) in model.pieces.iter().enumerate() {
        body.push(write_piece(index, piece));
    }
    for part in &model.parts {
        body.push(
            Section::new("Part")
                .with("Name", Value::string(&part.name))
                .with("PieceCount", Value::Int(0))
                .with("LocatorCount", Value::Int(part.locators.len() as i64))
                .with("Pieces", Value::ints(&[]))
                .with("Locators", Value::ints(&part.locators.iter().map(|&l| l as i64).collect::<Vec<_>>())),
        );
    }
    for (index, locator) in model.locators.iter().enumerate() {
        let material = materials
            .iter()
            .position(|m| *m == locator.material)
            .map_or(-1, |i| i as i64);
        let mut section = Section::new("Locator")
            .with("Name", Value::string(&locator.name))
            .with("Index", Value::Int(index as i64))
            .with("Type", Value::string(locator.shape.type_name()))
            .with("Position", Value::hex(&locator.position))
            .with("Rotation", Value::hex(&locator.rotation))
            .with("Weight", Value::hex_scalar(locator.mass))
            .with("Material", Value::Int(material))
            .with("Flags", Value::Int(i64::from(locator.flags)));
        write_shape(&mut section, &locator.shape);
        body.push(section);
    }

    file.push(global_section(&body, FileKind::Collision, Vec::new()));
    file.items.extend(body.items);
    Ok(file)
}

/// Write a collision file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pic<P: AsRef<Path>>(model: &PicModel, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing collision {}", path.display());
    to_pix(model)?.write(path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> PicModel {
        let hull = build_hull(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            256,
            0.0,
        )
        .unwrap();
        let identity = [1.0, 0.0, 0.0, 0.0];
        PicModel {
            name: "crate".into(),
            pieces: vec![hull.into()],
            parts: vec![PimPart {
                name: "defaultpart".into(),
                pieces: Vec::new(),
                locators: vec![0, 1, 2],
            }],
            locators: vec![
                ColliderLocator {
                    name: "body".into(),
                    shape: PicShape::Box { size: [2.0, 1.0, 4.0] },
                    position: [0.0, 0.5, 0.0],
                    rotation: identity,
                    mass: 120.0,
                    material: "metal".into(),
                    flags: 0,
                },
                ColliderLocator {
                    name: "wheel".into(),
                    shape: PicShape::Cylinder { radius: 0.4, length: 0.3 },
                    position: [1.0, 0.4, 1.5],
                    rotation: identity,
                    mass: 10.0,
                    material: "rubber".into(),
                    flags: 1,
                },
                ColliderLocator {
                    name: "hull".into(),
                    shape: PicShape::Convex { piece: 0 },
                    position: [0.0; 3],
                    rotation: identity,
                    mass: 1.0,
                    material: "metal".into(),
                    flags: 0,
                },
            ],
        }
    }

    #[test]
    fn test_roundtrip() {
        let model = sample();
        let file = to_pix(&model).unwrap();
        let global = file.section("Global").unwrap();
        assert_eq!(global.req_int("MaterialCount").unwrap(), 2);
        assert_eq!(global.req_int("LocatorCount").unwrap(), 3);

        let text = file.to_pix_string(&WriteOptions::default());
        let mut reparsed = PixFile::parse(&text).unwrap();
        let (back, diagnostics) = parse_pic(&mut reparsed, false).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(back, model);
    }

    #[test]
    fn test_dangling_convex_piece() {
        let mut model = sample();
        model.pieces.clear();
        assert!(matches!(to_pix(&model), Err(Error::Inconsistent { .. })));
    }

    #[test]
    fn test_unknown_collider_type() {
        let mut file = to_pix(&sample()).unwrap();
        for section in file.sections_mut() {
            if section.type_name == "Locator" {
                section.set_prop("Type", Value::string("Torus"));
            }
        }
        assert!(matches!(parse_pic(&mut file, false), Err(Error::SchemaMismatch { .. })));
    }
}
