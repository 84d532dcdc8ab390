//! Looks: dense `look x material` overlay table
//!
//! Every look holds a full material record for every material, so the
//! table is total by construction. The active row is the live material
//! state; switching looks only changes which row is active.

use super::definition::{Material, NewAttributes};
use super::presets::ShaderPresetCatalog;
use crate::error::{Diagnostic, Error, Location, Result};

/// Name of the look created for new objects.
pub const DEFAULT_LOOK: &str = "default";

/// Value edits of one material cell. The schema (alias, effect, attribute
/// and texture tags) stays fixed.
#[derive(Debug)]
pub struct MaterialEdit<'a>(&'a mut Material);

impl MaterialEdit<'_> {
    /// # Errors
    /// See [`Material::set_attribute`].
    pub fn set_attribute(&mut self, tag: &str, values: &[f32]) -> Result<()> {
        self.0.set_attribute(tag, values)
    }

    /// # Errors
    /// See [`Material::set_texture`].
    pub fn set_texture(&mut self, tag: &str, path: &str) -> Result<()> {
        self.0.set_texture(tag, path)
    }

    pub fn set_substance(&mut self, substance: &str) {
        substance.clone_into(&mut self.0.substance);
    }
}

impl std::ops::Deref for MaterialEdit<'_> {
    type Target = Material;

    fn deref(&self) -> &Material {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookTable {
    looks: Vec<String>,
    materials: Vec<String>,
    cells: Vec<Vec<Material>>,
    active: usize,
}

impl Default for LookTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK)
    }
}

fn unknown_look(name: &str) -> Error {
    Error::UnknownName {
        kind: "look",
        name: name.to_string(),
    }
}

fn unknown_material(id: &str) -> Error {
    Error::UnknownName {
        kind: "material",
        name: id.to_string(),
    }
}

impl LookTable {
    /// A table with one look and no materials.
    #[must_use]
    pub fn new(first_look: &str) -> Self {
        Self {
            looks: vec![first_look.to_string()],
            materials: Vec::new(),
            cells: vec![Vec::new()],
            active: 0,
        }
    }

    /// Build a table from imported looks.
    ///
    /// Each look lists material records by alias. Records for materials
    /// outside `material_ids` are dropped and materials a look misses are
    /// filled from the first look; both cases yield a diagnostic.
    #[must_use]
    pub fn assemble(material_ids: &[String], looks: Vec<(String, Vec<Material>)>) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        if looks.is_empty() {
            let mut table = Self::new(DEFAULT_LOOK);
            table.materials = material_ids.to_vec();
            table.cells[0] = material_ids.iter().map(|id| Material::untyped(id.clone(), super::FALLBACK_EFFECT)).collect();
            return (table, diagnostics);
        }

        let mut table = Self {
            looks: Vec::with_capacity(looks.len()),
            materials: material_ids.to_vec(),
            cells: Vec::with_capacity(looks.len()),
            active: 0,
        };
        for (name, records) in looks {
            let location = Location::section(format!("Look:{name}"));
            let mut row: Vec<Option<Material>> = vec![None; material_ids.len()];
            for record in records {
                match material_ids.iter().position(|id| *id == record.alias) {
                    Some(col) => row[col] = Some(record),
                    None => diagnostics.push(Diagnostic::new(
                        location.clone(),
                        format!("look overlays missing material '{}', record dropped", record.alias),
                    )),
                }
            }
            let filled = row
                .into_iter()
                .enumerate()
                .map(|(col, cell)| {
                    cell.unwrap_or_else(|| {
                        diagnostics.push(Diagnostic::new(
                            location.clone(),
                            format!("material '{}' missing from look, copied", material_ids[col]),
                        ));
                        table
                            .cells
                            .first()
                            .map(|first| first[col].clone())
                            .unwrap_or_else(|| Material::untyped(material_ids[col].clone(), super::FALLBACK_EFFECT))
                    })
                })
                .collect();
            table.looks.push(name);
            table.cells.push(filled);
        }
        for diagnostic in &diagnostics {
            tracing::warn!("{}", diagnostic);
        }
        (table, diagnostics)
    }

    pub fn look_names(&self) -> impl Iterator<Item = &str> {
        self.looks.iter().map(String::as_str)
    }

    pub fn material_ids(&self) -> impl Iterator<Item = &str> {
        self.materials.iter().map(String::as_str)
    }

    #[must_use]
    pub fn look_count(&self) -> usize {
        self.looks.len()
    }

    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn active_look(&self) -> &str {
        &self.looks[self.active]
    }

    /// Materials of the active look, in insertion order.
    pub fn active_materials(&self) -> impl Iterator<Item = &Material> {
        self.cells[self.active].iter()
    }

    /// Materials of one look.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for an unknown look.
    pub fn look_materials(&self, look: &str) -> Result<&[Material]> {
        let row = self.look_index(look)?;
        Ok(&self.cells[row])
    }

    fn look_index(&self, name: &str) -> Result<usize> {
        self.looks.iter().position(|l| l == name).ok_or_else(|| unknown_look(name))
    }

    fn material_index(&self, id: &str) -> Result<usize> {
        self.materials.iter().position(|m| m == id).ok_or_else(|| unknown_material(id))
    }

    /// Active state of one material.
    #[must_use]
    pub fn material(&self, id: &str) -> Option<&Material> {
        let col = self.materials.iter().position(|m| m == id)?;
        Some(&self.cells[self.active][col])
    }

    /// Edit the values of a material in the active look only. Effect
    /// changes go through [`LookTable::apply_effect`] and
    /// [`LookTable::toggle_flavor`], which rewrite every look.
    pub fn material_mut(&mut self, id: &str) -> Option<MaterialEdit<'_>> {
        let col = self.materials.iter().position(|m| m == id)?;
        Some(MaterialEdit(&mut self.cells[self.active][col]))
    }

    /// Material by column.
    #[must_use]
    pub fn material_at(&self, index: usize) -> Option<&Material> {
        self.cells[self.active].get(index)
    }

    /// Append a look copied from the active one.
    ///
    /// # Errors
    /// [`Error::Duplicate`] when the name is taken.
    pub fn add_look(&mut self, name: &str) -> Result<()> {
        if self.looks.iter().any(|l| l == name) {
            return Err(Error::Duplicate {
                message: format!("look '{name}' already exists"),
            });
        }
        let row = self.cells[self.active].clone();
        self.looks.push(name.to_string());
        self.cells.push(row);
        tracing::debug!("Added look '{}'", name);
        Ok(())
    }

    /// Remove a look; the last look cannot be removed.
    ///
    /// # Errors
    /// [`Error::UnknownName`], or [`Error::Inconsistent`] for the last look.
    pub fn remove_look(&mut self, name: &str) -> Result<()> {
        let row = self.look_index(name)?;
        if self.looks.len() == 1 {
            return Err(Error::inconsistent("Look", "an object needs at least one look"));
        }
        self.looks.remove(row);
        self.cells.remove(row);
        if self.active > row || self.active == self.looks.len() {
            self.active = self.active.saturating_sub(1);
        }
        Ok(())
    }

    /// # Errors
    /// [`Error::UnknownName`] or [`Error::Duplicate`].
    pub fn rename_look(&mut self, old: &str, new: &str) -> Result<()> {
        let row = self.look_index(old)?;
        if old != new && self.looks.iter().any(|l| l == new) {
            return Err(Error::Duplicate {
                message: format!("look '{new}' already exists"),
            });
        }
        self.looks[row] = new.to_string();
        Ok(())
    }

    /// Make `name` the active look.
    ///
    /// # Errors
    /// [`Error::UnknownName`].
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.active = self.look_index(name)?;
        tracing::debug!("Active look is now '{}'", name);
        Ok(())
    }

    /// Add a material column; every look receives a copy.
    ///
    /// # Errors
    /// [`Error::Duplicate`] when the alias is taken.
    pub fn add_material(&mut self, material: Material) -> Result<usize> {
        if self.materials.iter().any(|m| *m == material.alias) {
            return Err(Error::Duplicate {
                message: format!("material '{}' already exists", material.alias),
            });
        }
        self.materials.push(material.alias.clone());
        for row in &mut self.cells {
            row.push(material.clone());
        }
        Ok(self.materials.len() - 1)
    }

    /// # Errors
    /// [`Error::UnknownName`].
    pub fn remove_material(&mut self, id: &str) -> Result<Material> {
        let col = self.material_index(id)?;
        self.materials.remove(col);
        let mut removed = None;
        for (row_index, row) in self.cells.iter_mut().enumerate() {
            let cell = row.remove(col);
            if row_index == self.active {
                removed = Some(cell);
            }
        }
        removed.ok_or_else(|| unknown_material(id))
    }

    /// Change a material's effect in every look.
    ///
    /// # Errors
    /// [`Error::UnknownName`] or [`Error::UnknownEffect`]; nothing changes on
    /// failure.
    pub fn apply_effect(&mut self, id: &str, catalog: &ShaderPresetCatalog, effect: &str) -> Result<()> {
        let col = self.material_index(id)?;
        let schema = catalog.schema(effect)?;
        for row in &mut self.cells {
            let cell = &mut row[col];
            cell.migrate(&schema, NewAttributes::Zeroed);
            cell.effect = effect.to_string();
        }
        Ok(())
    }

    /// Toggle a flavor of a material in every look.
    ///
    /// # Errors
    /// [`Error::UnknownName`] or [`Error::UnknownFlavor`]; nothing changes on
    /// failure.
    pub fn toggle_flavor(&mut self, id: &str, catalog: &ShaderPresetCatalog, kind: &str, enable: bool) -> Result<()> {
        let col = self.material_index(id)?;
        let current = self.cells[self.active][col].effect.clone();
        let effect = catalog.toggle_flavor(&current, kind, enable)?;
        if effect == current {
            return Ok(());
        }
        self.apply_effect(id, catalog, &effect)
    }

    /// Every row covers every material.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] naming the first incomplete look.
    pub fn check_totality(&self) -> Result<()> {
        for (name, row) in self.looks.iter().zip(&self.cells) {
            if row.len() != self.materials.len() {
                return Err(Error::inconsistent(
                    &format!("Look:{name}"),
                    format!("covers {} of {} materials", row.len(), self.materials.len()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::presets::tests::catalog;

    fn paint() -> Material {
        Material::new("paint", "eut2.dif", &catalog()).unwrap()
    }

    #[test]
    fn test_switching_preserves_bits() {
        let mut table = LookTable::new("day");
        table.add_material(paint()).unwrap();
        table.material_mut("paint").unwrap().set_attribute("diffuse", &[1.0, 0.0, 0.0]).unwrap();
        table.add_look("night").unwrap();
        table.set_active("night").unwrap();
        table.material_mut("paint").unwrap().set_attribute("diffuse", &[0.0, 0.0, 1.0]).unwrap();

        table.set_active("day").unwrap();
        table.set_active("night").unwrap();
        table.set_active("day").unwrap();
        let diffuse = table.material("paint").unwrap().attribute("diffuse").unwrap();
        assert_eq!(diffuse.iter().map(|f| f.to_bits()).collect::<Vec<_>>(), [1.0f32, 0.0, 0.0].map(f32::to_bits));
    }

    #[test]
    fn test_value_edit_keeps_schema() {
        let mut table = LookTable::new("day");
        table.add_material(paint()).unwrap();
        let mut edit = table.material_mut("paint").unwrap();
        edit.set_substance("metal");
        assert!(edit.set_attribute("no_such_tag", &[1.0]).is_err());
        assert_eq!(edit.effect, "eut2.dif");
        assert_eq!(table.material("paint").unwrap().substance, "metal");
    }

    #[test]
    fn test_new_material_reaches_every_look() {
        let mut table = LookTable::new("a");
        table.add_look("b").unwrap();
        table.add_material(paint()).unwrap();
        assert!(table.check_totality().is_ok());
        assert_eq!(table.look_materials("b").unwrap().len(), 1);
    }

    #[test]
    fn test_effect_change_migrates_all_looks() {
        let catalog = catalog();
        let mut table = LookTable::new("a");
        table.add_material(paint()).unwrap();
        table.add_look("b").unwrap();
        table.toggle_flavor("paint", &catalog, "SPEC", true).unwrap();
        for look in ["a", "b"] {
            let m = &table.look_materials(look).unwrap()[0];
            assert_eq!(m.effect, "eut2.dif.spec");
            assert!(m.attribute("specular").is_some());
        }
        let before = table.clone();
        assert!(table.toggle_flavor("paint", &catalog, "NMAP_TS_UV", true).is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn test_remove_look_keeps_one() {
        let mut table = LookTable::new("a");
        table.add_look("b").unwrap();
        table.set_active("b").unwrap();
        table.remove_look("b").unwrap();
        assert_eq!(table.active_look(), "a");
        assert!(table.remove_look("a").is_err());
    }

    #[test]
    fn test_assemble_fills_gaps() {
        let ids = vec!["paint".to_string(), "glass".to_string()];
        let mut glass = paint();
        glass.alias = "glass".into();
        let mut stray = paint();
        stray.alias = "stray".into();
        let (table, diagnostics) = LookTable::assemble(
            &ids,
            vec![
                ("day".into(), vec![paint(), glass.clone()]),
                ("night".into(), vec![paint(), stray]),
            ],
        );
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(table.look_materials("night").unwrap()[1], glass);
        assert!(table.check_totality().is_ok());
    }
}
