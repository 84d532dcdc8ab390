//! Game object: parts, variants, looks and part assignments of one root

use indexmap::IndexMap;

use super::parts::{DEFAULT_PART, PartRemoval, check_name, unique_name};
use super::variants::{DEFAULT_VARIANT, Variant};
use crate::error::{Error, Result};
use crate::formats::pim::PimDialect;
use crate::material::{DEFAULT_LOOK, LookTable};
use crate::scene::ObjectId;

#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub name: String,
    /// Export directory in scene form (`//vehicle/truck`), empty for the
    /// directory chosen at export time.
    pub export_path: String,
    /// Model dialect the object was imported from; `None` for objects
    /// created in the scene.
    pub source_dialect: Option<PimDialect>,
    parts: Vec<String>,
    variants: Vec<Variant>,
    pub looks: LookTable,
    /// Descendant object to part name.
    assignments: IndexMap<ObjectId, String>,
}

fn unknown_part(name: &str) -> Error {
    Error::UnknownName {
        kind: "part",
        name: name.to_string(),
    }
}

fn unknown_variant(name: &str) -> Error {
    Error::UnknownName {
        kind: "variant",
        name: name.to_string(),
    }
}

impl GameObject {
    /// A game object with `defaultpart`, the `default` variant and the
    /// `default` look.
    #[must_use]
    pub fn new_default(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            export_path: String::new(),
            source_dialect: None,
            parts: vec![DEFAULT_PART.to_string()],
            variants: vec![Variant::including_all(DEFAULT_VARIANT, [DEFAULT_PART])],
            looks: LookTable::new(DEFAULT_LOOK),
            assignments: IndexMap::new(),
        }
    }

    /// A game object with no parts or variants; used while importing.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            variants: Vec::new(),
            ..Self::new_default(name)
        }
    }

    // ------------------------------------------------------------------
    // Parts
    // ------------------------------------------------------------------

    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(String::as_str)
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn part_index(&self, name: &str) -> Option<usize> {
        self.parts.iter().position(|p| p == name)
    }

    /// Add a part, suffixing `_NN` when the name is taken. Every variant
    /// includes the new part. Returns the name actually used.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] for an empty name.
    pub fn add_part(&mut self, name: &str) -> Result<String> {
        check_name("part", name)?;
        let name = unique_name(name, self.parts.iter().map(String::as_str));
        self.parts.push(name.clone());
        for variant in &mut self.variants {
            variant.add_part(&name, true);
        }
        Ok(name)
    }

    /// Rename a part everywhere at once: the part list, every assigned
    /// object and every variant. A taken target name is suffixed.
    ///
    /// # Errors
    /// [`Error::UnknownName`] or [`Error::Inconsistent`]; nothing changes on
    /// failure.
    pub fn rename_part(&mut self, old: &str, new: &str) -> Result<String> {
        check_name("part", new)?;
        let index = self.part_index(old).ok_or_else(|| unknown_part(old))?;
        if old == new {
            return Ok(new.to_string());
        }
        let new = unique_name(new, self.parts.iter().map(String::as_str).filter(|p| *p != old));

        self.parts[index] = new.clone();
        for part in self.assignments.values_mut() {
            if part == old {
                part.clone_from(&new);
            }
        }
        for variant in &mut self.variants {
            variant.rename_part(old, &new);
        }
        tracing::debug!("Renamed part '{}' to '{}'", old, new);
        Ok(new)
    }

    /// Number of objects assigned to `part`.
    #[must_use]
    pub fn users(&self, part: &str) -> usize {
        self.assignments.values().filter(|p| *p == part).count()
    }

    /// Remove a part.
    ///
    /// # Errors
    /// [`Error::UnknownName`]; [`Error::PartInUse`] when objects still use
    /// the part and `mode` is [`PartRemoval::Reject`]; [`Error::Inconsistent`]
    /// when it is the last part.
    pub fn remove_part(&mut self, name: &str, mode: PartRemoval) -> Result<()> {
        let index = self.part_index(name).ok_or_else(|| unknown_part(name))?;
        if self.parts.len() == 1 {
            return Err(Error::inconsistent("Part", "an object needs at least one part"));
        }
        let users = self.users(name);
        if users > 0 && mode == PartRemoval::Reject {
            return Err(Error::PartInUse {
                part: name.to_string(),
                users,
            });
        }

        self.parts.remove(index);
        let fallback = self.parts[0].clone();
        for part in self.assignments.values_mut() {
            if part == name {
                part.clone_from(&fallback);
            }
        }
        for variant in &mut self.variants {
            variant.remove_part(name);
        }
        Ok(())
    }

    /// Tag an object with a part.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for an unknown part.
    pub fn assign(&mut self, object: ObjectId, part: &str) -> Result<()> {
        if self.part_index(part).is_none() {
            return Err(unknown_part(part));
        }
        self.assignments.insert(object, part.to_string());
        Ok(())
    }

    /// Drop the part tag of an object the host deleted.
    pub fn forget_object(&mut self, object: ObjectId) {
        self.assignments.shift_remove(&object);
    }

    #[must_use]
    pub fn part_of(&self, object: ObjectId) -> Option<&str> {
        self.assignments.get(&object).map(String::as_str)
    }

    /// Objects tagged with `part`, in assignment order.
    pub fn objects_in_part<'a>(&'a self, part: &'a str) -> impl Iterator<Item = ObjectId> + 'a {
        self.assignments
            .iter()
            .filter(move |(_, p)| *p == part)
            .map(|(id, _)| *id)
    }

    /// Rewrite object ids after the host assigned real identities.
    pub fn remap_objects(&mut self, map: impl Fn(ObjectId) -> Option<ObjectId>) {
        self.assignments = std::mem::take(&mut self.assignments)
            .into_iter()
            .filter_map(|(id, part)| map(id).map(|new| (new, part)))
            .collect();
    }

    // ------------------------------------------------------------------
    // Variants
    // ------------------------------------------------------------------

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    #[must_use]
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Add a variant including every part; returns the name used.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] for an empty name.
    pub fn add_variant(&mut self, name: &str) -> Result<String> {
        check_name("variant", name)?;
        let name = unique_name(name, self.variants.iter().map(|v| v.name.as_str()));
        self.variants
            .push(Variant::including_all(name.clone(), self.parts.iter().map(String::as_str)));
        Ok(name)
    }

    /// # Errors
    /// [`Error::UnknownName`], or [`Error::Inconsistent`] for the last variant.
    pub fn remove_variant(&mut self, name: &str) -> Result<()> {
        let index = self
            .variants
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| unknown_variant(name))?;
        if self.variants.len() == 1 {
            return Err(Error::inconsistent("Variant", "an object needs at least one variant"));
        }
        self.variants.remove(index);
        Ok(())
    }

    /// # Errors
    /// [`Error::UnknownName`] or [`Error::Inconsistent`].
    pub fn rename_variant(&mut self, old: &str, new: &str) -> Result<String> {
        check_name("variant", new)?;
        let index = self
            .variants
            .iter()
            .position(|v| v.name == old)
            .ok_or_else(|| unknown_variant(old))?;
        if old == new {
            return Ok(new.to_string());
        }
        let new = unique_name(new, self.variants.iter().map(|v| v.name.as_str()).filter(|v| *v != old));
        self.variants[index].name.clone_from(&new);
        Ok(new)
    }

    /// Include or exclude a part in a variant.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for an unknown variant or part.
    pub fn set_included(&mut self, variant: &str, part: &str, included: bool) -> Result<()> {
        if self.part_index(part).is_none() {
            return Err(unknown_part(part));
        }
        let variant = self
            .variants
            .iter_mut()
            .find(|v| v.name == variant)
            .ok_or_else(|| unknown_variant(variant))?;
        variant.set(part, included);
        Ok(())
    }

    /// # Errors
    /// [`Error::UnknownName`].
    pub fn is_included(&self, variant: &str, part: &str) -> Result<bool> {
        let variant = self.variant(variant).ok_or_else(|| unknown_variant(variant))?;
        variant.includes(part).ok_or_else(|| unknown_part(part))
    }

    /// Objects visible in a variant.
    ///
    /// # Errors
    /// [`Error::UnknownName`].
    pub fn objects_in_variant(&self, variant: &str) -> Result<Vec<ObjectId>> {
        let variant = self.variant(variant).ok_or_else(|| unknown_variant(variant))?;
        Ok(self
            .assignments
            .iter()
            .filter(|(_, part)| variant.includes(part).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect())
    }

    /// Insert an imported variant as-is (parts must already exist).
    ///
    /// # Errors
    /// [`Error::Inconsistent`] when it names unknown parts.
    pub(crate) fn push_variant(&mut self, mut variant: Variant) -> Result<()> {
        for part in variant.part_names() {
            if self.part_index(part).is_none() {
                return Err(Error::inconsistent(
                    &format!("Variant:{}", variant.name),
                    format!("references unknown part '{part}'"),
                ));
            }
        }
        for part in &self.parts {
            if !variant.references(part) {
                variant.add_part(part, false);
            }
        }
        variant.name = unique_name(&variant.name, self.variants.iter().map(|v| v.name.as_str()));
        self.variants.push(variant);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check every structural invariant of the game object.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        for (i, part) in self.parts.iter().enumerate() {
            check_name("part", part)?;
            if self.parts[..i].contains(part) {
                return Err(Error::inconsistent("Part", format!("duplicate part name '{part}'")));
            }
        }
        for variant in &self.variants {
            for part in variant.part_names() {
                if self.part_index(part).is_none() {
                    return Err(Error::inconsistent(
                        &format!("Variant:{}", variant.name),
                        format!("references unknown part '{part}'"),
                    ));
                }
            }
            for part in &self.parts {
                if !variant.references(part) {
                    return Err(Error::inconsistent(
                        &format!("Variant:{}", variant.name),
                        format!("has no entry for part '{part}'"),
                    ));
                }
            }
        }
        for (object, part) in &self.assignments {
            if self.part_index(part).is_none() {
                return Err(Error::inconsistent(
                    "Part",
                    format!("object {object} uses unknown part '{part}'"),
                ));
            }
        }
        self.looks.check_totality()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck() -> GameObject {
        let mut go = GameObject::new_default("truck");
        go.rename_part(DEFAULT_PART, "cab").unwrap();
        go.add_part("chassis").unwrap();
        go.assign(1, "cab").unwrap();
        go.assign(2, "chassis").unwrap();
        go.assign(3, "cab").unwrap();
        go
    }

    #[test]
    fn test_default_object() {
        let go = GameObject::new_default("empty");
        assert_eq!(go.parts().collect::<Vec<_>>(), [DEFAULT_PART]);
        assert_eq!(go.variant_count(), 1);
        assert_eq!(go.looks.look_count(), 1);
        assert!(go.validate().is_ok());
    }

    #[test]
    fn test_rename_is_atomic() {
        let mut go = truck();
        go.add_variant("naked").unwrap();
        go.set_included("naked", "cab", false).unwrap();

        assert_eq!(go.rename_part("cab", "cabin").unwrap(), "cabin");
        assert_eq!(go.part_of(1), Some("cabin"));
        assert_eq!(go.part_of(3), Some("cabin"));
        assert!(!go.is_included("naked", "cabin").unwrap());
        assert!(go.variants().all(|v| v.includes("cab").is_none()));
        assert!(go.validate().is_ok());
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let mut go = truck();
        assert_eq!(go.add_part("cab").unwrap(), "cab_01");
        assert_eq!(go.add_part("cab").unwrap(), "cab_02");
        assert_eq!(go.rename_part("cab_02", "chassis").unwrap(), "chassis_01");
        assert_eq!(go.add_variant("default").unwrap(), "default_01");
    }

    #[test]
    fn test_remove_part_modes() {
        let mut go = truck();
        assert!(matches!(
            go.remove_part("cab", PartRemoval::Reject),
            Err(Error::PartInUse { users: 2, .. })
        ));
        go.remove_part("cab", PartRemoval::RetagToDefault).unwrap();
        assert_eq!(go.part_of(1), Some("chassis"));
        assert!(go.remove_part("chassis", PartRemoval::RetagToDefault).is_err());
    }

    #[test]
    fn test_variant_masking() {
        let mut go = truck();
        go.add_variant("naked").unwrap();
        go.set_included("naked", "cab", false).unwrap();
        assert_eq!(go.objects_in_variant("naked").unwrap(), vec![2]);
        assert_eq!(go.objects_in_variant("default").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remap_objects() {
        let mut go = truck();
        go.remap_objects(|id| (id != 2).then_some(id + 100));
        assert_eq!(go.part_of(101), Some("cab"));
        assert_eq!(go.part_of(102), None);
    }
}
