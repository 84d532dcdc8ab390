//! Variants: per-part inclusion tables

use indexmap::IndexMap;

/// Variant every new object starts with.
pub const DEFAULT_VARIANT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    /// Part name to inclusion flag, in part order.
    parts: IndexMap<String, bool>,
}

impl Variant {
    /// A variant including every listed part.
    pub fn including_all<'a>(name: impl Into<String>, parts: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: name.into(),
            parts: parts.into_iter().map(|p| (p.to_string(), true)).collect(),
        }
    }

    #[must_use]
    pub fn includes(&self, part: &str) -> Option<bool> {
        self.parts.get(part).copied()
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, bool)> {
        self.parts.iter().map(|(name, &on)| (name.as_str(), on))
    }

    pub fn included_parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter(|(_, on)| **on).map(|(name, _)| name.as_str())
    }

    pub(crate) fn set(&mut self, part: &str, included: bool) {
        if let Some(flag) = self.parts.get_mut(part) {
            *flag = included;
        }
    }

    pub(crate) fn add_part(&mut self, part: &str, included: bool) {
        self.parts.insert(part.to_string(), included);
    }

    pub(crate) fn remove_part(&mut self, part: &str) {
        self.parts.shift_remove(part);
    }

    /// Rename a key in place, keeping its position.
    pub(crate) fn rename_part(&mut self, old: &str, new: &str) {
        if let Some(index) = self.parts.get_index_of(old) {
            let included = self.parts[index];
            self.parts.shift_remove_index(index);
            self.parts.shift_insert(index, new.to_string(), included);
        }
    }

    pub(crate) fn references(&self, part: &str) -> bool {
        self.parts.contains_key(part)
    }

    pub(crate) fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_keeps_position() {
        let mut variant = Variant::including_all("default", ["cab", "chassis", "wheels"]);
        variant.set("chassis", false);
        variant.rename_part("chassis", "frame");
        let parts: Vec<_> = variant.parts().collect();
        assert_eq!(parts, [("cab", true), ("frame", false), ("wheels", true)]);
    }
}
