//! Physical substance catalog (`game_substance` units)

use crate::error::{Error, Result};
use crate::formats::sii::SiiLibrary;
use crate::resolver::ProjectResolver;

use super::definition::{Material, NO_SUBSTANCE};

/// Project library holding substance definitions.
pub const SUBSTANCE_LIBRARY: &str = "//def/substance.sii";

const SUBSTANCE_CLASS: &str = "game_substance";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstanceCatalog {
    names: Vec<String>,
}

impl SubstanceCatalog {
    #[must_use]
    pub fn from_library(library: &SiiLibrary) -> Self {
        let mut names: Vec<String> = Vec::new();
        for unit in library.units_of_class(SUBSTANCE_CLASS) {
            let name = unit.name.trim_start_matches('.').to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self { names }
    }

    /// Load the project's substance library (with infixed variants).
    ///
    /// # Errors
    /// Resolution or parse errors.
    pub fn load(resolver: &ProjectResolver) -> Result<Self> {
        let library = resolver.load_library(SUBSTANCE_LIBRARY)?;
        let catalog = Self::from_library(&library);
        tracing::info!("Loaded {} substance(s)", catalog.names.len());
        Ok(catalog)
    }

    #[must_use]
    pub fn from_names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        name == NO_SUBSTANCE || self.names.iter().any(|n| n == name)
    }

    /// # Errors
    /// [`Error::UnknownName`] when the material's substance is not known.
    pub fn validate(&self, material: &Material) -> Result<()> {
        if self.contains(&material.substance) {
            Ok(())
        } else {
            Err(Error::UnknownName {
                kind: "substance",
                name: material.substance.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::sii::{Entry, parse_sii};

    #[test]
    fn test_catalog_from_units() {
        let mut library = SiiLibrary::default();
        for entry in parse_sii("SiiNunit {\ngame_substance : .metal { }\ngame_substance : .rubber { }\nother : .x { }\n}\n").unwrap() {
            if let Entry::Unit(unit) = entry {
                library.units.push(unit);
            }
        }
        let catalog = SubstanceCatalog::from_library(&library);
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["metal", "rubber"]);
        assert!(catalog.contains("none"));
        assert!(!catalog.contains("x"));

        let mut material = Material::untyped("m", "eut2.dif");
        material.substance = "wood".into();
        assert!(matches!(catalog.validate(&material), Err(Error::UnknownName { kind: "substance", .. })));
    }
}
