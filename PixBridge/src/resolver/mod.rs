//! Project path resolution across layered project roots
//!
//! A `//`-prefixed path is looked up under the active project root first,
//! then under the alternative bases derived from it (`base`,
//! `base_share`, `base_vehicle` next to or above the root, and the parent
//! of a `dlc_*` root).

mod paths;

pub use paths::{
    PROJECT_SENTINEL, is_virtual, normalize_path, project_relative, to_file_form, to_scene_form,
};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ResolverSettings;
use crate::error::{Error, Result};
use crate::formats::sii::SiiLibrary;

/// Directory names recognized as shared base projects.
pub const KNOWN_BASES: [&str; 3] = ["base", "base_share", "base_vehicle"];

/// Resolves project-relative paths against the active root and its
/// alternative bases.
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    root: PathBuf,
    bases: Vec<PathBuf>,
}

impl ProjectResolver {
    /// Create a resolver for `root`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P, use_alternative_bases: bool) -> Self {
        let root = root.as_ref().to_path_buf();
        let bases = if use_alternative_bases {
            alternative_bases(&root)
        } else {
            vec![root.clone()]
        };
        tracing::debug!("Resolver root {} with {} base(s)", root.display(), bases.len());
        Self { root, bases }
    }

    /// Resolver from configuration, if a project root is configured.
    #[must_use]
    pub fn from_settings(settings: &ResolverSettings) -> Option<Self> {
        settings
            .expanded_root()
            .map(|root| Self::new(root, settings.use_alternative_bases))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ordered search bases, the active root first.
    #[must_use]
    pub fn bases(&self) -> &[PathBuf] {
        &self.bases
    }

    /// Every candidate location for `virtual_path`, in lookup order.
    #[must_use]
    pub fn candidates(&self, virtual_path: &str) -> Vec<PathBuf> {
        let relative = project_relative(virtual_path);
        self.bases.iter().map(|base| base.join(&relative)).collect()
    }

    /// First existing file for `virtual_path`.
    ///
    /// # Errors
    /// [`Error::Resolve`] when no base holds the file.
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf> {
        self.candidates(virtual_path)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| Error::Resolve {
                path: virtual_path.to_string(),
                bases: self.bases.len(),
            })
    }

    /// First existing directory for `virtual_path`.
    ///
    /// # Errors
    /// [`Error::Resolve`] when no base holds the directory.
    pub fn resolve_dir(&self, virtual_path: &str) -> Result<PathBuf> {
        self.candidates(virtual_path)
            .into_iter()
            .find(|p| p.is_dir())
            .ok_or_else(|| Error::Resolve {
                path: virtual_path.to_string(),
                bases: self.bases.len(),
            })
    }

    /// Resolve a path that is either project-relative (`//x` or, inside
    /// files, `/x`) or relative to `context_dir`.
    ///
    /// # Errors
    /// [`Error::Resolve`] when nothing exists at the computed location.
    pub fn resolve_in_context(&self, path: &str, context_dir: &Path) -> Result<PathBuf> {
        let normalized = path.replace('\\', "/");
        if normalized.starts_with('/') {
            return self.resolve(&normalized);
        }
        let local = context_dir.join(&normalized);
        if local.exists() {
            Ok(local)
        } else {
            Err(Error::Resolve {
                path: normalized,
                bases: 1,
            })
        }
    }

    /// A library file plus every infixed variant (`a.sii` also matches
    /// `a.<token>.sii`) found under any base.
    ///
    /// The plain file comes first when present; infixed files follow sorted
    /// by name, then by base order, without duplicates.
    ///
    /// # Errors
    /// [`Error::Resolve`] when neither the file nor any variant exists.
    pub fn resolve_library(&self, virtual_path: &str) -> Result<Vec<PathBuf>> {
        let relative = project_relative(virtual_path);
        let rel_path = Path::new(&relative);
        let file_name = rel_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let rel_dir = rel_path.parent().unwrap_or_else(|| Path::new(""));

        let mut found = Vec::new();
        if let Ok(primary) = self.resolve(virtual_path) {
            found.push(primary);
        }

        let mut infixed: Vec<(String, usize, PathBuf)> = Vec::new();
        for (order, base) in self.bases.iter().enumerate() {
            let dir = base.join(rel_dir);
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if paths::is_infixed_variant(&name, &file_name) && entry.path().is_file() {
                    infixed.push((name, order, entry.path()));
                }
            }
        }
        infixed.sort();
        for (_, _, path) in infixed {
            if !found.contains(&path) {
                found.push(path);
            }
        }

        if found.is_empty() {
            return Err(Error::Resolve {
                path: virtual_path.to_string(),
                bases: self.bases.len(),
            });
        }
        tracing::debug!("Library {} resolved to {} file(s)", virtual_path, found.len());
        Ok(found)
    }

    /// Resolve a library and merge the units of every matching file.
    ///
    /// # Errors
    /// Resolution or parse errors.
    pub fn load_library(&self, virtual_path: &str) -> Result<SiiLibrary> {
        let files = self.resolve_library(virtual_path)?;
        SiiLibrary::merge(&files)
    }

    /// `//`-form of an absolute path lying under one of the bases.
    #[must_use]
    pub fn to_virtual(&self, path: &Path) -> Option<String> {
        self.bases.iter().find_map(|base| {
            path.strip_prefix(base)
                .ok()
                .map(|rel| format!("{PROJECT_SENTINEL}{}", normalize_path(rel)))
        })
    }

    /// Whether `path` lies inside the active project or one of its bases.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.bases.iter().any(|base| path.starts_with(base))
    }
}

/// Ordered alternative bases for `root`, the root itself first.
fn alternative_bases(root: &Path) -> Vec<PathBuf> {
    let mut bases = vec![root.to_path_buf()];
    let mut push = |candidate: PathBuf| {
        if !bases.contains(&candidate) {
            bases.push(candidate);
        }
    };

    let parent = root.parent();
    let grandparent = parent.and_then(Path::parent);
    for dir in [parent, grandparent].into_iter().flatten() {
        for name in KNOWN_BASES {
            push(dir.join(name));
        }
    }

    let is_dlc = root
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("dlc_"));
    if is_dlc {
        if let Some(parent) = parent {
            push(parent.to_path_buf());
        }
    }
    bases
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_base_order() {
        let resolver = ProjectResolver::new("/p/mod_x/dlc_north", true);
        let bases: Vec<_> = resolver.bases().iter().map(|p| normalize_path(p)).collect();
        assert_eq!(bases[0], "/p/mod_x/dlc_north");
        assert_eq!(bases[1], "/p/mod_x/base");
        assert_eq!(bases[2], "/p/mod_x/base_share");
        assert_eq!(bases[3], "/p/mod_x/base_vehicle");
        assert_eq!(bases[4], "/p/base");
        assert_eq!(bases.last().unwrap(), "/p/mod_x");
    }

    #[test]
    fn test_no_alternatives() {
        let resolver = ProjectResolver::new("/p/mod_x", false);
        assert_eq!(resolver.bases().len(), 1);
    }

    #[test]
    fn test_resolve_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mod_x/dlc_north");
        fs::create_dir_all(&root).unwrap();
        let target = dir.path().join("mod_x/base/def/world/sign.sii");
        touch(&target, "SiiNunit {\n}\n");

        let resolver = ProjectResolver::new(&root, true);
        assert_eq!(resolver.resolve("//def/world/sign.sii").unwrap(), target);
        assert!(matches!(resolver.resolve("//def/missing.sii"), Err(Error::Resolve { .. })));

        let no_alt = ProjectResolver::new(&root, false);
        assert!(no_alt.resolve("//def/world/sign.sii").is_err());
    }

    #[test]
    fn test_library_infix_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        touch(&root.join("def/sign.sii"), "");
        touch(&root.join("def/sign.zz.sii"), "");
        touch(&root.join("def/sign.aa.sii"), "");
        touch(&root.join("def/sign.x.y.sii"), "");

        let resolver = ProjectResolver::new(&root, false);
        let files = resolver.resolve_library("//def/sign.sii").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["sign.sii", "sign.aa.sii", "sign.zz.sii"]);
    }

    #[test]
    fn test_to_virtual() {
        let resolver = ProjectResolver::new("/p/mod_x", true);
        assert_eq!(
            resolver.to_virtual(Path::new("/p/mod_x/material/a.tobj")).as_deref(),
            Some("//material/a.tobj")
        );
        assert_eq!(
            resolver.to_virtual(Path::new("/p/base/model/b.pim")).as_deref(),
            Some("//model/b.pim")
        );
        assert_eq!(resolver.to_virtual(Path::new("/elsewhere/c.png")), None);
    }
}
