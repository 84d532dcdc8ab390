//! Material alias import from `.mat` files
//!
//! A material may take its effect, attribute values and textures from the
//! `.mat` file that sits next to its base texture, provided the texture
//! lives under one of the configured project subtrees and the effect
//! belongs to the aliasing family.

use std::path::Path;

use crate::config::MaterialSettings;
use crate::error::{Error, Result};
use crate::formats::sii::{SiiLibrary, SiiValue};
use crate::resolver::{ProjectResolver, is_virtual, to_scene_form};

use super::definition::{Material, NewAttributes};
use super::presets::ShaderPresetCatalog;

/// Check whether `material` may be aliased.
///
/// # Errors
/// [`Error::AliasingRefused`] naming the failed condition.
pub fn check_eligible(material: &Material, settings: &MaterialSettings) -> Result<()> {
    let refuse = |reason: String| Err(Error::AliasingRefused { reason });

    if !settings.aliasing_effects.iter().any(|e| *e == material.effect) {
        return refuse(format!("effect '{}' is not aliasable", material.effect));
    }
    let Some(base) = material.base_texture().filter(|t| !t.path.is_empty()) else {
        return refuse(format!("material '{}' has no base texture", material.alias));
    };
    if !is_virtual(&base.path) {
        return refuse(format!("base texture '{}' is not a project path", base.path));
    }
    let project_path = base.path.trim_start_matches('/');
    let inside = settings
        .aliasing_subtrees
        .iter()
        .any(|subtree| project_path.starts_with(subtree.trim_start_matches('/')));
    if !inside {
        return refuse(format!("base texture '{}' is outside the aliasing subtrees", base.path));
    }
    Ok(())
}

/// Project path of the `.mat` file for an eligible material.
#[must_use]
pub fn alias_path(material: &Material) -> Option<String> {
    let base = material.base_texture()?;
    let dot = base.path.rfind('.')?;
    Some(format!("{}.mat", &base.path[..dot]))
}

/// Replace the material's effect, attributes and textures with the
/// contents of its `.mat` file.
///
/// The material is only modified when every step succeeds.
///
/// # Errors
/// [`Error::AliasingRefused`], [`Error::Resolve`], parse errors, or
/// [`Error::UnknownEffect`] for an effect outside the catalog.
pub fn import_alias(
    material: &mut Material,
    catalog: &ShaderPresetCatalog,
    settings: &MaterialSettings,
    resolver: &ProjectResolver,
) -> Result<()> {
    check_eligible(material, settings)?;
    let Some(virtual_path) = alias_path(material) else {
        return Err(Error::AliasingRefused {
            reason: "base texture has no extension".to_string(),
        });
    };
    let file = resolver.resolve(&virtual_path)?;
    let library = SiiLibrary::read(&file)?;
    let unit = library.units_of_class("material").next().ok_or_else(|| Error::AliasingRefused {
        reason: format!("{virtual_path} holds no material unit"),
    })?;

    let mut staged = material.clone();
    let schema = catalog.schema(&unit.name)?;
    staged.effect = unit.name.clone();
    staged.migrate(&schema, NewAttributes::Defaults);

    for (key, values) in &unit.attributes {
        match key.as_str() {
            "texture" | "texture_name" => {}
            "substance" => {
                if let Some(name) = values.first().and_then(SiiValue::as_str) {
                    staged.substance = name.to_string();
                }
            }
            tag => {
                let Some(floats) = values.first().and_then(SiiValue::as_floats) else { continue };
                if staged.set_attribute(tag, &floats).is_err() {
                    tracing::warn!("{}: ignoring attribute '{}'", virtual_path, tag);
                }
            }
        }
    }

    let mat_dir = Path::new(&virtual_path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let paths = unit.get_all("texture");
    let names = unit.get_all("texture_name");
    for (path, name) in paths.iter().zip(names) {
        let (Some(path), Some(name)) = (path.as_str(), name.as_str()) else { continue };
        let scene_path = if path.starts_with('/') {
            to_scene_form(path)
        } else {
            format!("{mat_dir}/{path}")
        };
        if staged.set_texture(name, &scene_path).is_err() {
            tracing::warn!("{}: ignoring texture '{}'", virtual_path, name);
        }
    }

    tracing::info!("Aliased material '{}' from {}", staged.alias, virtual_path);
    *material = staged;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::BASE_TEXTURE;
    use crate::material::presets::tests::catalog;
    use std::fs;

    fn eligible() -> Material {
        let mut material = Material::new("paint", "eut2.dif", &catalog()).unwrap();
        material.set_texture(BASE_TEXTURE, "//material/metal/plate.tobj").unwrap();
        material
    }

    #[test]
    fn test_eligibility() {
        let settings = MaterialSettings::default();
        assert!(check_eligible(&eligible(), &settings).is_ok());

        let mut outside = eligible();
        outside.set_texture(BASE_TEXTURE, "//model/truck/plate.tobj").unwrap();
        assert!(matches!(check_eligible(&outside, &settings), Err(Error::AliasingRefused { .. })));

        let glass = Material::new("glass", "eut2.glass", &catalog()).unwrap();
        assert!(check_eligible(&glass, &settings).is_err());
    }

    #[test]
    fn test_import_alias() {
        let dir = tempfile::tempdir().unwrap();
        let mat_dir = dir.path().join("material/metal");
        fs::create_dir_all(&mat_dir).unwrap();
        fs::write(
            mat_dir.join("plate.mat"),
            "material : \"eut2.dif.spec\" {\n diffuse : { 0.5 , 0.25 , 1.0 }\n specular : { 1 , 1 , 1 }\n texture : \"plate_new.tobj\"\n texture_name : \"texture_base\"\n}\n",
        )
        .unwrap();
        let resolver = ProjectResolver::new(dir.path(), false);

        let mut material = eligible();
        import_alias(&mut material, &catalog(), &MaterialSettings::default(), &resolver).unwrap();
        assert_eq!(material.effect, "eut2.dif.spec");
        assert_eq!(material.attribute("diffuse"), Some(&[0.5, 0.25, 1.0][..]));
        assert_eq!(material.base_texture().unwrap().path, "//material/metal/plate_new.tobj");
    }

    #[test]
    fn test_missing_mat_leaves_material() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ProjectResolver::new(dir.path(), false);
        let mut material = eligible();
        let before = material.clone();
        assert!(matches!(
            import_alias(&mut material, &catalog(), &MaterialSettings::default(), &resolver),
            Err(Error::Resolve { .. })
        ));
        assert_eq!(material, before);
    }
}
