//! CLI command for browsing a shader preset library

use std::path::Path;

use crate::material::ShaderPresetCatalog;

pub fn execute(library: &Path, effect: Option<&str>) -> anyhow::Result<()> {
    let catalog = ShaderPresetCatalog::read(library)?;

    let Some(effect) = effect else {
        for preset in catalog.presets() {
            println!("{} ({})", preset.preset_name, preset.effect);
            for axis in &preset.axes {
                let names: Vec<&str> = axis
                    .iter()
                    .map(|kind| catalog.flavor(kind).map_or(kind.as_str(), |f| f.name.as_str()))
                    .collect();
                println!("    [{}]", names.join(" | "));
            }
        }
        return Ok(());
    };

    let matched = catalog.lookup(effect)?;
    let schema = catalog.schema(effect)?;
    println!("{effect} -> {}", matched.preset.preset_name);
    let flavors: Vec<&str> = matched.flavors().collect();
    if !flavors.is_empty() {
        println!("  Flavors: {}", flavors.join(", "));
    }
    println!("  Attributes:");
    for (tag, value) in &schema.attributes {
        let values: Vec<String> = value.values.iter().map(ToString::to_string).collect();
        println!("    {tag}: {} ({})", value.format.as_token(), values.join(" "));
    }
    println!("  Textures:");
    for tag in schema.textures.keys() {
        println!("    {tag}");
    }
    Ok(())
}
