//! CLI command for summarizing a single file

use std::fs;
use std::path::Path;

use crate::cli::progress::print_warning;
use crate::config::BridgeConfig;
use crate::error::Diagnostic;
use crate::formats::pix::{FileKind, PixFile};
use crate::formats::tobj::{is_binary, parse_tobj_bytes};
use crate::formats::{read_pia, read_pic, read_pim, read_pip, read_pis, read_pit};

fn is_tobj(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tobj"))
}

pub fn execute(source: &Path, json: bool, config: &BridgeConfig) -> anyhow::Result<()> {
    if is_tobj(source) {
        return inspect_tobj(source);
    }
    if json {
        let file = PixFile::read(source)?;
        println!("{}", serde_json::to_string_pretty(&file)?);
        return Ok(());
    }

    let Some(kind) = FileKind::from_extension(source) else {
        anyhow::bail!("{}: not a PIX or TOBJ file", source.display());
    };
    let recount = config.pix.recount_globals;
    println!("{} ({})", source.display(), kind.as_str());
    let diagnostics: Vec<Diagnostic> = match kind {
        FileKind::Model => {
            let (model, diagnostics) = read_pim(source, recount)?;
            println!("  Dialect:   {:?}", model.dialect);
            println!("  Materials: {}", model.materials.len());
            for material in &model.materials {
                println!("    {} -> {}", material.alias, material.effect);
            }
            println!("  Pieces:    {}", model.pieces.len());
            println!("  Parts:     {}", model.parts.len());
            for part in &model.parts {
                println!(
                    "    {} ({} piece(s), {} locator(s))",
                    part.name,
                    part.pieces.len(),
                    part.locators.len()
                );
            }
            println!("  Locators:  {}", model.locators.len());
            if let Some(skeleton) = &model.skeleton {
                println!("  Skeleton:  {skeleton} ({} bone(s))", model.bones.len());
            }
            diagnostics
        }
        FileKind::Trait => {
            let (traits, diagnostics) = read_pit(source, recount)?;
            println!("  Looks:    {}", traits.looks.len());
            for (look, materials) in &traits.looks {
                println!("    {look} ({} material(s))", materials.len());
            }
            println!("  Variants: {}", traits.variants.len());
            for variant in &traits.variants {
                println!("    {}", variant.name);
            }
            diagnostics
        }
        FileKind::Collision => {
            let (collision, diagnostics) = read_pic(source, recount)?;
            println!("  Locators:     {}", collision.locators.len());
            println!("  Convex hulls: {}", collision.pieces.len());
            println!("  Parts:        {}", collision.parts.len());
            diagnostics
        }
        FileKind::Prefab => {
            let (prefab, diagnostics) = read_pip(source, recount)?;
            println!("  Nodes:          {}", prefab.nodes.len());
            println!("  Curves:         {}", prefab.curves.len());
            println!("  Signs:          {}", prefab.signs.len());
            println!("  Spawn points:   {}", prefab.spawn_points.len());
            println!("  Semaphores:     {}", prefab.semaphores.len());
            println!("  Map points:     {}", prefab.map_points.len());
            println!("  Trigger points: {}", prefab.trigger_points.len());
            println!("  Intersections:  {}", prefab.intersections.len());
            diagnostics
        }
        FileKind::Skeleton => {
            let (skeleton, diagnostics) = read_pis(source, recount)?;
            println!("  Bones: {}", skeleton.bones.len());
            for bone in &skeleton.bones {
                match bone.parent.and_then(|p| skeleton.bones.get(p)) {
                    Some(parent) => println!("    {} <- {}", bone.name, parent.name),
                    None => println!("    {}", bone.name),
                }
            }
            diagnostics
        }
        FileKind::Animation => {
            let (animation, diagnostics) = read_pia(source, recount)?;
            println!("  Skeleton:        {}", animation.skeleton);
            println!("  Total time:      {:.3}s", animation.total_time);
            println!("  Keyframes:       {}", animation.keyframe_count);
            println!("  Bone channels:   {}", animation.bone_channels.len());
            println!("  Custom channels: {}", animation.custom_channels.len());
            diagnostics
        }
    };

    for diagnostic in &diagnostics {
        print_warning(&diagnostic.to_string());
    }
    Ok(())
}

fn inspect_tobj(source: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(source)?;
    let tobj = parse_tobj_bytes(&bytes)?;
    let encoding = if is_binary(&bytes) { "binary" } else { "text" };
    println!("{} (TOBJ, {encoding})", source.display());
    println!("  Type:        {}", tobj.kind.as_str());
    for map in &tobj.maps {
        println!("    {map}");
    }
    println!(
        "  Address:     {} {} {}",
        tobj.address[0].as_str(),
        tobj.address[1].as_str(),
        tobj.address[2].as_str()
    );
    println!("  Color space: {}", tobj.color_space.as_str());
    println!("  Mip filter:  {}", tobj.mip_filter.as_str());
    if tobj.normal_map {
        println!("  Normal map");
    }
    if tobj.no_compress {
        println!("  Uncompressed");
    }
    Ok(())
}
