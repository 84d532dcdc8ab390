//! CLI command for importing a game object and exporting it again

use std::path::Path;
use std::time::Instant;

use crate::bridge::{Session, export_game_object, import_game_object};
use crate::cli::progress::{DISK, TRUCK, print_done, print_step, print_warning};
use crate::config::BridgeConfig;
use crate::scene::MemoryScene;

pub fn execute(source: &Path, output: &Path, presets: Option<&Path>, config: &BridgeConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut session = Session::open(config.clone(), presets)?;
    let mut scene = MemoryScene::new();

    print_step(1, 2, TRUCK, &format!("Importing {}...", source.display()));
    let imported = import_game_object(&mut session, source, &mut scene)?;
    println!(
        "  {} file(s) read, {} scene object(s)",
        imported.files.len(),
        imported.objects.len()
    );
    for diagnostic in &imported.diagnostics {
        print_warning(&diagnostic.to_string());
    }

    print_step(2, 2, DISK, &format!("Exporting to {}...", output.display()));
    let exported = export_game_object(&mut session, &scene, imported.root, output)?;
    for path in &exported.written {
        println!("  {}", path.display());
    }
    let textures = &exported.textures;
    if !textures.copied.is_empty() || !textures.synthesized.is_empty() {
        println!(
            "  {} texture file(s) copied, {} TOBJ(s) synthesized",
            textures.copied.len(),
            textures.synthesized.len()
        );
    }
    for diagnostic in &exported.diagnostics {
        print_warning(&diagnostic.to_string());
    }

    print_done(start.elapsed());
    Ok(())
}
