//! CLI command for validating every PIX file under a directory

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cli::progress::{GEAR, LOOKING_GLASS, print_done, print_step, print_warning, simple_bar};
use crate::config::BridgeConfig;
use crate::error::{Diagnostic, Result};
use crate::formats::pix::FileKind;
use crate::formats::{read_pia, read_pic, read_pim, read_pip, read_pis, read_pit};

/// Parse one file with its typed reader, keeping only the diagnostics.
fn check_file(path: &Path, kind: FileKind, recount: bool) -> Result<Vec<Diagnostic>> {
    Ok(match kind {
        FileKind::Model => read_pim(path, recount)?.1,
        FileKind::Trait => read_pit(path, recount)?.1,
        FileKind::Collision => read_pic(path, recount)?.1,
        FileKind::Prefab => read_pip(path, recount)?.1,
        FileKind::Skeleton => read_pis(path, recount)?.1,
        FileKind::Animation => read_pia(path, recount)?.1,
    })
}

pub fn execute(dir: &Path, quiet: bool, config: &BridgeConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 2, LOOKING_GLASS, &format!("Scanning {}...", dir.display()));

    let mut files: Vec<(PathBuf, FileKind)> = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = FileKind::from_extension(entry.path()) {
            files.push((entry.into_path(), kind));
        }
    }

    print_step(2, 2, GEAR, &format!("Checking {} file(s)...", files.len()));
    let bar = (!quiet).then(|| simple_bar(files.len() as u64, "Checking"));
    let recount = config.pix.recount_globals;
    let results: Vec<(&PathBuf, Result<Vec<Diagnostic>>)> = files
        .par_iter()
        .map(|(path, kind)| {
            let result = check_file(path, *kind, recount);
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            (path, result)
        })
        .collect();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let mut failed = 0usize;
    let mut warnings = 0usize;
    for (path, result) in &results {
        match result {
            Ok(diagnostics) => {
                for diagnostic in diagnostics {
                    print_warning(&format!("{}: {diagnostic}", path.display()));
                }
                warnings += diagnostics.len();
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {e}", console::style("error").red().bold(), path.display());
            }
        }
    }

    println!("{} file(s) checked, {failed} failed, {warnings} warning(s)", results.len());
    print_done(start.elapsed());
    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to parse");
    }
    Ok(())
}
