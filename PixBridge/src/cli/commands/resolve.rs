//! CLI command for resolving project paths

use std::path::Path;

use crate::config::BridgeConfig;
use crate::resolver::ProjectResolver;

pub fn execute(path: &str, root: Option<&Path>, alternative_bases: bool, config: &BridgeConfig) -> anyhow::Result<()> {
    let resolver = match root {
        Some(root) => ProjectResolver::new(root, alternative_bases),
        None => {
            let mut settings = config.resolver.clone();
            settings.use_alternative_bases &= alternative_bases;
            ProjectResolver::from_settings(&settings)
                .ok_or_else(|| anyhow::anyhow!("no project root: pass --root or set resolver.project_root"))?
        }
    };

    let is_library = Path::new(path)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("sii"));
    let found = if is_library {
        resolver.resolve_library(path)
    } else {
        resolver.resolve(path).map(|p| vec![p])
    };

    match found {
        Ok(files) => {
            for file in files {
                println!("{}", file.display());
            }
            Ok(())
        }
        Err(e) => {
            println!("Searched:");
            for candidate in resolver.candidates(path) {
                println!("  {}", candidate.display());
            }
            Err(e.into())
        }
    }
}
