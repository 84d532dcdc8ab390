//! Command execution implementations

use super::Commands;
use super::{check, inspect, presets, resolve, roundtrip, tobj};
use crate::config::BridgeConfig;

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self, config: &BridgeConfig) -> anyhow::Result<()> {
        match self {
            Commands::Inspect { source, json } => inspect::execute(source, *json, config),
            Commands::Check { dir, quiet } => check::execute(dir, *quiet, config),
            Commands::Roundtrip {
                source,
                output,
                presets,
            } => roundtrip::execute(source, output, presets.as_deref(), config),
            Commands::Resolve {
                path,
                root,
                no_alternative_bases,
            } => resolve::execute(path, root.as_deref(), !*no_alternative_bases, config),
            Commands::Presets { library, effect } => presets::execute(library, effect.as_deref()),
            Commands::Tobj { source, output, to } => tobj::execute(source, output.as_deref(), *to),
        }
    }
}
