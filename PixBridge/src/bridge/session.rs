//! Process state shared by imports and exports

use std::path::Path;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::formats::pix::WriteOptions;
use crate::material::{ShaderPresetCatalog, SubstanceCatalog};
use crate::prefab::PrefabRegistry;
use crate::resolver::ProjectResolver;

/// Configuration, catalogs, resolver and prefab graph of one working
/// session. Created explicitly and dropped on teardown; nothing here is
/// global.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: BridgeConfig,
    pub catalog: ShaderPresetCatalog,
    pub substances: SubstanceCatalog,
    pub resolver: Option<ProjectResolver>,
    pub registry: PrefabRegistry,
}

impl Session {
    /// A session with an empty substance catalog. The resolver comes from
    /// the `[resolver]` settings.
    #[must_use]
    pub fn new(config: BridgeConfig, catalog: ShaderPresetCatalog) -> Self {
        let resolver = ProjectResolver::from_settings(&config.resolver);
        let registry = PrefabRegistry::new(&config.prefab);
        Self {
            config,
            catalog,
            substances: SubstanceCatalog::default(),
            resolver,
            registry,
        }
    }

    /// Build a session from a config, loading the preset library from
    /// `presets` and the substance library through the resolver when a
    /// project root is configured.
    ///
    /// # Errors
    /// Preset library IO or parse errors. A missing substance library is
    /// only logged.
    pub fn open(config: BridgeConfig, presets: Option<&Path>) -> Result<Self> {
        let catalog = match presets {
            Some(path) => ShaderPresetCatalog::read(path)?,
            None => ShaderPresetCatalog::default(),
        };
        let mut session = Self::new(config, catalog);
        if let Some(resolver) = &session.resolver {
            match SubstanceCatalog::load(resolver) {
                Ok(substances) => session.substances = substances,
                Err(e) => tracing::warn!("Substance library unavailable: {}", e),
            }
        }
        Ok(session)
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: ProjectResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_substances(mut self, substances: SubstanceCatalog) -> Self {
        self.substances = substances;
        self
    }

    #[must_use]
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::from_config(&self.config)
    }

    /// Forget all prefab graph state, e.g. when the host loads a new scene.
    pub fn reset(&mut self) {
        self.registry.clear();
    }
}
