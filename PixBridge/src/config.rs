//! Bridge configuration (pixbridge.toml)
//!
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

fn default_indent() -> String {
    "    ".to_string()
}

fn default_true() -> bool {
    true
}

fn default_weld_precision() -> u32 {
    4
}

fn default_scale() -> f32 {
    1.0
}

fn default_fps() -> f32 {
    30.0
}

fn default_frame_step() -> u32 {
    1
}

fn default_preview_segments() -> usize {
    32
}

fn default_min_handle() -> f32 {
    0.1
}

fn default_max_hull_triangles() -> usize {
    256
}

fn default_aliasing_subtrees() -> Vec<String> {
    vec!["/material/".to_string(), "/vehicle/".to_string()]
}

fn default_aliasing_effects() -> Vec<String> {
    vec![
        "eut2.dif".to_string(),
        "eut2.dif.spec".to_string(),
        "eut2.dif.spec.add.env".to_string(),
    ]
}

/// The full configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub pix: PixSettings,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub prefab: PrefabSettings,
    #[serde(default)]
    pub collision: CollisionSettings,
    #[serde(default)]
    pub materials: MaterialSettings,
}

/// Text format settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixSettings {
    #[serde(default = "default_indent")]
    pub indent: String,
    /// Recount `Global` fields silently instead of rejecting mismatches.
    #[serde(default)]
    pub recount_globals: bool,
}

impl Default for PixSettings {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            recount_globals: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    #[serde(default)]
    pub weld: bool,
    /// Decimal places compared when welding vertices.
    #[serde(default = "default_weld_precision")]
    pub weld_precision: u32,
    #[serde(default = "default_scale")]
    pub import_scale: f32,
    #[serde(default = "default_fps")]
    pub fps: f32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            weld: false,
            weld_precision: default_weld_precision(),
            import_scale: default_scale(),
            fps: default_fps(),
        }
    }
}

/// On-disk model dialect written on export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PimDialectSetting {
    /// Keep whatever was read; compact for new objects.
    #[default]
    Preserve,
    Compact,
    Exchange,
}

/// TOBJ encoding written on export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TobjEncoding {
    #[default]
    Text,
    Binary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub pim_dialect: PimDialectSetting,
    #[serde(default = "default_frame_step")]
    pub frame_step: u32,
    #[serde(default = "default_true")]
    pub copy_external_textures: bool,
    #[serde(default)]
    pub tobj_encoding: TobjEncoding,
    #[serde(default = "default_scale")]
    pub export_scale: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            pim_dialect: PimDialectSetting::default(),
            frame_step: default_frame_step(),
            copy_external_textures: true,
            tobj_encoding: TobjEncoding::default(),
            export_scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Active project root; `~` is expanded.
    #[serde(default)]
    pub project_root: Option<String>,
    #[serde(default = "default_true")]
    pub use_alternative_bases: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            project_root: None,
            use_alternative_bases: true,
        }
    }
}

impl ResolverSettings {
    /// The configured project root with `~` and `$VARS` expanded.
    pub fn expanded_root(&self) -> Option<PathBuf> {
        self.project_root.as_ref().map(|root| {
            let expanded = shellexpand::full(root)
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_else(|_| root.clone());
            PathBuf::from(expanded)
        })
    }
}

/// How control-node lane tables are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneTableMode {
    /// Filled from curve boundary attributes.
    #[default]
    Computed,
    /// All `-1`, as older engine versions expect.
    Legacy,
}

/// How `LeadsToNodes` is filled on curves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadsToMode {
    #[default]
    Zero,
    Computed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefabSettings {
    #[serde(default = "default_preview_segments")]
    pub curve_preview_segments: usize,
    #[serde(default = "default_min_handle")]
    pub min_handle_length: f32,
    #[serde(default)]
    pub lane_tables: LaneTableMode,
    #[serde(default)]
    pub leads_to_nodes: LeadsToMode,
}

impl Default for PrefabSettings {
    fn default() -> Self {
        Self {
            curve_preview_segments: default_preview_segments(),
            min_handle_length: default_min_handle(),
            lane_tables: LaneTableMode::default(),
            leads_to_nodes: LeadsToMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionSettings {
    #[serde(default)]
    pub margin: f32,
    #[serde(default = "default_max_hull_triangles")]
    pub max_hull_triangles: usize,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            margin: 0.0,
            max_hull_triangles: default_max_hull_triangles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSettings {
    /// Project subtrees a base texture must live under for alias import.
    #[serde(default = "default_aliasing_subtrees")]
    pub aliasing_subtrees: Vec<String>,
    /// Effects eligible for alias import.
    #[serde(default = "default_aliasing_effects")]
    pub aliasing_effects: Vec<String>,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            aliasing_subtrees: default_aliasing_subtrees(),
            aliasing_effects: default_aliasing_effects(),
        }
    }
}

impl BridgeConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] on invalid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Serialize to pretty TOML.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
