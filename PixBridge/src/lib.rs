//! # PixBridge
//!
//! A pure-Rust toolkit for the SCS PIX asset family used by Euro Truck
//! Simulator 2 and American Truck Simulator, and for moving those assets
//! in and out of a Z-up 3D host scene.
//!
//! ## Supported Formats
//!
//! - **PIX** - The shared brace-delimited text container
//! - **PIM** - Models, in the compact and the exchange (`.pim.ef`) dialect
//! - **PIT** - Traits: looks, materials and variants
//! - **PIC** - Collision locators and convex hulls
//! - **PIP** - Prefabs: control nodes, navigation curves, map and trigger points
//! - **PIS / PIA** - Skeletons and animations
//! - **TOBJ** - Texture descriptors, text and binary
//!
//! ## Quick Start
//!
//! ### Reading a Model
//!
//! ```no_run
//! use pixbridge::formats::read_pim;
//!
//! let (model, diagnostics) = read_pim("truck.pim", false)?;
//! println!("{} piece(s), {} warning(s)", model.pieces.len(), diagnostics.len());
//! # Ok::<(), pixbridge::Error>(())
//! ```
//!
//! ### Importing a Game Object
//!
//! ```no_run
//! use pixbridge::prelude::*;
//!
//! let mut session = Session::new(BridgeConfig::default(), ShaderPresetCatalog::default());
//! let mut scene = MemoryScene::new();
//! let report = import_game_object(&mut session, "truck.pim".as_ref(), &mut scene)?;
//! export_game_object(&mut session, &scene, report.root, "out/".as_ref())?;
//! # Ok::<(), pixbridge::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `pixbridge` command-line binary

pub mod animation;
pub mod basis;
pub mod bridge;
pub mod config;
pub mod error;
pub mod formats;
pub mod material;
pub mod object;
pub mod prefab;
pub mod resolver;
pub mod scene;

// Re-exports for convenience
pub use error::{Diagnostic, Error, Location, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Diagnostic, Error, Result};

    pub use crate::bridge::{ExportReport, ImportReport, Session, export_game_object, import_game_object};
    pub use crate::config::BridgeConfig;
    pub use crate::formats::{
        FileKind, PiaAnimation, PicModel, PimModel, PipPrefab, PisSkeleton, PitTrait, PixFile, TextureObject,
        WriteOptions,
    };
    pub use crate::material::{LookTable, Material, ShaderPresetCatalog, SubstanceCatalog};
    pub use crate::object::{GameObject, Variant};
    pub use crate::prefab::{LocatorCategory, PrefabLocator, PrefabRegistry};
    pub use crate::resolver::ProjectResolver;
    pub use crate::scene::{MemoryScene, ObjectId, SceneObject, SceneSink, SceneSource};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
