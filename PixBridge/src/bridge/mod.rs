//! Import and export of whole game objects
//!
//! A [`Session`] carries the configuration, catalogs and prefab graph.
//! [`import_game_object`] reads a model and its sibling files into a
//! [`SceneSink`](crate::scene::SceneSink); [`export_game_object`] writes a
//! root of a [`SceneSource`](crate::scene::SceneSource) back to disk.

mod collision;
mod convert;
mod export;
mod import;
mod mesh;
mod prefab;
mod session;

pub use export::{ExportReport, export_game_object};
pub use import::{ImportReport, ObjectFiles, import_game_object};
pub use mesh::UV_ALIAS_SEPARATOR;
pub use session::Session;
