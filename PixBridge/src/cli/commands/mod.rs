use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod check;
pub mod execute;
pub mod inspect;
pub mod presets;
pub mod resolve;
pub mod roundtrip;
pub mod tobj;

/// Target encoding for TOBJ conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TobjFormat {
    Text,
    Binary,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a summary of a PIX or TOBJ file
    Inspect {
        /// Source file (.pim, .pim.ef, .pit, .pic, .pip, .pis, .pia, .tobj)
        source: PathBuf,

        /// Dump the raw section tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse every PIX file under a directory and report problems
    Check {
        /// Directory to scan
        dir: PathBuf,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Import a game object and export it again
    Roundtrip {
        /// Model file (.pim or .pim.ef); siblings are picked up by name
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Shader preset library
        #[arg(long)]
        presets: Option<PathBuf>,
    },

    /// Resolve a project-relative path through the base directories
    Resolve {
        /// Virtual path (e.g. "/vehicle/truck/paint.tobj")
        path: String,

        /// Project root (overrides the configured one)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Do not search alternative base directories
        #[arg(long)]
        no_alternative_bases: bool,
    },

    /// List shader presets, or show the schema of one effect
    Presets {
        /// Shader preset library
        library: PathBuf,

        /// Effect string to match (e.g. "eut2.dif.spec")
        #[arg(short, long)]
        effect: Option<String>,
    },

    /// Convert a TOBJ between text and binary encoding
    Tobj {
        /// Source TOBJ
        source: PathBuf,

        /// Output file (defaults to overwriting the source)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target encoding
        #[arg(short, long, value_enum, default_value = "text")]
        to: TobjFormat,
    },
}
