//! Error types for `PixBridge`

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where in a PIX file (or scene) something went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Source file, when known.
    pub file: Option<PathBuf>,
    /// 1-based line number, 0 when not applicable.
    pub line: usize,
    /// Slash separated section path, e.g. `Piece/Stream`.
    pub section_path: String,
}

impl Location {
    #[must_use]
    pub fn at_line(line: usize, section_path: impl Into<String>) -> Self {
        Self {
            file: None,
            line,
            section_path: section_path.into(),
        }
    }

    #[must_use]
    pub fn section(section_path: impl Into<String>) -> Self {
        Self::at_line(0, section_path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}", file.display())?;
            if self.line > 0 {
                write!(f, ":{}", self.line)?;
            }
        } else if self.line > 0 {
            write!(f, "line {}", self.line)?;
        } else {
            f.write_str("<input>")?;
        }
        if !self.section_path.is_empty() {
            write!(f, " [{}]", self.section_path)?;
        }
        Ok(())
    }
}

/// The error type for `PixBridge` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// Host filesystem error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== PIX Grammar Errors ====================
    /// Input violates the PIX grammar (brace mismatch, bad string, bad number).
    #[error("malformed PIX at {location}: {message}")]
    Malformed {
        /// Where the problem was found.
        location: Location,
        /// What is wrong.
        message: String,
    },

    /// End of input inside an open section.
    #[error("truncated PIX at {location}: unexpected end of file")]
    Truncated {
        /// The innermost open section.
        location: Location,
    },

    /// Declared counts contradict realized data, or a reference dangles.
    #[error("inconsistent data at {location}: {message}")]
    Inconsistent {
        /// Where the inconsistency lives.
        location: Location,
        /// Description of the mismatch.
        message: String,
    },

    /// Version or dialect not supported.
    #[error("unsupported {what}: {found}")]
    SchemaMismatch {
        /// What was being checked (format version, file type, dialect...).
        what: String,
        /// The value found in the input.
        found: String,
    },

    // ==================== Material Errors ====================
    /// Effect string is not in the shader preset catalog.
    #[error("unknown effect: {effect}")]
    UnknownEffect {
        /// The requested effect.
        effect: String,
    },

    /// Flavor combination is not in the shader preset catalog.
    #[error("unknown flavor combination for {base}: {effect}")]
    UnknownFlavor {
        /// Effect before the toggle.
        base: String,
        /// Effect the toggle would have produced.
        effect: String,
    },

    /// Material alias import refused for this material.
    #[error("material aliasing refused: {reason}")]
    AliasingRefused {
        /// Why the material is not eligible.
        reason: String,
    },

    // ==================== Part / Variant Errors ====================
    /// Part removal rejected because objects still reference it.
    #[error("part '{part}' is still used by {users} object(s)")]
    PartInUse {
        /// The part name.
        part: String,
        /// Number of referencing objects.
        users: usize,
    },

    /// A named part, variant, look or material does not exist.
    #[error("unknown {kind}: {name}")]
    UnknownName {
        /// Kind of entry (part, variant, look, material).
        kind: &'static str,
        /// The requested name.
        name: String,
    },

    // ==================== Prefab Graph Errors ====================
    /// Locators are not connectable prefab locators of the same type.
    #[error("connection type mismatch: {message}")]
    TypeMismatch {
        /// Details.
        message: String,
    },

    /// A connection between the two locators already exists.
    #[error("duplicate connection: {message}")]
    Duplicate {
        /// Details.
        message: String,
    },

    /// A connection endpoint has no free slot left.
    #[error("no free connection slot on locator {locator} ({limit} max)")]
    SlotFull {
        /// Offending locator id.
        locator: u64,
        /// Slot limit for this direction/type.
        limit: usize,
    },

    /// A curve claims a control node that does not exist.
    #[error("curve {curve} references control node {node}, but only {node_count} exist")]
    BoundaryOutOfRange {
        /// Curve index.
        curve: usize,
        /// Referenced node index.
        node: i64,
        /// Number of control nodes present.
        node_count: usize,
    },

    /// Host object identity not known to the core.
    #[error("unknown object id {0}")]
    UnknownObject(u64),

    // ==================== Animation Errors ====================
    /// Animation channels disagree on sample count or total time.
    #[error("channel '{channel}' has {found} {unit}, the animation has {expected}")]
    ChannelLengthMismatch {
        /// Channel (bone) name.
        channel: String,
        /// Value the animation declares.
        expected: usize,
        /// Value the channel realizes.
        found: usize,
        /// `samples`, or `ms` for summed key times.
        unit: &'static str,
    },

    // ==================== Path Errors ====================
    /// Project-relative path finds no file under any base.
    #[error("could not resolve '{path}' under {bases} base(s)")]
    Resolve {
        /// The virtual path.
        path: String,
        /// How many base directories were tried.
        bases: usize,
    },

    // ==================== Configuration ====================
    /// Configuration file could not be parsed or serialized.
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Malformed`] without file information.
    pub(crate) fn malformed(line: usize, section_path: &str, message: impl Into<String>) -> Self {
        Error::Malformed {
            location: Location::at_line(line, section_path),
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::Inconsistent`] keyed by section path.
    pub(crate) fn inconsistent(section_path: &str, message: impl Into<String>) -> Self {
        Error::Inconsistent {
            location: Location::section(section_path),
            message: message.into(),
        }
    }

    /// Attach a source file to location-carrying errors.
    #[must_use]
    pub fn in_file(mut self, path: &Path) -> Self {
        match &mut self {
            Error::Malformed { location, .. }
            | Error::Truncated { location }
            | Error::Inconsistent { location, .. } => {
                if location.file.is_none() {
                    location.file = Some(path.to_path_buf());
                }
            }
            _ => {}
        }
        self
    }

    /// Location of the error, if it carries one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Malformed { location, .. }
            | Error::Truncated { location }
            | Error::Inconsistent { location, .. } => Some(location),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => Error::Io(io),
            None => Error::Io(std::io::Error::other("directory walk loop detected")),
        }
    }
}

/// A consistency problem demoted to a warning during import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the problem was found.
    pub location: Location,
    /// Human readable description, including the fallback taken.
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A specialized Result type for `PixBridge` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_file_attaches_path() {
        let err = Error::malformed(3, "Piece/Stream", "bad token").in_file(Path::new("a.pim"));
        let loc = err.location().unwrap();
        assert_eq!(loc.file.as_deref(), Some(Path::new("a.pim")));
        assert_eq!(err.to_string(), "malformed PIX at a.pim:3 [Piece/Stream]: bad token");
    }

    #[test]
    fn test_in_file_keeps_existing_path() {
        let err = Error::inconsistent("Global", "x")
            .in_file(Path::new("first.pit"))
            .in_file(Path::new("second.pit"));
        assert_eq!(err.location().unwrap().file.as_deref(), Some(Path::new("first.pit")));
    }
}
