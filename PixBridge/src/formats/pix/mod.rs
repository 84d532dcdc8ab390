//! PIX text container: section tree, reader and writer
//!
//! Every `.pim`, `.pit`, `.pic`, `.pip`, `.pis` and `.pia` file is a
//! sequence of `TypeName { ... }` sections holding `Key: value`
//! properties, nested sections and raw data rows.

mod header;
mod lexer;
mod reader;
mod section;
mod writer;

pub use header::{FileKind, Header, SOURCE_TAG, global_section, validate_globals};
pub use reader::{parse_pix, read_pix};
pub use section::{DataRow, Item, PixFile, Property, Section, Value};
pub use writer::{WriteOptions, decimal_float, format_value, hex_float, serialize_pix, write_pix};

impl PixFile {
    /// Read and parse a file from disk.
    ///
    /// # Errors
    /// See [`read_pix`].
    pub fn read<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        read_pix(path)
    }

    /// Parse text.
    ///
    /// # Errors
    /// See [`parse_pix`].
    pub fn parse(content: &str) -> crate::Result<Self> {
        parse_pix(content)
    }

    /// Serialize to text.
    #[must_use]
    pub fn to_pix_string(&self, options: &WriteOptions) -> String {
        serialize_pix(self, options)
    }

    /// Serialize and write to disk.
    ///
    /// # Errors
    /// See [`write_pix`].
    pub fn write<P: AsRef<std::path::Path>>(&self, path: P, options: &WriteOptions) -> crate::Result<()> {
        write_pix(self, path, options)
    }
}

/// Row helper: `index  value`.
pub(crate) fn indexed_row(index: usize, value: Value) -> Vec<Value> {
    vec![Value::Int(index as i64), value]
}

/// Read the float tuples of an indexed data section (`0  ( ... )` rows),
/// checking each has `width` components.
pub(crate) fn read_float_rows(section: &Section, width: usize) -> crate::Result<Vec<Vec<f32>>> {
    section
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let floats = row
                .0
                .last()
                .and_then(Value::as_floats)
                .filter(|f| f.len() == width)
                .ok_or_else(|| {
                    crate::Error::inconsistent(
                        &section.type_name,
                        format!("row {i} is not a {width}-component float tuple"),
                    )
                })?;
            Ok(floats)
        })
        .collect()
}

/// Read the integer tuples of an indexed data section.
pub(crate) fn read_int_rows(section: &Section, width: usize) -> crate::Result<Vec<Vec<i64>>> {
    section
        .rows()
        .enumerate()
        .map(|(i, row)| {
            row.0
                .last()
                .and_then(Value::as_ints)
                .filter(|v| v.len() == width)
                .map(<[i64]>::to_vec)
                .ok_or_else(|| {
                    crate::Error::inconsistent(
                        &section.type_name,
                        format!("row {i} is not a {width}-component integer tuple"),
                    )
                })
        })
        .collect()
}
