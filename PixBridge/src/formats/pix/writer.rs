//! PIX text writing
//!
//! Float emission follows the value's tag, never inference: hex variants
//! write the IEEE-754 bit pattern directly.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::section::{Item, PixFile, Section, Value};
use crate::error::Result;

/// Serializer options.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Indent string per depth level.
    pub indent: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn from_config(config: &crate::config::BridgeConfig) -> Self {
        Self {
            indent: config.pix.indent.clone(),
        }
    }
}

/// Write a PIX file to disk.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_pix<P: AsRef<Path>>(file: &PixFile, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::debug!("Writing PIX file {}", path.display());
    fs::write(path, serialize_pix(file, options))?;
    Ok(())
}

/// Serialize a PIX file to text.
#[must_use]
pub fn serialize_pix(file: &PixFile, options: &WriteOptions) -> String {
    let mut out = String::new();
    for item in &file.items {
        write_item(&mut out, item, 0, options);
    }
    out
}

/// Format a float as `&` + 8 hex digits of its bit pattern.
#[must_use]
pub fn hex_float(value: f32) -> String {
    format!("&{:08x}", value.to_bits())
}

/// Shortest round-trip decimal, always with a decimal point. NaN and the
/// infinities have no decimal form and are written as hex floats.
#[must_use]
pub fn decimal_float(value: f32) -> String {
    if !value.is_finite() {
        return hex_float(value);
    }
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn tuple<T>(values: &[T], sep: &str, fmt: impl Fn(&T) -> String) -> String {
    if values.is_empty() {
        return "( )".to_string();
    }
    let body = values.iter().map(fmt).collect::<Vec<_>>().join(sep);
    format!("( {body} )")
}

/// Textual form of a value.
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => decimal_float(*f),
        Value::Str(s) => quote(s),
        Value::Token(t) => t.clone(),
        Value::IntVec(v) => tuple(v, " ", ToString::to_string),
        Value::FloatVec(v) => tuple(v, " ", |f| decimal_float(*f)),
        Value::StrVec(v) => tuple(v, " ", |s| quote(s)),
        Value::Hex(v) if v.len() == 1 => hex_float(v[0]),
        Value::Hex(v) => tuple(v, " ", |f| hex_float(*f)),
        Value::HexRow(v) => tuple(v, "  ", |f| hex_float(*f)),
        Value::Ints(v) if v.len() == 1 => v[0].to_string(),
        Value::Ints(v) => tuple(v, " ", ToString::to_string),
        Value::IntsRow(v) => tuple(v, "  ", ToString::to_string),
    }
}

fn indent(out: &mut String, depth: usize, options: &WriteOptions) {
    for _ in 0..depth {
        out.push_str(&options.indent);
    }
}

fn write_item(out: &mut String, item: &Item, depth: usize, options: &WriteOptions) {
    match item {
        Item::Blank => out.push('\n'),
        Item::Comment(text) => {
            indent(out, depth, options);
            if text.is_empty() {
                out.push_str("#\n");
            } else {
                let _ = writeln!(out, "# {text}");
            }
        }
        Item::Property(prop) => {
            indent(out, depth, options);
            let _ = writeln!(out, "{}: {}", prop.key, format_value(&prop.value));
        }
        Item::Row(row) => {
            indent(out, depth, options);
            let line = row.0.iter().map(format_value).collect::<Vec<_>>().join("  ");
            out.push_str(&line);
            out.push('\n');
        }
        Item::Section(section) => write_section(out, section, depth, options),
    }
}

fn write_section(out: &mut String, section: &Section, depth: usize, options: &WriteOptions) {
    indent(out, depth, options);
    let _ = writeln!(out, "{} {{", section.type_name);
    for item in &section.items {
        write_item(out, item, depth + 1, options);
    }
    indent(out, depth, options);
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pix::parse_pix;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hex_float_bits() {
        assert_eq!(hex_float(1.0), "&3f800000");
        assert_eq!(hex_float(-0.0), "&80000000");
        assert_eq!(hex_float(f32::from_bits(0x0000_0001)), "&00000001");
    }

    #[test]
    fn test_decimal_always_has_point() {
        assert_eq!(decimal_float(1.0), "1.0");
        assert_eq!(decimal_float(0.25), "0.25");
        assert_eq!(decimal_float(-3.0), "-3.0");
    }

    #[test]
    fn test_non_finite_decimal_reads_back_as_number() {
        let odd = [f32::NAN, f32::INFINITY, f32::NEG_INFINITY];
        let mut file = PixFile::new();
        file.push(
            Section::new("Data")
                .with("Scalar", Value::Float(f32::INFINITY))
                .with("Tuple", Value::FloatVec(odd.to_vec())),
        );

        let parsed = parse_pix(&serialize_pix(&file, &WriteOptions::default())).unwrap();
        let data = parsed.section("Data").unwrap();
        assert_eq!(data.prop("Scalar").unwrap().as_float(), Some(f32::INFINITY));
        let bits: Vec<u32> = data.prop("Tuple").unwrap().as_floats().unwrap().iter().map(|f| f.to_bits()).collect();
        assert_eq!(bits, odd.map(f32::to_bits));
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(format_value(&Value::Hex(vec![1.0])), "&3f800000");
        assert_eq!(format_value(&Value::HexRow(vec![1.0, 0.0])), "( &3f800000  &00000000 )");
        assert_eq!(format_value(&Value::Ints(vec![4])), "4");
        assert_eq!(format_value(&Value::IntsRow(vec![0, 2, 1])), "( 0  2  1 )");
        assert_eq!(format_value(&Value::IntVec(vec![])), "( )");
        assert_eq!(format_value(&Value::Str("a\"b".into())), "\"a\\\"b\"");
    }

    #[test]
    fn test_float_bits_survive_roundtrip() {
        let tricky = [0.1f32, 1.0 / 3.0, f32::MIN_POSITIVE, -0.0, 1e-40, 123_456.79];
        let mut section = Section::new("Data");
        section.push_prop("Values", Value::hex(&tricky));
        section.push_prop("Decimal", Value::FloatVec(tricky.to_vec()));
        let mut file = PixFile::new();
        file.push(section);

        let text = serialize_pix(&file, &WriteOptions::default());
        let parsed = parse_pix(&text).unwrap();
        let data = parsed.section("Data").unwrap();
        for key in ["Values", "Decimal"] {
            let values = data.prop(key).unwrap().as_floats().unwrap();
            let bits: Vec<u32> = values.iter().map(|f| f.to_bits()).collect();
            let expected: Vec<u32> = tricky.iter().map(|f| f.to_bits()).collect();
            assert_eq!(bits, expected, "{key}");
        }
    }

    #[test]
    fn test_parse_serialize_parse_is_stable() {
        let text = "Header {\n    FormatVersion: 5\n    Name: \"x\"\n}\n\n# note\nPiece {\n    Scale: ( 1.0 2.5 )\n    Stream {\n        Tag: \"_UV0\"\n        0  ( &3f800000  &00000000 )\n        1  ( &00000000  &3f800000 )\n    }\n}\n";
        let first = parse_pix(text).unwrap();
        let emitted = serialize_pix(&first, &WriteOptions::default());
        assert_eq!(emitted, text);
        assert_eq!(parse_pix(&emitted).unwrap(), first);
    }

    #[test]
    fn test_custom_indent() {
        let mut file = PixFile::new();
        file.push(Section::new("A").with("K", Value::Int(1)));
        let text = serialize_pix(&file, &WriteOptions { indent: "\t".into() });
        assert_eq!(text, "A {\n\tK: 1\n}\n");
    }
}
