//! PIX text parsing
//!
//! Single pass and line oriented; a stack holds the open sections.

use std::fs;
use std::path::Path;

use super::lexer::{Lexer, Token};
use super::section::{DataRow, Item, PixFile, Property, Section, Value};
use crate::error::{Error, Location, Result};

/// Read a PIX file from disk.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read, otherwise any parse error
/// annotated with the file name.
pub fn read_pix<P: AsRef<Path>>(path: P) -> Result<PixFile> {
    let path = path.as_ref();
    tracing::debug!("Reading PIX file {}", path.display());
    let content = fs::read_to_string(path)?;
    parse_pix(&content).map_err(|e| e.in_file(path))
}

/// Parse PIX text.
///
/// # Errors
/// Returns [`Error::Malformed`] on grammar violations and
/// [`Error::Truncated`] when the input ends inside a section.
pub fn parse_pix(content: &str) -> Result<PixFile> {
    let mut file = PixFile::new();
    let mut stack: Vec<Section> = Vec::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        let path = section_path(&stack);

        if line.is_empty() {
            push_item(&mut file, &mut stack, Item::Blank);
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            push_item(&mut file, &mut stack, Item::Comment(comment.trim().to_string()));
            continue;
        }
        if line == "}" {
            let Some(done) = stack.pop() else {
                return Err(Error::malformed(line_no, &path, "unmatched '}'"));
            };
            push_item(&mut file, &mut stack, Item::Section(done));
            continue;
        }
        if let Some(head) = line.strip_suffix('{') {
            let name = head.trim();
            if !is_identifier(name) {
                return Err(Error::malformed(line_no, &path, format!("invalid section name '{name}'")));
            }
            stack.push(Section::new(name));
            continue;
        }

        if stack.is_empty() {
            return Err(Error::malformed(
                line_no,
                &path,
                format!("content outside of any section: '{line}'"),
            ));
        }

        let item = if let Some((key, rest)) = split_property(line) {
            let value = parse_single_value(rest).map_err(|m| Error::malformed(line_no, &path, m))?;
            Item::Property(Property {
                key: key.to_string(),
                value,
            })
        } else {
            let values = parse_row(line).map_err(|m| Error::malformed(line_no, &path, m))?;
            Item::Row(DataRow(values))
        };
        push_item(&mut file, &mut stack, item);
    }

    if !stack.is_empty() {
        return Err(Error::Truncated {
            location: Location::at_line(content.lines().count(), section_path(&stack)),
        });
    }

    // A file always ends with a newline; drop the pseudo-blank it produces.
    while matches!(file.items.last(), Some(Item::Blank)) {
        file.items.pop();
    }
    Ok(file)
}

fn push_item(file: &mut PixFile, stack: &mut [Section], item: Item) {
    match stack.last_mut() {
        Some(open) => open.items.push(item),
        None => file.items.push(item),
    }
}

fn section_path(stack: &[Section]) -> String {
    stack
        .iter()
        .map(|s| s.type_name.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `Key: value` when the line starts with an identifier followed by `:`.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let key = line[..colon].trim_end();
    if is_identifier(key) {
        Some((key, &line[colon + 1..]))
    } else {
        None
    }
}

fn parse_single_value(text: &str) -> std::result::Result<Value, String> {
    let mut lexer = Lexer::new(text);
    let value = next_value(&mut lexer)?.ok_or_else(|| "missing value".to_string())?;
    if !lexer.at_end() {
        return Err(format!("trailing content after value in '{}'", text.trim()));
    }
    Ok(value)
}

fn parse_row(text: &str) -> std::result::Result<Vec<Value>, String> {
    let mut lexer = Lexer::new(text);
    let mut values = Vec::new();
    while let Some(value) = next_value(&mut lexer)? {
        values.push(value);
    }
    Ok(values)
}

fn next_value(lexer: &mut Lexer<'_>) -> std::result::Result<Option<Value>, String> {
    let Some(token) = lexer.next().transpose()? else {
        return Ok(None);
    };
    let value = match token {
        Token::Int(i) => Value::Int(i),
        Token::Float(f) => Value::Float(f),
        Token::Hex(f) => Value::Hex(vec![f]),
        Token::Str(s) => Value::Str(s),
        Token::Word(w) => Value::Token(w),
        Token::Open => parse_tuple(lexer)?,
        Token::Close => return Err("unexpected ')'".to_string()),
    };
    Ok(Some(value))
}

/// Tuple body after `(`; element kinds decide the canonical variant.
fn parse_tuple(lexer: &mut Lexer<'_>) -> std::result::Result<Value, String> {
    let mut tokens = Vec::new();
    loop {
        match lexer.next().transpose()? {
            None => return Err("unterminated tuple".to_string()),
            Some(Token::Close) => break,
            Some(Token::Open) => return Err("nested tuples are not allowed".to_string()),
            Some(token) => tokens.push(token),
        }
    }

    if tokens.iter().all(|t| matches!(t, Token::Int(_))) {
        return Ok(Value::IntVec(
            tokens
                .into_iter()
                .filter_map(|t| if let Token::Int(i) = t { Some(i) } else { None })
                .collect(),
        ));
    }
    if tokens.iter().all(|t| matches!(t, Token::Str(_))) {
        return Ok(Value::StrVec(
            tokens
                .into_iter()
                .filter_map(|t| if let Token::Str(s) = t { Some(s) } else { None })
                .collect(),
        ));
    }

    let has_hex = tokens.iter().any(|t| matches!(t, Token::Hex(_)));
    let mut floats = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Int(i) => floats.push(i as f32),
            Token::Float(f) | Token::Hex(f) => floats.push(f),
            other => return Err(format!("unexpected {other:?} inside numeric tuple")),
        }
    }
    Ok(if has_hex {
        Value::HexRow(floats)
    } else {
        Value::FloatVec(floats)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Header {
    FormatVersion: 5
    Source: "pixbridge"
    Type: "Model"
    Name: "box"
}
# streams follow
Piece {
    Index: 0
    Stream {
        Format: FLOAT3
        Tag: "_POSITION"
        0  ( &3f800000  &00000000  &bf800000 )
    }

    Triangles {
        0  ( 0  2  1 )
    }
}
"#;

    #[test]
    fn test_parse_structure() {
        let file = parse_pix(SAMPLE).unwrap();
        assert_eq!(file.count("Header"), 1);
        assert!(matches!(file.items[1], Item::Comment(ref c) if c == "streams follow"));

        let piece = file.section("Piece").unwrap();
        assert_eq!(piece.req_int("Index").unwrap(), 0);
        let stream = piece.child("Stream").unwrap();
        assert_eq!(stream.prop("Format"), Some(&Value::Token("FLOAT3".into())));
        let row = stream.rows().next().unwrap();
        assert_eq!(row.0[0], Value::Int(0));
        assert_eq!(row.0[1], Value::HexRow(vec![1.0, 0.0, -1.0]));

        // Blank line between Stream and Triangles is kept
        assert!(piece.items.iter().any(|i| matches!(i, Item::Blank)));
        let tri = piece.child("Triangles").unwrap().rows().next().unwrap();
        assert_eq!(tri.0[1], Value::IntVec(vec![0, 2, 1]));
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let file = parse_pix("Thing {\n    FutureKey: ( 1.5 2 )\n}\n").unwrap();
        let thing = file.section("Thing").unwrap();
        assert_eq!(thing.prop("FutureKey"), Some(&Value::FloatVec(vec![1.5, 2.0])));
    }

    #[test]
    fn test_truncated() {
        let err = parse_pix("Header {\n    FormatVersion: 5\n").unwrap_err();
        match err {
            Error::Truncated { location } => assert_eq!(location.section_path, "Header"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_malformed_cases() {
        for bad in [
            "}\n",
            "Header {\n    Name: \"oops\n}\n",
            "Header {\n    Count: 1.2.3\n}\n",
            "Header {\n    Count: 99999999999999999999\n}\n",
            "Header {\n    Pos: ( 1 2\n}\n",
            "Loose: 1\n",
            "Bad Name {\n}\n",
        ] {
            assert!(
                matches!(parse_pix(bad), Err(Error::Malformed { .. })),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn test_string_containing_colon_in_row() {
        let file = parse_pix("Bones {\n    0  \"a:b\"\n}\n").unwrap();
        let row = file.section("Bones").unwrap().rows().next().unwrap();
        assert_eq!(row.0[1], Value::Str("a:b".into()));
    }
}
