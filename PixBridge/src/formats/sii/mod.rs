//! SII unit libraries
//!
//! Definition libraries (`.sii`), material alias files (`.mat`) and the
//! substance database share one brace grammar:
//!
//! ```text
//! SiiNunit
//! {
//! game_substance : .metal
//! {
//!     name: "metal"
//!     friction[]: 0.5
//! }
//! @include "more.sui"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Location, Result};

/// A value inside a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum SiiValue {
    Str(String),
    Number(f64),
    /// Bare word (`true`, `.unit.name`, `&hex`, ...).
    Word(String),
    Tuple(Vec<SiiValue>),
}

impl SiiValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SiiValue::Str(s) | SiiValue::Word(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SiiValue::Number(n) => Some(*n as f32),
            SiiValue::Word(w) if w.starts_with('&') => {
                u32::from_str_radix(&w[1..], 16).ok().map(f32::from_bits)
            }
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<Vec<f32>> {
        match self {
            SiiValue::Tuple(items) => items.iter().map(SiiValue::as_f32).collect(),
            other => other.as_f32().map(|f| vec![f]),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SiiValue::Word(w) if w == "true" => Some(true),
            SiiValue::Word(w) if w == "false" => Some(false),
            SiiValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }
}

/// One `class : name { ... }` unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SiiUnit {
    pub class: String,
    pub name: String,
    /// Attributes in file order; `key[]` entries accumulate into one list.
    pub attributes: IndexMap<String, Vec<SiiValue>>,
}

impl SiiUnit {
    pub fn get(&self, key: &str) -> Option<&SiiValue> {
        self.attributes.get(key).and_then(|v| v.first())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SiiValue::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[SiiValue] {
        self.attributes.get(key).map_or(&[], Vec::as_slice)
    }
}

/// Units merged from one or more files.
#[derive(Debug, Clone, Default)]
pub struct SiiLibrary {
    pub units: Vec<SiiUnit>,
    pub sources: Vec<PathBuf>,
}

impl SiiLibrary {
    /// Read one file, following `@include` directives.
    ///
    /// # Errors
    /// IO errors and [`Error::Malformed`] on grammar violations.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut library = Self::default();
        library.load_into(path, 0)?;
        Ok(library)
    }

    /// Read several files; a later unit with an already known name replaces
    /// the earlier one in place.
    ///
    /// # Errors
    /// See [`SiiLibrary::read`].
    pub fn merge<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = Self::default();
        for path in paths {
            let next = Self::read(path)?;
            merged.absorb(next);
        }
        tracing::debug!(
            "Merged {} unit(s) from {} file(s)",
            merged.units.len(),
            merged.sources.len()
        );
        Ok(merged)
    }

    /// Merge `other` into `self` with replace-by-name semantics.
    pub fn absorb(&mut self, other: SiiLibrary) {
        for unit in other.units {
            if let Some(existing) = self.units.iter_mut().find(|u| u.name == unit.name) {
                *existing = unit;
            } else {
                self.units.push(unit);
            }
        }
        self.sources.extend(other.sources);
    }

    fn load_into(&mut self, path: &Path, depth: usize) -> Result<()> {
        if depth > 16 {
            return Err(Error::Malformed {
                location: Location {
                    file: Some(path.to_path_buf()),
                    ..Location::default()
                },
                message: "@include nesting too deep".to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let parsed = parse_sii(&content).map_err(|e| e.in_file(path))?;
        self.sources.push(path.to_path_buf());
        for entry in parsed {
            match entry {
                Entry::Unit(unit) => self.units.push(unit),
                Entry::Include(rel) => {
                    let base = path.parent().unwrap_or_else(|| Path::new("."));
                    self.load_into(&base.join(rel.trim_start_matches('/')), depth + 1)?;
                }
            }
        }
        Ok(())
    }

    pub fn units_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a SiiUnit> {
        self.units.iter().filter(move |u| u.class == class)
    }

    pub fn unit(&self, name: &str) -> Option<&SiiUnit> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Top-level entries of one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Unit(SiiUnit),
    Include(String),
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Str(String),
    Number(f64),
    Colon,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Comma,
}

fn tokenize(content: &str) -> Result<Vec<(usize, Tok)>> {
    let mut tokens = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let mut chars = line.char_indices().peekable();
        while let Some(&(start, c)) = chars.peek() {
            match c {
                _ if c.is_whitespace() => {
                    chars.next();
                }
                '#' => break,
                '/' if line[start..].starts_with("//") => break,
                ':' => {
                    chars.next();
                    tokens.push((line_no, Tok::Colon));
                }
                '{' => {
                    chars.next();
                    tokens.push((line_no, Tok::OpenBrace));
                }
                '}' => {
                    chars.next();
                    tokens.push((line_no, Tok::CloseBrace));
                }
                '(' => {
                    chars.next();
                    tokens.push((line_no, Tok::OpenParen));
                }
                ')' => {
                    chars.next();
                    tokens.push((line_no, Tok::CloseParen));
                }
                ',' => {
                    chars.next();
                    tokens.push((line_no, Tok::Comma));
                }
                '"' => {
                    chars.next();
                    let mut text = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => {
                                if let Some((_, escaped)) = chars.next() {
                                    text.push(escaped);
                                }
                            }
                            _ => text.push(c),
                        }
                    }
                    if !closed {
                        return Err(Error::malformed(line_no, "", "unterminated string"));
                    }
                    tokens.push((line_no, Tok::Str(text)));
                }
                _ => {
                    let mut end = start;
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_whitespace() || ":{}(),\"".contains(c) {
                            break;
                        }
                        end = i + c.len_utf8();
                        chars.next();
                    }
                    let word = &line[start..end];
                    match word.parse::<f64>() {
                        Ok(n) if !word.starts_with('.') || word.len() > 1 && word[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                            tokens.push((line_no, Tok::Number(n)));
                        }
                        _ => tokens.push((line_no, Tok::Word(word.to_string()))),
                    }
                }
            }
        }
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
}

impl Parser {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(l, _)| *l)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: &Tok, context: &str) -> Result<()> {
        let line = self.line();
        match self.bump() {
            Some(ref t) if t == want => Ok(()),
            Some(t) => Err(Error::malformed(line, context, format!("expected {want:?}, found {t:?}"))),
            None => Err(Error::Truncated {
                location: Location::at_line(line, context),
            }),
        }
    }

    fn name(&mut self, context: &str) -> Result<String> {
        let line = self.line();
        match self.bump() {
            Some(Tok::Word(w) | Tok::Str(w)) => Ok(w),
            Some(t) => Err(Error::malformed(line, context, format!("expected a name, found {t:?}"))),
            None => Err(Error::Truncated {
                location: Location::at_line(line, context),
            }),
        }
    }

    fn value(&mut self, context: &str) -> Result<SiiValue> {
        let line = self.line();
        match self.bump() {
            Some(Tok::Str(s)) => Ok(SiiValue::Str(s)),
            Some(Tok::Number(n)) => Ok(SiiValue::Number(n)),
            Some(Tok::Word(w)) => Ok(SiiValue::Word(w)),
            Some(open @ (Tok::OpenParen | Tok::OpenBrace)) => {
                let close = if open == Tok::OpenParen { Tok::CloseParen } else { Tok::CloseBrace };
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some(t) if *t == close => {
                            self.bump();
                            break;
                        }
                        Some(Tok::Comma) => {
                            self.bump();
                        }
                        Some(_) => items.push(self.value(context)?),
                        None => {
                            return Err(Error::Truncated {
                                location: Location::at_line(line, context),
                            });
                        }
                    }
                }
                Ok(SiiValue::Tuple(items))
            }
            Some(t) => Err(Error::malformed(line, context, format!("unexpected {t:?}"))),
            None => Err(Error::Truncated {
                location: Location::at_line(line, context),
            }),
        }
    }

    fn unit(&mut self, class: String) -> Result<SiiUnit> {
        self.expect(&Tok::Colon, &class)?;
        let name = self.name(&class)?;
        let context = format!("{class}:{name}");
        self.expect(&Tok::OpenBrace, &context)?;

        let mut attributes: IndexMap<String, Vec<SiiValue>> = IndexMap::new();
        loop {
            match self.peek() {
                Some(Tok::CloseBrace) => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    let key = self.name(&context)?;
                    self.expect(&Tok::Colon, &context)?;
                    let value = self.value(&context)?;
                    let key = key.strip_suffix("[]").map_or(key.clone(), str::to_string);
                    attributes.entry(key).or_default().push(value);
                }
                None => {
                    return Err(Error::Truncated {
                        location: Location::at_line(self.line(), context),
                    });
                }
            }
        }
        Ok(SiiUnit {
            class,
            name,
            attributes,
        })
    }
}

/// Parse SII text into units and include directives.
///
/// # Errors
/// [`Error::Malformed`] or [`Error::Truncated`].
pub fn parse_sii(content: &str) -> Result<Vec<Entry>> {
    let mut parser = Parser {
        tokens: tokenize(content)?,
        pos: 0,
    };
    let mut entries = Vec::new();
    let mut wrapped = false;

    if matches!(parser.peek(), Some(Tok::Word(w)) if w == "SiiNunit") {
        parser.bump();
        parser.expect(&Tok::OpenBrace, "SiiNunit")?;
        wrapped = true;
    }

    loop {
        let line = parser.line();
        match parser.bump() {
            None if wrapped => {
                return Err(Error::Truncated {
                    location: Location::at_line(line, "SiiNunit"),
                });
            }
            None => break,
            Some(Tok::CloseBrace) if wrapped => break,
            Some(Tok::Word(w)) if w == "@include" => {
                let target = parser.name("@include")?;
                entries.push(Entry::Include(target));
            }
            Some(Tok::Word(class)) => entries.push(Entry::Unit(parser.unit(class)?)),
            Some(t) => return Err(Error::malformed(line, "", format!("unexpected {t:?}"))),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"SiiNunit
{
# comment
game_substance : .metal
{
    name: "metal"
    friction[]: 0.5
    friction[]: 0.75
    tint: (1.0, 0.5, &3f800000)
}
sign_model : sign.stop { model_desc: "/model/sign/stop.pmd" }  // trailing
}
"#;

    #[test]
    fn test_parse_units() {
        let entries = parse_sii(LIBRARY).unwrap();
        assert_eq!(entries.len(), 2);
        let Entry::Unit(ref unit) = entries[0] else { panic!("expected unit") };
        assert_eq!(unit.class, "game_substance");
        assert_eq!(unit.name, ".metal");
        assert_eq!(unit.get_str("name"), Some("metal"));
        assert_eq!(unit.get_all("friction").len(), 2);
        assert_eq!(unit.get("tint").unwrap().as_floats().unwrap(), vec![1.0, 0.5, 1.0]);
    }

    #[test]
    fn test_mat_file_grammar() {
        let entries = parse_sii("material : \"eut2.dif\" {\n texture : \"a.tobj\"\n diffuse : { 1.0 , 0.5 , 0.25 }\n}\n").unwrap();
        let Entry::Unit(ref unit) = entries[0] else { panic!("expected unit") };
        assert_eq!(unit.name, "eut2.dif");
        assert_eq!(unit.get("diffuse").unwrap().as_floats().unwrap(), vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_truncated_unit() {
        assert!(matches!(
            parse_sii("SiiNunit {\n a : b {\n k: 1\n"),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_merge_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("sign.sii");
        let b = dir.path().join("sign.dlc_north.sii");
        std::fs::write(&a, "SiiNunit {\nsign : s.one { v: 1 }\nsign : s.two { v: 2 }\n}\n").unwrap();
        std::fs::write(&b, "SiiNunit {\nsign : s.two { v: 20 }\nsign : s.three { v: 3 }\n}\n").unwrap();

        let lib = SiiLibrary::merge(&[a, b]).unwrap();
        let names: Vec<_> = lib.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["s.one", "s.two", "s.three"]);
        assert_eq!(lib.unit("s.two").unwrap().get("v"), Some(&SiiValue::Number(20.0)));
    }

    #[test]
    fn test_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra.sui"), "sign : s.inc { v: 9 }\n").unwrap();
        let main = dir.path().join("main.sii");
        std::fs::write(&main, "SiiNunit {\n@include \"extra.sui\"\n}\n").unwrap();
        let lib = SiiLibrary::read(&main).unwrap();
        assert_eq!(lib.units.len(), 1);
        assert_eq!(lib.sources.len(), 2);
    }
}
