//! PIX section tree structures

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A property value.
///
/// Typed arrays carry their formatting tag in the variant: `Hex` is the
/// `&` tag, `HexRow` is `&&`, `Ints` is `i` and `IntsRow` is `ii`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f32),
    Str(String),
    /// Bare word such as `FLOAT3`.
    Token(String),
    IntVec(Vec<i64>),
    FloatVec(Vec<f32>),
    StrVec(Vec<String>),
    /// `&`: hex IEEE-754 floats, bare when scalar.
    Hex(Vec<f32>),
    /// `&&`: hex IEEE-754 floats, always parenthesized, wide spacing.
    HexRow(Vec<f32>),
    /// `i`: decimal integers, bare when scalar.
    Ints(Vec<i64>),
    /// `ii`: decimal integers, always parenthesized, wide spacing.
    IntsRow(Vec<i64>),
}

impl Value {
    /// Bit-exact float tuple (`&&`).
    #[must_use]
    pub fn hex(values: &[f32]) -> Self {
        Value::HexRow(values.to_vec())
    }

    /// Bit-exact float scalar (`&`).
    #[must_use]
    pub fn hex_scalar(value: f32) -> Self {
        Value::Hex(vec![value])
    }

    /// Integer tuple (`ii`).
    #[must_use]
    pub fn ints(values: &[i64]) -> Self {
        Value::IntsRow(values.to_vec())
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    #[must_use]
    pub fn token(value: impl Into<String>) -> Self {
        Value::Token(value.into())
    }

    /// Short type label used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Token(_) => "token",
            Value::IntVec(_) | Value::Ints(_) | Value::IntsRow(_) => "int tuple",
            Value::FloatVec(_) | Value::Hex(_) | Value::HexRow(_) => "float tuple",
            Value::StrVec(_) => "string tuple",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Ints(v) | Value::IntsRow(v) | Value::IntVec(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Float scalar; integers and one-element tuples are accepted.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f32),
            Value::Hex(v) | Value::HexRow(v) | Value::FloatVec(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Token(s) => Some(s),
            _ => None,
        }
    }

    /// Float tuple view; integer tuples are widened.
    pub fn as_floats(&self) -> Option<Vec<f32>> {
        match self {
            Value::FloatVec(v) | Value::Hex(v) | Value::HexRow(v) => Some(v.clone()),
            Value::IntVec(v) | Value::Ints(v) | Value::IntsRow(v) => {
                Some(v.iter().map(|&i| i as f32).collect())
            }
            Value::Float(v) => Some(vec![*v]),
            Value::Int(v) => Some(vec![*v as f32]),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Value::IntVec(v) | Value::Ints(v) | Value::IntsRow(v) => Some(v),
            Value::Int(v) => Some(std::slice::from_ref(v)),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<Vec<&str>> {
        match self {
            Value::StrVec(v) => Some(v.iter().map(String::as_str).collect()),
            Value::Str(s) => Some(vec![s.as_str()]),
            Value::IntVec(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }
}

/// One `Key: value` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: Value,
}

/// A raw data line (vertex/index stream rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow(pub Vec<Value>);

/// Ordered content of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Property(Property),
    Section(Section),
    Row(DataRow),
    Comment(String),
    Blank,
}

/// A typed section: `TypeName { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub type_name: String,
    pub items: Vec<Item>,
}

impl Section {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            items: Vec::new(),
        }
    }

    /// Builder-style property append.
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.push_prop(key, value);
        self
    }

    pub fn push_prop(&mut self, key: &str, value: Value) {
        self.items.push(Item::Property(Property {
            key: key.to_string(),
            value,
        }));
    }

    pub fn push_section(&mut self, section: Section) {
        self.items.push(Item::Section(section));
    }

    pub fn push_row(&mut self, values: Vec<Value>) {
        self.items.push(Item::Row(DataRow(values)));
    }

    pub fn push_comment(&mut self, text: impl Into<String>) {
        self.items.push(Item::Comment(text.into()));
    }

    pub fn push_blank(&mut self) {
        self.items.push(Item::Blank);
    }

    /// Replace the first property with `key`, or append it.
    pub fn set_prop(&mut self, key: &str, value: Value) {
        for item in &mut self.items {
            if let Item::Property(prop) = item {
                if prop.key == key {
                    prop.value = value;
                    return;
                }
            }
        }
        self.push_prop(key, value);
    }

    pub fn props(&self) -> impl Iterator<Item = &Property> {
        self.items.iter().filter_map(|item| match item {
            Item::Property(p) => Some(p),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &Section> {
        self.items.iter().filter_map(|item| match item {
            Item::Section(s) => Some(s),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Section> {
        self.children().filter(move |s| s.type_name == type_name)
    }

    pub fn child(&self, type_name: &str) -> Option<&Section> {
        self.children().find(|s| s.type_name == type_name)
    }

    pub fn rows(&self) -> impl Iterator<Item = &DataRow> {
        self.items.iter().filter_map(|item| match item {
            Item::Row(r) => Some(r),
            _ => None,
        })
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props().find(|p| p.key == key).map(|p| &p.value)
    }

    // ------------------------------------------------------------------
    // Required accessors (codec side). Errors point at this section.
    // ------------------------------------------------------------------

    fn missing(&self, key: &str) -> Error {
        Error::inconsistent(&self.type_name, format!("missing property '{key}'"))
    }

    fn wrong(&self, key: &str, expected: &str, found: &Value) -> Error {
        Error::inconsistent(
            &self.type_name,
            format!("property '{key}' should be {expected}, found {}", found.kind()),
        )
    }

    pub fn req(&self, key: &str) -> Result<&Value> {
        self.prop(key).ok_or_else(|| self.missing(key))
    }

    pub fn req_int(&self, key: &str) -> Result<i64> {
        let value = self.req(key)?;
        value.as_int().ok_or_else(|| self.wrong(key, "an integer", value))
    }

    pub fn req_usize(&self, key: &str) -> Result<usize> {
        let value = self.req_int(key)?;
        usize::try_from(value).map_err(|_| {
            Error::inconsistent(&self.type_name, format!("property '{key}' is negative: {value}"))
        })
    }

    pub fn req_float(&self, key: &str) -> Result<f32> {
        let value = self.req(key)?;
        value.as_float().ok_or_else(|| self.wrong(key, "a float", value))
    }

    pub fn req_str(&self, key: &str) -> Result<&str> {
        let value = self.req(key)?;
        value.as_str().ok_or_else(|| self.wrong(key, "a string", value))
    }

    pub fn req_floats<const N: usize>(&self, key: &str) -> Result<[f32; N]> {
        let value = self.req(key)?;
        let floats = value.as_floats().ok_or_else(|| self.wrong(key, "a float tuple", value))?;
        floats.try_into().map_err(|v: Vec<f32>| {
            Error::inconsistent(
                &self.type_name,
                format!("property '{key}' has {} components, expected {N}", v.len()),
            )
        })
    }

    pub fn opt_int(&self, key: &str, default: i64) -> i64 {
        self.prop(key).and_then(Value::as_int).unwrap_or(default)
    }

    pub fn opt_float(&self, key: &str, default: f32) -> f32 {
        self.prop(key).and_then(Value::as_float).unwrap_or(default)
    }

    pub fn opt_str<'a>(&'a self, key: &str) -> Option<&'a str> {
        self.prop(key).and_then(Value::as_str)
    }

    pub fn opt_ints(&self, key: &str) -> Vec<i64> {
        self.prop(key).and_then(Value::as_ints).map(<[i64]>::to_vec).unwrap_or_default()
    }
}

/// A whole PIX file: top-level sections, comments and blank lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixFile {
    pub items: Vec<Item>,
}

impl PixFile {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, section: Section) {
        self.items.push(Item::Section(section));
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.items.iter().filter_map(|item| match item {
            Item::Section(s) => Some(s),
            _ => None,
        })
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Section(s) => Some(s),
            _ => None,
        })
    }

    pub fn sections_named<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Section> {
        self.sections().filter(move |s| s.type_name == type_name)
    }

    pub fn section(&self, type_name: &str) -> Option<&Section> {
        self.sections().find(|s| s.type_name == type_name)
    }

    pub fn section_mut(&mut self, type_name: &str) -> Option<&mut Section> {
        self.sections_mut().find(|s| s.type_name == type_name)
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.sections_named(type_name).count()
    }

    /// Required top-level section.
    pub fn req_section(&self, type_name: &str) -> Result<&Section> {
        self.section(type_name)
            .ok_or_else(|| Error::inconsistent(type_name, "section is missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_prop_replaces_in_place() {
        let mut section = Section::new("Global")
            .with("PieceCount", Value::Int(1))
            .with("PartCount", Value::Int(2));
        section.set_prop("PieceCount", Value::Int(7));
        let keys: Vec<_> = section.props().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["PieceCount", "PartCount"]);
        assert_eq!(section.req_int("PieceCount").unwrap(), 7);
    }

    #[test]
    fn test_required_accessor_errors() {
        let section = Section::new("Part").with("Name", Value::Int(3));
        assert!(matches!(section.req_str("Name"), Err(Error::Inconsistent { .. })));
        assert!(matches!(section.req_int("Missing"), Err(Error::Inconsistent { .. })));
    }

    #[test]
    fn test_fixed_float_tuple() {
        let section = Section::new("Locator").with("Position", Value::hex(&[1.0, 2.0, 3.0]));
        assert_eq!(section.req_floats::<3>("Position").unwrap(), [1.0, 2.0, 3.0]);
        assert!(section.req_floats::<4>("Position").is_err());
    }
}
