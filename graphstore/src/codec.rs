//! Field-level encoding for bulk-import tables.
//!
//! CSV quoting takes care of field delimiters, quotes and line breaks. On top of
//! that every field goes through a small backslash codec so that absence, empty
//! lists and list elements survive a write/read cycle unchanged:
//!
//! | value                | encoded   |
//! |----------------------|-----------|
//! | absent               | `\N`      |
//! | empty list           | `\E`      |
//! | `\` inside text      | `\\`      |
//! | `;` inside a list item | `\;`    |
//!
//! List items are joined with [`ARRAY_DELIMITER`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_DELIMITER: u8 = b',';
pub const ARRAY_DELIMITER: char = ';';
pub const NULL_MARKER: &str = "\\N";
pub const EMPTY_LIST_MARKER: &str = "\\E";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("NUL character cannot be represented in the import format")]
    NulCharacter,

    #[error("non-finite float {0} cannot be represented")]
    NonFinite(String),

    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscape(char),

    #[error("dangling escape character at end of field")]
    TrailingEscape,

    #[error("`{raw}` is not a valid {kind:?} value")]
    InvalidValue { kind: FieldKind, raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    TextList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Float,
        }
    }

    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::TextList,
        }
    }

    /// Header cell as written to the file; list columns carry a `[]` suffix.
    pub fn header(&self) -> String {
        match self.kind {
            FieldKind::TextList => format!("{}[]", self.name),
            _ => self.name.to_string(),
        }
    }
}

/// A typed cell. `None` is the explicit absence marker.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Float(Option<f64>),
    TextList(Option<Vec<String>>),
}

impl FieldValue {
    pub fn text(value: &Option<String>) -> Self {
        FieldValue::Text(value.clone())
    }

    pub fn id(value: impl Into<String>) -> Self {
        FieldValue::Text(Some(value.into()))
    }

    pub fn list(value: &Option<Vec<String>>) -> Self {
        FieldValue::TextList(value.clone())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::TextList(_) => FieldKind::TextList,
        }
    }

    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Integer(v) => v.is_none(),
            FieldValue::Float(v) => v.is_none(),
            FieldValue::TextList(v) => v.is_none(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(Some(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(v) => v.clone().map_or(serde_json::Value::Null, Into::into),
            FieldValue::Integer(v) => v.map_or(serde_json::Value::Null, Into::into),
            FieldValue::Float(v) => v
                .and_then(serde_json::Number::from_f64)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            FieldValue::TextList(v) => v.clone().map_or(serde_json::Value::Null, Into::into),
        }
    }
}

pub fn encode_field(value: &FieldValue) -> Result<String, CodecError> {
    match value {
        FieldValue::Text(None)
        | FieldValue::Integer(None)
        | FieldValue::Float(None)
        | FieldValue::TextList(None) => Ok(NULL_MARKER.to_string()),
        FieldValue::Text(Some(text)) => escape(text, false),
        FieldValue::Integer(Some(n)) => Ok(n.to_string()),
        FieldValue::Float(Some(f)) => {
            if !f.is_finite() {
                return Err(CodecError::NonFinite(f.to_string()));
            }
            Ok(f.to_string())
        }
        FieldValue::TextList(Some(items)) => {
            if items.is_empty() {
                return Ok(EMPTY_LIST_MARKER.to_string());
            }
            let escaped = items
                .iter()
                .map(|item| escape(item, true))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(escaped.join(&ARRAY_DELIMITER.to_string()))
        }
    }
}

pub fn decode_field(kind: FieldKind, raw: &str) -> Result<FieldValue, CodecError> {
    if raw == NULL_MARKER {
        return Ok(match kind {
            FieldKind::Text => FieldValue::Text(None),
            FieldKind::Integer => FieldValue::Integer(None),
            FieldKind::Float => FieldValue::Float(None),
            FieldKind::TextList => FieldValue::TextList(None),
        });
    }

    match kind {
        FieldKind::Text => Ok(FieldValue::Text(Some(unescape(raw)?))),
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(|n| FieldValue::Integer(Some(n)))
            .map_err(|_| invalid(kind, raw)),
        FieldKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| FieldValue::Float(Some(f)))
            .ok_or_else(|| invalid(kind, raw)),
        FieldKind::TextList => {
            if raw == EMPTY_LIST_MARKER {
                return Ok(FieldValue::TextList(Some(Vec::new())));
            }
            Ok(FieldValue::TextList(Some(split_list(raw)?)))
        }
    }
}

fn invalid(kind: FieldKind, raw: &str) -> CodecError {
    CodecError::InvalidValue {
        kind,
        raw: raw.to_string(),
    }
}

fn escape(value: &str, in_list: bool) -> Result<String, CodecError> {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\0' => return Err(CodecError::NulCharacter),
            '\\' => out.push_str("\\\\"),
            ARRAY_DELIMITER if in_list => {
                out.push('\\');
                out.push(ARRAY_DELIMITER);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn unescape(raw: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some(other) => return Err(CodecError::InvalidEscape(other)),
            None => return Err(CodecError::TrailingEscape),
        }
    }
    Ok(out)
}

fn split_list(raw: &str) -> Result<Vec<String>, CodecError> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some(ARRAY_DELIMITER) => current.push(ARRAY_DELIMITER),
                Some(other) => return Err(CodecError::InvalidEscape(other)),
                None => return Err(CodecError::TrailingEscape),
            },
            ARRAY_DELIMITER => items.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    items.push(current);
    Ok(items)
}
