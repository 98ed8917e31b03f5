// Option Field Normalization
//
// Legacy admin records store list-like metadata (aliases, wiki section
// options, social links) in several historical shapes: a plain array of
// strings, a JSON-encoded string of any of the shapes, `{"items": [...]}`
// or `{"options": [...]}`. One explicit parser normalizes all of them to
// `Vec<String>` so eligibility predicates never shape-sniff at call sites.

use crate::domain::error::{DomainError, Result};
use serde::Deserialize;
use serde_json::Value;

/// The recognized historical shapes of a list-like metadata field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OptionField {
    List(Vec<OptionEntry>),
    Items { items: Vec<OptionEntry> },
    Options { options: Vec<OptionEntry> },
}

/// A single entry: either a bare string or a labeled object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OptionEntry {
    Text(String),
    Labeled { label: String },
    Named { name: String },
}

impl OptionEntry {
    fn into_string(self) -> String {
        match self {
            OptionEntry::Text(s) => s,
            OptionEntry::Labeled { label } => label,
            OptionEntry::Named { name } => name,
        }
    }
}

/// Normalize a loosely-typed option field into a flat list of strings.
///
/// `null` normalizes to an empty list. A JSON-encoded string is decoded
/// once and re-normalized; anything else unrecognized is a domain error.
pub fn normalize_options(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(raw) => {
            let inner: Value = serde_json::from_str(raw).map_err(|_| {
                DomainError::UnrecognizedOptionShape(format!("not a JSON string: {raw:?}"))
            })?;
            if inner.is_string() {
                // One level of decoding only, no recursive string nesting
                return Err(DomainError::UnrecognizedOptionShape(
                    "doubly-encoded option string".to_string(),
                ));
            }
            normalize_options(&inner)
        }
        _ => {
            let field: OptionField = serde_json::from_value(value.clone())
                .map_err(|_| DomainError::UnrecognizedOptionShape(value.to_string()))?;
            let entries = match field {
                OptionField::List(entries) => entries,
                OptionField::Items { items } => items,
                OptionField::Options { options } => options,
            };
            Ok(entries.into_iter().map(OptionEntry::into_string).collect())
        }
    }
}
