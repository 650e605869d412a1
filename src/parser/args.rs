//! Inline module arguments and flexible field decoding.
//!
//! Several task actions accept either a YAML mapping or an Ansible-style
//! inline string such as `src=motd.j2 dest=/etc/motd mode="0644"`. This module
//! holds the quote-aware tokenizer for the inline form and the serde helpers
//! that accept both shapes.

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

/// Argument structs that may be written inline as `key=value` pairs.
pub trait InlineArgs: DeserializeOwned {
    /// Action name used in error messages.
    const MODULE: &'static str;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Key,
    Value,
}

/// Parse an inline argument string into an ordered mapping.
///
/// Values may be quoted with `'` or `"` to embed whitespace; the quotes are
/// stripped. Returns `None` for an empty string, a standalone key without `=`,
/// or an unterminated quote.
///
/// ```
/// use xconfig::parser::args::parse_module_args;
///
/// let args = parse_module_args(r#"src=a.j2 dest="/etc/my file""#).unwrap();
/// assert_eq!(args["dest"], "/etc/my file");
/// assert!(parse_module_args("src").is_none());
/// ```
pub fn parse_module_args(input: &str) -> Option<IndexMap<String, String>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut result = IndexMap::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut state = State::Key;
    let mut quote: Option<char> = None;

    let mut flush = |key: &mut String, value: &mut String| {
        let k = key.trim();
        if !k.is_empty() {
            result.insert(k.to_string(), value.trim().to_string());
        }
        key.clear();
        value.clear();
    };

    for c in input.chars() {
        match state {
            State::Key => match c {
                '=' => state = State::Value,
                ' ' | '\t' => {
                    if !key.is_empty() {
                        return None;
                    }
                }
                _ => key.push(c),
            },
            State::Value => {
                if let Some(q) = quote {
                    if c == q {
                        quote = None;
                    } else {
                        value.push(c);
                    }
                    continue;
                }
                match c {
                    '\'' | '"' => quote = Some(c),
                    ' ' | '\t' => {
                        flush(&mut key, &mut value);
                        state = State::Key;
                    }
                    _ => value.push(c),
                }
            }
        }
    }

    if quote.is_some() || (state == State::Key && !key.is_empty()) {
        return None;
    }
    if !key.is_empty() || !value.is_empty() {
        flush(&mut key, &mut value);
    }

    Some(result)
}

/// Human-readable name of a YAML node shape.
pub(crate) fn node_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Decode an optional action that is either a mapping or an inline string.
pub(crate) fn inline_or_mapping<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: InlineArgs,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let args = parse_module_args(&s).ok_or_else(|| {
                D::Error::custom(format!("invalid {} arguments: {:?}", T::MODULE, s))
            })?;
            let mapping: Mapping = args
                .into_iter()
                .map(|(k, v)| (Value::String(k), Value::String(v)))
                .collect();
            T::deserialize(Value::Mapping(mapping))
                .map(Some)
                .map_err(D::Error::custom)
        }
        Value::Mapping(_) => T::deserialize(value).map(Some).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!(
            "unsupported {} format: {}",
            T::MODULE,
            node_kind(&other)
        ))),
    }
}

/// Accept booleans as well as `yes/no/true/false/on/off/1/0` strings.
pub(crate) fn bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().map_or(false, |f| f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean, got {:?}", other))),
        },
        other => Err(D::Error::custom(format!(
            "expected a boolean, got {}",
            node_kind(&other)
        ))),
    }
}

/// Accept strings and numbers (e.g. a file mode written as `0644`).
pub(crate) fn string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a scalar, got {}",
            node_kind(&other)
        ))),
    }
}

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
