// src/types.rs

//! Shared value types: task names, task outputs and duration strings.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// A single primitive value inside a task [`Output`].
///
/// Outputs are intentionally flat: no arrays, no nested objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl OutputValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OutputValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OutputValue::Integer(i) => Some(*i as f64),
            OutputValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OutputValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OutputValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Bool(b) => write!(f, "{b}"),
            OutputValue::Integer(i) => write!(f, "{i}"),
            OutputValue::Float(x) => write!(f, "{x}"),
            OutputValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for OutputValue {
    fn from(v: bool) -> Self {
        OutputValue::Bool(v)
    }
}

impl From<i64> for OutputValue {
    fn from(v: i64) -> Self {
        OutputValue::Integer(v)
    }
}

impl From<i32> for OutputValue {
    fn from(v: i32) -> Self {
        OutputValue::Integer(v.into())
    }
}

impl From<u32> for OutputValue {
    fn from(v: u32) -> Self {
        OutputValue::Integer(v.into())
    }
}

impl From<f64> for OutputValue {
    fn from(v: f64) -> Self {
        OutputValue::Float(v)
    }
}

impl From<&str> for OutputValue {
    fn from(v: &str) -> Self {
        OutputValue::String(v.to_string())
    }
}

impl From<String> for OutputValue {
    fn from(v: String) -> Self {
        OutputValue::String(v)
    }
}

/// Output produced by a task action: a flat string-keyed map.
///
/// `BTreeMap` keeps keys sorted, so `serde_json` serialization is canonical.
pub type Output = BTreeMap<String, OutputValue>;

/// Build an [`Output`] from key/value pairs.
///
/// ```
/// use cachedag::types::output;
/// let out = output([("address", "0xabc".into()), ("block", 12.into())]);
/// assert_eq!(out["block"].as_i64(), Some(12));
/// ```
pub fn output<I, K>(pairs: I) -> Output
where
    I: IntoIterator<Item = (K, OutputValue)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Canonical serialization of an optional output, used for value comparison.
pub fn canonical(output: Option<&Output>) -> String {
    // Serializing a BTreeMap of primitives cannot fail.
    serde_json::to_string(&output).unwrap_or_default()
}

/// Compare two optional outputs by value (canonical serialization).
pub fn outputs_equal(a: Option<&Output>, b: Option<&Output>) -> bool {
    canonical(a) == canonical(b)
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
