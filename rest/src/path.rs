//! Key paths and nested writes into JSON data

use crate::error::PathError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Deepest path a partial update may address
pub const MAX_PATH_DEPTH: usize = 6;

/// One step of a [`KeyPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object field
    Key(String),
    /// Array position
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Literal path of keys and indexes into nested data
pub type KeyPath = Vec<PathSegment>;

/// Build a [`KeyPath`] from string keys and `usize` indexes
///
/// ```
/// use composable_rest::key_path;
/// use composable_rest::path::PathSegment;
///
/// let path = key_path!["owners", 0_usize, "name"];
/// assert_eq!(path[1], PathSegment::Index(0));
/// ```
#[macro_export]
macro_rules! key_path {
    ($($segment:expr),* $(,)?) => {
        vec![$($crate::path::PathSegment::from($segment)),*]
    };
}

/// Write `value` at `path` inside `data`, returning the new data
///
/// Only the containers along the path are copied; `data` is left as it
/// was. A missing object key is inserted, and an index equal to the array
/// length appends.
///
/// # Errors
///
/// Returns a [`PathError`] when the path is empty or deeper than
/// [`MAX_PATH_DEPTH`], or when a segment does not resolve to a container.
pub fn set_at_path(data: &Value, path: &[PathSegment], value: Value) -> Result<Value, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    if path.len() > MAX_PATH_DEPTH {
        return Err(PathError::TooDeep {
            depth: path.len(),
            max: MAX_PATH_DEPTH,
        });
    }
    write(data, path, 0, value)
}

fn write(node: &Value, path: &[PathSegment], depth: usize, value: Value) -> Result<Value, PathError> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(value);
    };

    match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => {
            let child = match map.get(key) {
                Some(child) => write(child, rest, depth + 1, value)?,
                None if rest.is_empty() => value,
                None => return Err(PathError::NotAContainer { segment: depth + 1 }),
            };
            let mut map = map.clone();
            map.insert(key.clone(), child);
            Ok(Value::Object(map))
        },
        (Value::Array(items), PathSegment::Index(index)) => {
            let len = items.len();
            let mut items = items.clone();
            if *index < len {
                items[*index] = write(&items[*index], rest, depth + 1, value)?;
            } else if *index == len && rest.is_empty() {
                items.push(value);
            } else {
                return Err(PathError::IndexOutOfBounds { index: *index, len });
            }
            Ok(Value::Array(items))
        },
        _ => Err(PathError::NotAContainer { segment: depth }),
    }
}
