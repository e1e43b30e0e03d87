//! Conversion between JSON trees and the leaf rows stored in SQLite.
//!
//! A value written at `a/b` as `{"c": 1, "d": {"e": [2]}}` becomes the rows
//! `a/b/c → 1` and `a/b/d/e → [2]`. Arrays are leaves. Reading reassembles the
//! object from every row at or below the requested path.

use serde_json::{Map, Value};
use tutr_core::{key::Key, path::RecordPath};

use crate::{Error, Result};

/// One stored leaf: full path string and JSON-encoded value.
pub type Row = (String, String);

// ─── Writing ─────────────────────────────────────────────────────────────────

pub fn flatten(path: &RecordPath, value: &Value) -> Result<Vec<Row>> {
  let mut rows = Vec::new();
  flatten_into(path.to_string(), value, &mut rows)?;
  Ok(rows)
}

fn flatten_into(at: String, value: &Value, rows: &mut Vec<Row>) -> Result<()> {
  match value {
    Value::Null => {}
    Value::Object(map) => {
      for (k, v) in map {
        let key = Key::new(k.as_str())?;
        flatten_into(join(&at, key.as_str()), v, rows)?;
      }
    }
    _ if at.is_empty() => return Err(Error::ScalarAtRoot),
    leaf => rows.push((at, serde_json::to_string(leaf)?)),
  }
  Ok(())
}

fn join(prefix: &str, key: &str) -> String {
  if prefix.is_empty() { key.to_owned() } else { format!("{prefix}/{key}") }
}

/// Drop `null`s and empty objects, so that a value compares equal to what a
/// read would return after writing it.
pub fn normalize(value: Value) -> Option<Value> {
  match value {
    Value::Null => None,
    Value::Object(map) => {
      let pruned: Map<String, Value> = map
        .into_iter()
        .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
        .collect();
      (!pruned.is_empty()).then_some(Value::Object(pruned))
    }
    leaf => Some(leaf),
  }
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Rebuild the value at `path` from its rows.
pub fn assemble(path: &RecordPath, rows: Vec<Row>) -> Result<Option<Value>> {
  let base = path.to_string();
  let mut root: Option<Value> = None;

  for (row_path, json) in rows {
    let leaf: Value = serde_json::from_str(&json)?;
    let corrupt = || Error::CorruptTree(row_path.clone());
    let relative = relative(&base, &row_path).ok_or_else(corrupt)?;

    if relative.is_empty() {
      if root.is_some() {
        return Err(corrupt());
      }
      root = Some(leaf);
      continue;
    }

    let segments: Vec<&str> = relative.split('/').collect();
    let Some((last, parents)) = segments.split_last() else {
      return Err(corrupt());
    };
    let mut node = root.get_or_insert_with(|| Value::Object(Map::new()));
    for segment in parents {
      let Value::Object(map) = node else {
        return Err(corrupt());
      };
      node = map
        .entry((*segment).to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    }
    let Value::Object(map) = node else {
      return Err(corrupt());
    };
    if map.insert((*last).to_owned(), leaf).is_some() {
      return Err(corrupt());
    }
  }

  Ok(root)
}

fn relative<'a>(base: &str, row: &'a str) -> Option<&'a str> {
  if base.is_empty() {
    return Some(row);
  }
  let rest = row.strip_prefix(base)?;
  if rest.is_empty() { Some(rest) } else { rest.strip_prefix('/') }
}
