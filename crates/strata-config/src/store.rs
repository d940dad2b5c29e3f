//! Hierarchical key/value store behind every [`Config`](crate::Config).
//!
//! Values live in four layers, highest precedence first:
//!
//! ```text
//! override   set()
//! flags      bind_flags()
//! config     read_config() / merge_config()   (files, remote sources)
//! defaults   set_default()
//! ```
//!
//! Keys are case-insensitive and addressed with dotted paths (`"a.b.c"`).
//! Reading a key that holds a map in more than one layer yields the maps
//! deep-merged by precedence.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strata_core::{ConfigFormat, Result, StrataError};

use crate::cast;

#[derive(Debug, Clone, Default)]
pub struct Store {
    defaults: Map<String, Value>,
    config: Map<String, Value>,
    flags: Map<String, Value>,
    overrides: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ───────────────────────────────────────────────

    /// Replace the config layer with one parsed document.
    pub fn read_config(&mut self, bytes: &[u8], format: ConfigFormat) -> Result<()> {
        self.config = insensitivise(format.parse(bytes)?);
        Ok(())
    }

    /// Overlay one parsed document onto the config layer.
    pub fn merge_config(&mut self, bytes: &[u8], format: ConfigFormat) -> Result<()> {
        let incoming = insensitivise(format.parse(bytes)?);
        deep_merge(&mut self.config, incoming);
        Ok(())
    }

    /// Swap in a config layer built elsewhere, returning the old one.
    pub fn replace_config(&mut self, config: Map<String, Value>) -> Map<String, Value> {
        std::mem::replace(&mut self.config, config)
    }

    pub fn into_config(self) -> Map<String, Value> {
        self.config
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        set_path(&mut self.overrides, key, value.into());
    }

    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        set_path(&mut self.defaults, key, value.into());
    }

    pub fn bind_flag(&mut self, key: &str, value: impl Into<Value>) {
        set_path(&mut self.flags, key, value.into());
    }

    // ── Lookup ─────────────────────────────────────────────────

    /// The effective value of `key` across all layers.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = split_key(key)?;
        let mut effective: Option<Value> = None;

        for layer in self.layers() {
            let Some(found) = search(layer, &path) else {
                continue;
            };
            effective = Some(match (effective.take(), found) {
                (Some(Value::Object(mut acc)), Value::Object(upper)) => {
                    deep_merge(&mut acc, upper.clone());
                    Value::Object(acc)
                }
                _ => found.clone(),
            });
        }

        effective
    }

    /// Look `key` up in the config layer only, ignoring overrides and
    /// defaults.
    pub fn config_string(&self, key: &str) -> String {
        split_key(key)
            .and_then(|path| search(&self.config, &path))
            .and_then(cast::to_string)
            .unwrap_or_default()
    }

    pub fn is_set(&self, key: &str) -> bool {
        match split_key(key) {
            Some(path) => self.layers().any(|layer| search(layer, &path).is_some()),
            None => false,
        }
    }

    pub fn get_string(&self, key: &str) -> String {
        self.coerce(key, cast::to_string)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.coerce(key, cast::to_i64)
    }

    pub fn get_uint(&self, key: &str) -> u64 {
        self.coerce(key, cast::to_u64)
    }

    pub fn get_float(&self, key: &str) -> f64 {
        self.coerce(key, cast::to_f64)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.coerce(key, cast::to_bool)
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.coerce(key, cast::to_duration)
    }

    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.coerce(key, cast::to_string_slice)
    }

    pub fn get_string_map(&self, key: &str) -> Map<String, Value> {
        self.coerce(key, cast::to_string_map)
    }

    pub fn get_string_map_string(&self, key: &str) -> Map<String, Value> {
        self.coerce(key, cast::to_string_map_string)
    }

    /// Every layer merged into one tree.
    pub fn all_settings(&self) -> Value {
        let mut merged = Map::new();
        for layer in self.layers() {
            deep_merge(&mut merged, layer.clone());
        }
        Value::Object(merged)
    }

    /// Dotted paths of every leaf value, sorted.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Value::Object(map) = self.all_settings() {
            collect_keys(&map, "", &mut keys);
        }
        keys.sort();
        keys
    }

    // ── Decoding ───────────────────────────────────────────────

    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.all_settings())
            .map_err(|e| StrataError::Unmarshal(e.to_string()))
    }

    /// Decode the subtree at `key`. A missing key decodes from an empty map,
    /// so types with `#[serde(default)]` come back as their defaults.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key).unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(value)
            .map_err(|e| StrataError::Unmarshal(format!("key `{key}`: {e}")))
    }

    fn coerce<T: Default>(&self, key: &str, f: impl Fn(&Value) -> Option<T>) -> T {
        self.get(key).as_ref().and_then(f).unwrap_or_default()
    }

    /// Lowest precedence first.
    fn layers(&self) -> impl Iterator<Item = &Map<String, Value>> {
        [&self.defaults, &self.config, &self.flags, &self.overrides].into_iter()
    }
}

fn split_key(key: &str) -> Option<Vec<String>> {
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    Some(key.split('.').map(str::to_string).collect())
}

/// Resolve `path` in `map`, preferring the longest literal prefix so keys
/// that contain dots themselves stay reachable.
fn search<'a>(map: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    for split in (1..=path.len()).rev() {
        let prefix = path[..split].join(".");
        let Some(value) = map.get(&prefix) else {
            continue;
        };
        if split == path.len() {
            return Some(value);
        }
        if let Value::Object(nested) = value {
            if let Some(found) = search(nested, &path[split..]) {
                return Some(found);
            }
        }
    }
    None
}

fn set_path(map: &mut Map<String, Value>, key: &str, value: Value) {
    let Some(path) = split_key(key) else {
        return;
    };
    let value = match value {
        Value::Object(m) => Value::Object(insensitivise(m)),
        other => other,
    };

    let (last, parents) = match path.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut cursor = map;
    for part in parents {
        let slot = cursor
            .entry(part.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        cursor = next;
    }
    cursor.insert(last.clone(), value);
}

/// Overlay `src` onto `dst`: maps merge recursively, anything else in `src`
/// replaces what `dst` held.
pub(crate) fn deep_merge(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, incoming) in src {
        match (dst.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            (_, incoming) => {
                dst.insert(key, incoming);
            }
        }
    }
}

fn insensitivise(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Object(nested) => Value::Object(insensitivise(nested)),
                other => other,
            };
            (k.to_lowercase(), v)
        })
        .collect()
}

fn collect_keys(map: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => collect_keys(nested, &path, out),
            _ => out.push(path),
        }
    }
}
