//! Layered settings source: process environment over an optional KDL file.

use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::{ConfigError, ConfigResult};

/// A string that must never appear in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Raw key/value settings, keyed by upper-case env-style names.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Snapshot of the process environment. Entries that are not valid
    /// UTF-8 are skipped.
    pub fn from_env() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    fn from_os_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_pairs(pairs.into_iter().filter_map(|(key, value)| {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (Ok(key), Err(_)) => {
                    tracing::warn!(key = %key, "Ignoring non-UTF-8 environment value");
                    None
                }
                (Err(key), _) => {
                    tracing::warn!(key = ?key, "Ignoring non-UTF-8 environment variable");
                    None
                }
            }
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_uppercase(), v.into()))
            .collect();
        Self { values }
    }

    /// Fill keys not already set from a KDL document.
    pub fn merge_kdl(mut self, kdl: &str) -> ConfigResult<Self> {
        let doc: KdlDocument = kdl.parse()?;
        let mut from_file = HashMap::new();
        collect_nodes(&doc, None, &mut from_file)?;
        for (key, value) in from_file {
            self.values.entry(key).or_insert(value);
        }
        Ok(self)
    }

    /// Fill keys not already set from a KDL file on disk.
    pub fn merge_kdl_file(self, path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        self.merge_kdl(&content)
    }

    /// Value for `key`, trimmed; blank values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn require(&self, key: &str) -> ConfigResult<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingField(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_bool(raw).ok_or_else(|| ConfigError::InvalidValue {
                field: key.to_string(),
                message: format!("expected a boolean, got '{}'", raw),
            }),
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> ConfigResult<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                message: format!("expected a non-negative integer, got '{}'", raw),
            }),
        }
    }

    /// Comma-separated list; empty items are skipped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `runner { token-outbound "x" }` becomes `RUNNER_TOKEN_OUTBOUND`.
fn setting_key(prefix: Option<&str>, name: &str) -> String {
    let name = name.replace('-', "_").to_ascii_uppercase();
    match prefix {
        Some(p) => format!("{}_{}", p, name),
        None => name,
    }
}

fn collect_nodes(
    doc: &KdlDocument,
    prefix: Option<&str>,
    out: &mut HashMap<String, String>,
) -> ConfigResult<()> {
    for node in doc.nodes() {
        let key = setting_key(prefix, node.name().value());
        if let Some(children) = node.children() {
            collect_nodes(children, Some(&key), out)?;
            continue;
        }
        if let Some(value) = node_value(node, &key)? {
            out.insert(key, value);
        }
    }
    Ok(())
}

fn node_value(node: &KdlNode, key: &str) -> ConfigResult<Option<String>> {
    let args: Vec<&KdlValue> = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
        .collect();

    if args.is_empty() {
        return Ok(None);
    }

    let rendered: ConfigResult<Vec<String>> = args
        .into_iter()
        .map(|value| render_value(value, key))
        .collect();

    // Several arguments form a list: `runner-allowlist "a" "b"`.
    Ok(Some(rendered?.join(",")))
}

fn render_value(value: &KdlValue, key: &str) -> ConfigResult<String> {
    if let Some(s) = value.as_string() {
        return Ok(s.to_string());
    }
    if let Some(b) = value.as_bool() {
        return Ok(b.to_string());
    }
    if let Some(i) = value.as_integer() {
        return Ok(i.to_string());
    }
    Err(ConfigError::InvalidValue {
        field: key.to_string(),
        message: "expected a string, boolean or integer".to_string(),
    })
}
