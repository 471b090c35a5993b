//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Generation filters, limits and search budgets
//! - Which student plan to use and which terms are active
//! - Where the catalog snapshot lives
//!
//! Configuration is stored at `~/.config/courseplan/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::filter::GenerationOptions;
use crate::generator::{GenerationRequest, VariantBoard, DEFAULT_MAX_PINNED};

/// Schedule generation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub include_closed_sessions: bool,
    #[serde(default)]
    pub include_courses_requiring_codes: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// 0 disables the node budget.
    #[serde(default = "default_node_budget")]
    pub node_budget: u64,
    /// Wall-clock budget in milliseconds; 0 means none.
    #[serde(default)]
    pub time_budget_ms: u64,
    #[serde(default = "default_code_penalty")]
    pub code_penalty: i64,
}

/// Plan (selection) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "default_student")]
    pub student: String,
    /// Empty means every term is active.
    #[serde(default)]
    pub active_terms: Vec<String>,
    #[serde(default = "default_max_pinned")]
    pub max_pinned_variants: usize,
}

/// Catalog snapshot location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Defaults to `catalog.json` in the data directory.
    #[serde(default)]
    pub path: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/courseplan/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_limit() -> usize {
    crate::generator::DEFAULT_LIMIT
}
fn default_node_budget() -> u64 {
    crate::generator::DEFAULT_NODE_BUDGET
}
fn default_code_penalty() -> i64 {
    crate::generator::DEFAULT_CODE_PENALTY
}
fn default_student() -> String {
    "local".into()
}
fn default_max_pinned() -> usize {
    DEFAULT_MAX_PINNED
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            include_closed_sessions: false,
            include_courses_requiring_codes: false,
            limit: default_limit(),
            node_budget: default_node_budget(),
            time_budget_ms: 0,
            code_penalty: default_code_penalty(),
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            student: default_student(),
            active_terms: Vec::new(),
            max_pinned_variants: default_max_pinned(),
        }
    }
}

impl GenerationConfig {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            include_closed_sessions: self.include_closed_sessions,
            include_courses_requiring_codes: self.include_courses_requiring_codes,
        }
    }

    /// Apply these defaults to a request.
    pub fn apply(&self, request: GenerationRequest) -> GenerationRequest {
        request
            .with_options(self.options())
            .with_limit(self.limit)
            .with_node_budget((self.node_budget > 0).then_some(self.node_budget))
            .with_time_budget(
                (self.time_budget_ms > 0).then(|| Duration::from_millis(self.time_budget_ms)),
            )
            .with_code_penalty(self.code_penalty)
    }
}

impl PlanConfig {
    pub fn active_term_set(&self) -> Option<BTreeSet<String>> {
        (!self.active_terms.is_empty()).then(|| self.active_terms.iter().cloned().collect())
    }

    /// An empty board holding at most `max_pinned_variants` pins.
    pub fn variant_board(&self) -> VariantBoard {
        VariantBoard::new(self.max_pinned_variants)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Array(_) => {
                    // Accept either JSON ("[\"a\",\"b\"]") or a comma list ("a,b").
                    match serde_json::from_str(value) {
                        Ok(parsed @ serde_json::Value::Array(_)) => parsed,
                        _ => serde_json::Value::Array(
                            value
                                .split(',')
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(|s| serde_json::Value::String(s.to_string()))
                                .collect(),
                        ),
                    }
                }
                serde_json::Value::Object(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `config.toml` in the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Same as [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// Same as [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Every leaf key with its value, in dotted form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Catalog file, resolved against the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn catalog_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(data_dir()?.join("catalog.json")),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}
