use anyhow::{Context as AnyhowContext, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

/// Keys that are always rebound to the real global, function or not.
pub const ESCAPE_TO_RAW_WINDOW_KEYS: &[&str] = &[
    "getComputedStyle",
    "visualViewport",
    "matchMedia",
    "DOMParser",
    "caches",
];

const ESCAPE_TO_RAW_WINDOW_PATTERNS: &[&str] = &["^webkit", "Observer$"];

lazy_static! {
    static ref DEFAULT_ESCAPE_PATTERNS: Vec<Regex> =
        compile_patterns(ESCAPE_TO_RAW_WINDOW_PATTERNS.iter().map(|s| s.to_string()));
}

fn compile_patterns(sources: impl IntoIterator<Item = String>) -> Vec<Regex> {
    sources
        .into_iter()
        .filter_map(|source| match Regex::new(&source) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!(
                    target = "sandbox",
                    pattern = %source,
                    error = %err,
                    "skipping invalid escape pattern"
                );
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscapeRegistryConfig {
    #[serde(default)]
    pub escape_keys: Vec<String>,
    #[serde(default)]
    pub escape_patterns: Vec<String>,
}

/// The two static key lists the property patcher reads: exact keys that
/// are always rebound to the real global, and pattern keys that are
/// rebound when a live property name matches. Hosts may override both.
pub struct EscapeRegistry {
    keys: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for EscapeRegistry {
    fn default() -> Self {
        Self {
            keys: ESCAPE_TO_RAW_WINDOW_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
            patterns: DEFAULT_ESCAPE_PATTERNS.clone(),
        }
    }
}

impl EscapeRegistry {
    /// Build a registry from host configuration. Invalid patterns are
    /// logged and skipped; a bad pattern must never abort sandbox setup.
    pub fn from_config(config: EscapeRegistryConfig) -> Self {
        Self {
            keys: config.escape_keys,
            patterns: compile_patterns(config.escape_patterns),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EscapeRegistryConfig =
            serde_json::from_str(json).context("failed to parse escape registry config")?;
        Ok(Self::from_config(config))
    }

    pub fn exact_keys(&self) -> &[String] {
        &self.keys
    }

    pub fn matches_pattern(&self, key: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(key))
    }
}
