use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::MatcherKind;

/// Root configuration structure, deserialized from `.license-digger/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

/// Which files are visited and how they are matched.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions (without dot) that are scanned. Compared case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the scanned root, of paths to skip.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub matcher: MatcherKind,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore: Vec::new(),
            matcher: MatcherKind::default(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx", "qml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Files that are expected to have no license header.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlacklistConfig {
    /// Undetected files matching these globs are reported as `MISSING-LICENSE`.
    #[serde(default)]
    pub missing: Vec<String>,
    /// Undetected files matching these globs are reported as `MISSING-LICENSE-GENERATED-FILE`.
    #[serde(default = "default_generated")]
    pub generated: Vec<String>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            missing: Vec::new(),
            generated: default_generated(),
        }
    }
}

fn default_generated() -> Vec<String> {
    ["**/moc_*.cpp", "**/ui_*.h", "**/qrc_*.cpp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Directory replacing the bundled header texts.
    pub path: Option<PathBuf>,
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<root>/.license-digger/config.toml`
/// 3. `~/.config/license-digger/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(root: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = root.join(".license-digger").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-digger")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
}
