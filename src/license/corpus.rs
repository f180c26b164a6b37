use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use crate::matcher::skip::prune;
use crate::models::{Classification, SpdxExpression};

/// Text registered for `UNKNOWN-LICENSE` so that every expression key owns at least
/// one variant; it is never reported as a detection.
pub const UNKNOWN_STUB_TEXT: &str =
    "THIS IS A STUB HEADER FOR UNKNOWN LICENSES, IT SHALL NEVER MATCH";

/// Directory inside a corpus directory holding full license texts.
pub const LICENSE_FILES_DIR: &str = "LICENSES";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("header text {index} of {expression} is empty once whitespace and comment characters are removed")]
    EmptyVariant { expression: String, index: usize },

    #[error("{0} has no header texts")]
    NoVariants(String),

    #[error("{0} is a reserved placeholder and cannot carry header texts")]
    ReservedKey(String),

    #[error("placeholder {placeholder} used inside compound expression {expression}")]
    SentinelInCompound { expression: String, placeholder: String },
}

/// Known license header texts, keyed by SPDX expression.
///
/// Variants of one expression are stored in descending lexicographic order so that a
/// variant extending another one (e.g. by a trailing period) is tried first by
/// matchers that stop at the first alternative.
#[derive(Debug, Clone)]
pub struct LicenseCorpus {
    headers: BTreeMap<SpdxExpression, Vec<String>>,
    license_files: BTreeMap<String, PathBuf>,
}

impl LicenseCorpus {
    pub fn new<I, K>(headers: I, license_files: BTreeMap<String, PathBuf>) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        let mut registry: BTreeMap<SpdxExpression, Vec<String>> = BTreeMap::new();

        for (key, variants) in headers {
            let key: String = key.into();
            validate_key(&key)?;
            if variants.is_empty() {
                return Err(CorpusError::NoVariants(key));
            }
            if let Some(index) = variants.iter().position(|v| prune(v).is_empty()) {
                return Err(CorpusError::EmptyVariant { expression: key, index });
            }
            registry
                .entry(SpdxExpression::new(key))
                .or_default()
                .extend(variants);
        }

        for variants in registry.values_mut() {
            variants.sort_by(|a, b| b.cmp(a));
            variants.dedup();
        }

        registry.insert(
            SpdxExpression::new(Classification::UNKNOWN_KEY),
            vec![UNKNOWN_STUB_TEXT.to_string()],
        );

        Ok(Self {
            headers: registry,
            license_files,
        })
    }

    /// Load a corpus directory: one sub-directory per expression holding one file per
    /// header variant, plus an optional `LICENSES/<identifier>.txt` tree.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut headers: Vec<(String, Vec<String>)> = Vec::new();

        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read corpus directory {}", dir.display()))?
            .collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == LICENSE_FILES_DIR {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                warn!(path = %entry.path().display(), "unexpected non-directory in corpus");
                continue;
            }

            let mut variants = Vec::new();
            let mut files: Vec<_> = std::fs::read_dir(entry.path())?
                .collect::<std::io::Result<_>>()?;
            files.sort_by_key(|f| f.file_name());
            for file in files {
                if !file.file_type()?.is_file() {
                    continue;
                }
                let text = std::fs::read_to_string(file.path())
                    .with_context(|| format!("Failed to read header text {}", file.path().display()))?;
                variants.push(text);
            }
            headers.push((name, variants));
        }

        let license_files = load_license_files(&dir.join(LICENSE_FILES_DIR))?;
        let corpus = Self::new(headers, license_files)
            .with_context(|| format!("Invalid corpus in {}", dir.display()))?;
        debug!(
            expressions = corpus.headers.len(),
            license_files = corpus.license_files.len(),
            "loaded corpus from {}",
            dir.display()
        );
        Ok(corpus)
    }

    /// Every registered expression, including the unknown-license stub.
    pub fn expressions(&self) -> impl Iterator<Item = &SpdxExpression> {
        self.headers.keys()
    }

    /// Expressions a matcher should look for: everything but the unknown-license stub.
    pub fn detectable(&self) -> impl Iterator<Item = &SpdxExpression> {
        self.headers
            .keys()
            .filter(|e| e.as_str() != Classification::UNKNOWN_KEY)
    }

    pub fn contains(&self, expression: &SpdxExpression) -> bool {
        self.headers.contains_key(expression)
    }

    /// Header variants of `expression`, longest-first order; empty if unknown.
    pub fn header_texts(&self, expression: &SpdxExpression) -> &[String] {
        self.headers
            .get(expression)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All plain license and exception identifiers used by real expressions.
    pub fn identifiers(&self) -> BTreeSet<String> {
        self.headers
            .keys()
            .filter(|e| !Classification::is_sentinel_key(e.as_str()))
            .flat_map(SpdxExpression::identifiers)
            .collect()
    }

    pub fn license_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.license_files
    }

    /// Identifiers for which no full license text is available.
    pub fn missing_license_files(&self) -> Vec<String> {
        self.identifiers()
            .into_iter()
            .filter(|id| !self.license_files.contains_key(id))
            .collect()
    }
}

fn validate_key(key: &str) -> Result<(), CorpusError> {
    if Classification::is_sentinel_key(key) {
        if key == Classification::TO_CLARIFY_KEY {
            return Ok(());
        }
        return Err(CorpusError::ReservedKey(key.to_string()));
    }
    if let Some(placeholder) = key
        .split('_')
        .find(|token| Classification::is_sentinel_key(token))
    {
        return Err(CorpusError::SentinelInCompound {
            expression: key.to_string(),
            placeholder: placeholder.to_string(),
        });
    }
    Ok(())
}

fn load_license_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read license files in {}", dir.display()))?
    {
        let path = entry?.path();
        if let Some(stem) = path.file_stem() {
            files.insert(stem.to_string_lossy().to_string(), path);
        }
    }
    Ok(files)
}
