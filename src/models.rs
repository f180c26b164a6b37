use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connective tokens used inside expression keys (`GPL-2.0-only_OR_GPL-3.0-only`).
pub const OR_CONNECTIVE: &str = "_OR_";
pub const AND_CONNECTIVE: &str = "_AND_";
pub const WITH_CONNECTIVE: &str = "_WITH_";

/// Prefix of the canonical single-line license marker.
pub const SPDX_MARKER_PREFIX: &str = "SPDX-License-Identifier: ";

/// Whether `next` may directly follow the expression of a marker line, so that
/// `SPDX-License-Identifier: MIT` is not read out of `MIT-0`.
pub fn ends_marker(next: char) -> bool {
    next.is_whitespace() || matches!(next, '*' | '/')
}

/// A license identifier or compound statement, keyed with `_`-joined connectives.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpdxExpression(String);

impl SpdxExpression {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The expression as it is written after `SPDX-License-Identifier:`.
    pub fn render(&self) -> String {
        self.0.replace('_', " ")
    }

    /// The canonical marker line for this expression, without trailing newline.
    pub fn marker(&self) -> String {
        format!("{}{}", SPDX_MARKER_PREFIX, self.render())
    }

    pub fn is_compound(&self) -> bool {
        self.0.contains(OR_CONNECTIVE)
            || self.0.contains(AND_CONNECTIVE)
            || self.0.contains(WITH_CONNECTIVE)
    }

    /// Plain identifiers this expression is also satisfied by: the `OR` branches
    /// with any `WITH <exception>` suffix removed.
    ///
    /// `LGPL-2.1-only_OR_LGPL-3.0-only` → `{LGPL-2.1-only, LGPL-3.0-only}`,
    /// `LGPL-2.1-only_WITH_Qt-Commercial-exception-1.0` → `{LGPL-2.1-only}`.
    pub fn or_closure(&self) -> BTreeSet<SpdxExpression> {
        self.0
            .split(OR_CONNECTIVE)
            .map(|branch| branch.split(WITH_CONNECTIVE).next().unwrap_or(branch))
            .filter(|id| !id.is_empty())
            .map(SpdxExpression::new)
            .collect()
    }

    /// Every license and exception identifier named by this expression.
    pub fn identifiers(&self) -> Vec<String> {
        self.0
            .split('_')
            .filter(|token| !matches!(*token, "OR" | "AND" | "WITH" | ""))
            .map(str::to_string)
            .collect()
    }
}

impl std::fmt::Display for SpdxExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpdxExpression {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Final license verdict for one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    Identified(SpdxExpression),
    Unknown,
    Missing,
    MissingGenerated,
    Ambiguous,
    ToClarify,
}

impl Classification {
    pub const UNKNOWN_KEY: &'static str = "UNKNOWN-LICENSE";
    pub const MISSING_KEY: &'static str = "MISSING-LICENSE";
    pub const MISSING_GENERATED_KEY: &'static str = "MISSING-LICENSE-GENERATED-FILE";
    pub const AMBIGUOUS_KEY: &'static str = "AMBIGUOUS-LICENSE";
    pub const TO_CLARIFY_KEY: &'static str = "TO-CLARIFY";

    pub fn from_key(key: &str) -> Self {
        match key {
            Self::UNKNOWN_KEY => Classification::Unknown,
            Self::MISSING_KEY => Classification::Missing,
            Self::MISSING_GENERATED_KEY => Classification::MissingGenerated,
            Self::AMBIGUOUS_KEY => Classification::Ambiguous,
            Self::TO_CLARIFY_KEY => Classification::ToClarify,
            other => Classification::Identified(SpdxExpression::new(other)),
        }
    }

    pub fn as_key(&self) -> &str {
        match self {
            Classification::Identified(expr) => expr.as_str(),
            Classification::Unknown => Self::UNKNOWN_KEY,
            Classification::Missing => Self::MISSING_KEY,
            Classification::MissingGenerated => Self::MISSING_GENERATED_KEY,
            Classification::Ambiguous => Self::AMBIGUOUS_KEY,
            Classification::ToClarify => Self::TO_CLARIFY_KEY,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Classification::Identified(_))
    }

    /// Whether a key names one of the reserved placeholder outcomes.
    pub fn is_sentinel_key(key: &str) -> bool {
        Self::from_key(key).is_sentinel()
    }

    pub fn expression(&self) -> Option<&SpdxExpression> {
        match self {
            Classification::Identified(expr) => Some(expr),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

impl Serialize for Classification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_key())
    }
}

impl<'de> Deserialize<'de> for Classification {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Classification::from_key(&key))
    }
}

/// Byte range of a matched header in the original file content (`end` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One expression found in a file, before pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDetection {
    pub expression: SpdxExpression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Escaped regular expressions tolerant of `*`/space decoration at line breaks
    Regex,
    /// Exact matching that ignores whitespace and comment characters everywhere
    #[default]
    Skip,
}

impl std::fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatcherKind::Regex => write!(f, "regex"),
            MatcherKind::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub classification: Classification,
    /// Expressions that survived pruning when the file is ambiguous.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<SpdxExpression>,
    #[serde(default)]
    pub rewritten: bool,
}

/// A file the scan had to skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub matcher: MatcherKind,
    pub files: Vec<FileResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    pub fn detected(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.classification != Classification::Unknown)
            .count()
    }

    pub fn undetected(&self) -> usize {
        self.files.len() - self.detected()
    }

    pub fn ambiguous(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.classification == Classification::Ambiguous)
            .count()
    }

    pub fn rewritten(&self) -> usize {
        self.files.iter().filter(|f| f.rewritten).count()
    }

    /// Number of files per classification, most frequent first.
    pub fn counts(&self) -> Vec<(Classification, usize)> {
        let mut counts: std::collections::HashMap<&Classification, usize> =
            std::collections::HashMap::new();
        for file in &self.files {
            *counts.entry(&file.classification).or_insert(0) += 1;
        }
        let mut pairs: Vec<(Classification, usize)> =
            counts.into_iter().map(|(c, n)| (c.clone(), n)).collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_key().cmp(b.0.as_key())));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_connectives() {
        let expr = SpdxExpression::new("GPL-2.0-only_OR_GPL-3.0-only_OR_LicenseRef-KDE-Accepted-GPL");
        assert_eq!(
            expr.render(),
            "GPL-2.0-only OR GPL-3.0-only OR LicenseRef-KDE-Accepted-GPL"
        );
        assert_eq!(
            SpdxExpression::new("LGPL-2.0-or-later").marker(),
            "SPDX-License-Identifier: LGPL-2.0-or-later"
        );
    }

    #[test]
    fn test_or_closure_strips_exceptions() {
        let expr = SpdxExpression::new("LGPL-2.1-only_WITH_Qt-Commercial-exception-1.0_OR_LGPL-3.0-only");
        let closure: Vec<String> = expr.or_closure().iter().map(|e| e.to_string()).collect();
        assert_eq!(closure, vec!["LGPL-2.1-only", "LGPL-3.0-only"]);

        let plain = SpdxExpression::new("MIT");
        assert!(!plain.is_compound());
        assert_eq!(plain.or_closure().len(), 1);
    }

    #[test]
    fn test_identifiers_drop_connectives() {
        let expr = SpdxExpression::new("LGPL-2.1-only_WITH_Qt-Commercial-exception-1.0");
        assert_eq!(
            expr.identifiers(),
            vec!["LGPL-2.1-only", "Qt-Commercial-exception-1.0"]
        );
    }

    #[test]
    fn test_classification_keys() {
        assert_eq!(Classification::from_key("UNKNOWN-LICENSE"), Classification::Unknown);
        assert_eq!(Classification::from_key("TO-CLARIFY"), Classification::ToClarify);
        assert!(Classification::is_sentinel_key("MISSING-LICENSE-GENERATED-FILE"));
        assert!(!Classification::is_sentinel_key("MIT"));
        assert_eq!(Classification::Ambiguous.to_string(), "AMBIGUOUS-LICENSE");

        let json = serde_json::to_string(&Classification::from_key("MIT")).unwrap();
        assert_eq!(json, "\"MIT\"");
    }

    #[test]
    fn test_marker_terminators() {
        for c in [' ', '\n', '\r', '\t', '*', '/'] {
            assert!(ends_marker(c), "{c:?}");
        }
        for c in ['-', '0', 'a', '.', '+'] {
            assert!(!ends_marker(c), "{c:?}");
        }
    }

    #[test]
    fn test_span_overlap() {
        let a = Span { start: 0, end: 10 };
        assert!(a.overlaps(&Span { start: 9, end: 12 }));
        assert!(!a.overlaps(&Span { start: 10, end: 12 }));
    }
}
