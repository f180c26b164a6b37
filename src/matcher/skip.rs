//! Exact matching that treats whitespace and comment decoration as elastic.
//!
//! Both text and pattern are pruned of skip characters (space, tab, newline, `/`,
//! `-`, `*`, `#`), the pruned pattern is located with Knuth–Morris–Pratt, and the
//! match is mapped back to original coordinates through a table of how many skip
//! characters were removed before each pruned position.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::cache::MatcherCache;
use super::{HeaderMatcher, MatchError};
use crate::license::LicenseCorpus;
use crate::models::{ends_marker, Classification, MatcherKind, RawDetection, SpdxExpression, Span};

pub fn is_skip_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '/' | '-' | '*' | '#')
}

/// `text` without any skip characters.
pub fn prune(text: &str) -> String {
    text.chars().filter(|c| !is_skip_char(*c)).collect()
}

/// A text with skip characters removed, plus the bookkeeping to map pruned
/// positions back into the original.
#[derive(Debug, Clone)]
pub struct PrunedText {
    chars: Vec<char>,
    /// Number of skip characters removed before each pruned position.
    skipped: Vec<usize>,
    /// Byte offset of each pruned character in the original text.
    byte_offsets: Vec<usize>,
    /// Original character right after each pruned character, skip characters included.
    following: Vec<Option<char>>,
    original_len: usize,
}

impl PrunedText {
    pub fn new(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut skipped = Vec::with_capacity(text.len());
        let mut byte_offsets = Vec::with_capacity(text.len());
        let mut following: Vec<Option<char>> = Vec::with_capacity(text.len());
        let mut removed = 0;

        for (offset, c) in text.char_indices() {
            if let Some(last) = following.last_mut() {
                if last.is_none() {
                    *last = Some(c);
                }
            }
            if is_skip_char(c) {
                removed += 1;
                continue;
            }
            chars.push(c);
            skipped.push(removed);
            byte_offsets.push(offset);
            following.push(None);
        }

        Self {
            chars,
            skipped,
            byte_offsets,
            following,
            original_len: text.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Original character span `(start, end_inclusive)` of pruned positions `[i, j]`.
    fn char_span(&self, i: usize, j: usize) -> (usize, usize) {
        (i + self.skipped[i], j + self.skipped[j])
    }

    /// Whether the original text ends or continues with a marker terminator after
    /// pruned position `j`.
    fn ends_token_at(&self, j: usize) -> bool {
        self.following[j].map_or(true, ends_marker)
    }

    /// Original byte span of pruned positions `[i, j]`, end exclusive.
    fn byte_span(&self, i: usize, j: usize) -> Span {
        let end = self
            .byte_offsets
            .get(j)
            .map(|offset| offset + self.chars[j].len_utf8())
            .unwrap_or(self.original_len);
        Span {
            start: self.byte_offsets[i],
            end,
        }
    }
}

/// KMP failure function: `prefix[q]` is the length of the longest proper prefix of
/// `pattern[..=q]` that is also a suffix of it.
pub fn compute_kmp_prefix(pattern: &[char]) -> Vec<usize> {
    let mut prefix = vec![0; pattern.len()];
    let mut k = 0;
    for q in 1..pattern.len() {
        while k > 0 && pattern[k] != pattern[q] {
            k = prefix[k - 1];
        }
        if pattern[k] == pattern[q] {
            k += 1;
        }
        prefix[q] = k;
    }
    prefix
}

/// The approximate string matcher. Failure tables are memoized per pruned pattern,
/// since the same corpus texts are searched in every file.
#[derive(Debug, Default)]
pub struct SkipMatcher {
    prefix_cache: MatcherCache<String, Vec<usize>>,
}

impl SkipMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// First occurrence of `pattern` in `text`, as `(start, end_inclusive)` character
    /// offsets into `text`.
    pub fn find_match(&self, text: &str, pattern: &str) -> Option<(usize, usize)> {
        let pruned = PrunedText::new(text);
        self.find_pruned(&pruned, &prune(pattern), 0)
            .map(|(i, j)| pruned.char_span(i, j))
    }

    /// First hit among `patterns`; patterns that prune to the same text are searched once.
    pub fn find_match_any<S: AsRef<str>>(&self, text: &str, patterns: &[S]) -> Option<(usize, usize)> {
        let pruned = PrunedText::new(text);
        let mut seen = HashSet::new();
        patterns
            .iter()
            .map(|p| prune(p.as_ref()))
            .filter(|p| seen.insert(p.clone()))
            .find_map(|p| self.find_pruned(&pruned, &p, 0))
            .map(|(i, j)| pruned.char_span(i, j))
    }

    /// Byte span of the first hit among already pruned `patterns`.
    pub fn find_span(&self, text: &PrunedText, patterns: &[String]) -> Option<Span> {
        patterns
            .iter()
            .find_map(|p| self.find_pruned(text, p, 0))
            .map(|(i, j)| text.byte_span(i, j))
    }

    /// Byte span of the first hit of an already pruned `pattern` that is followed by
    /// a marker terminator or the end of the text.
    pub fn find_token_span(&self, text: &PrunedText, pattern: &str) -> Option<Span> {
        let mut from = 0;
        while let Some((i, j)) = self.find_pruned(text, pattern, from) {
            if text.ends_token_at(j) {
                return Some(text.byte_span(i, j));
            }
            from = i + 1;
        }
        None
    }

    /// KMP scan over the pruned text from pruned position `from`; returns pruned
    /// positions `[i, j]`. An empty pattern never matches.
    fn find_pruned(&self, text: &PrunedText, pattern: &str, from: usize) -> Option<(usize, usize)> {
        let chars: Vec<char> = pattern.chars().collect();
        if chars.is_empty() || chars.len() > text.len().saturating_sub(from) {
            return None;
        }
        let prefix = self.prefix_table(pattern);
        let pattern = chars;

        let mut q = 0;
        for (i, &c) in text.chars.iter().enumerate().skip(from) {
            while q > 0 && pattern[q] != c {
                q = prefix[q - 1];
            }
            if pattern[q] == c {
                q += 1;
            }
            if q == pattern.len() {
                return Some((i + 1 - q, i));
            }
        }
        None
    }

    fn prefix_table(&self, pattern: &str) -> Arc<Vec<usize>> {
        self.prefix_cache.get_or_build(pattern, || {
            let chars: Vec<char> = pattern.chars().collect();
            compute_kmp_prefix(&chars)
        })
    }

    pub fn cached_tables(&self) -> usize {
        self.prefix_cache.len()
    }

    pub fn clear(&self) {
        self.prefix_cache.clear();
    }
}

/// Pruned search patterns of one expression.
#[derive(Debug, Default)]
pub struct SkipPatterns {
    /// Deduplicated header variants, in corpus order.
    pub headers: Vec<String>,
    /// The `SPDX-License-Identifier` line; absent for placeholder keys.
    pub marker: Option<String>,
}

/// [`HeaderMatcher`] backed by [`SkipMatcher`]. Header variants are tried first,
/// then the marker line.
pub struct SkipHeaderMatcher {
    corpus: Arc<LicenseCorpus>,
    matcher: SkipMatcher,
    patterns: MatcherCache<SpdxExpression, SkipPatterns>,
}

impl SkipHeaderMatcher {
    pub fn new(corpus: Arc<LicenseCorpus>) -> Self {
        Self {
            corpus,
            matcher: SkipMatcher::new(),
            patterns: MatcherCache::new(),
        }
    }

    /// Pruned patterns for `expression`, built on first use.
    pub fn patterns_for(&self, expression: &SpdxExpression) -> Result<Arc<SkipPatterns>, MatchError> {
        if !self.corpus.contains(expression) {
            return Err(MatchError::UnknownExpression(expression.clone()));
        }
        Ok(self.patterns.get_or_build(expression, || {
            let mut seen = HashSet::new();
            let headers: Vec<String> = self
                .corpus
                .header_texts(expression)
                .iter()
                .map(|text| prune(text))
                .filter(|p| !p.is_empty() && seen.insert(p.clone()))
                .collect();
            let marker = (!Classification::is_sentinel_key(expression.as_str()))
                .then(|| prune(&expression.marker()));
            debug!(%expression, headers = headers.len(), "built skip patterns");
            SkipPatterns { headers, marker }
        }))
    }

    fn find_in(&self, text: &PrunedText, expression: &SpdxExpression) -> Result<Option<Span>, MatchError> {
        let patterns = self.patterns_for(expression)?;
        Ok(self.matcher.find_span(text, &patterns.headers).or_else(|| {
            patterns
                .marker
                .as_deref()
                .and_then(|marker| self.matcher.find_token_span(text, marker))
        }))
    }
}

impl HeaderMatcher for SkipHeaderMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Skip
    }

    fn corpus(&self) -> &LicenseCorpus {
        &self.corpus
    }

    fn find(&self, text: &str, expression: &SpdxExpression) -> Result<Option<Span>, MatchError> {
        self.find_in(&PrunedText::new(text), expression)
    }

    fn detect(&self, text: &str) -> Vec<RawDetection> {
        let pruned = PrunedText::new(text);
        let mut detections = Vec::new();
        for expression in self.corpus.detectable() {
            match self.find_in(&pruned, expression) {
                Ok(Some(span)) => detections.push(RawDetection {
                    expression: expression.clone(),
                    span,
                }),
                Ok(None) => {}
                Err(err) => tracing::error!("{err}"),
            }
        }
        detections
    }

    fn warm_up(&self) {
        for expression in self.corpus.expressions() {
            if let Ok(patterns) = self.patterns_for(expression) {
                for pattern in patterns.headers.iter().chain(&patterns.marker) {
                    self.matcher.prefix_table(pattern);
                }
            }
        }
    }

    fn reload(&mut self, corpus: Arc<LicenseCorpus>) {
        self.corpus = corpus;
        self.patterns.clear();
        self.matcher.clear();
    }
}
