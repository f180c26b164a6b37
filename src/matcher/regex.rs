use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::cache::MatcherCache;
use super::{HeaderMatcher, MatchError};
use crate::license::LicenseCorpus;
use crate::models::{Classification, MatcherKind, SpdxExpression, Span};

/// Stray `*` and space padding around a header line.
const DECORATION: &str = r"[\* ]*";

/// One or more line breaks, each with decoration allowed on either side.
const LINE_BREAK: &str = r"[\* ]*(?:\r?\n[\* ]*)+";

/// Group holding the marker line itself, without its terminator.
const MARKER_GROUP: &str = "marker";

/// What may follow a marker line's expression; mirrors [`crate::models::ends_marker`].
const MARKER_END: &str = r"(?:[\s*/]|$)";

/// Regex for one header variant: the escaped text with every line break relaxed to
/// accept comment decoration, and leading/trailing padding allowed.
pub fn header_pattern(header: &str) -> String {
    let lines: Vec<String> = header
        .trim_end()
        .lines()
        .map(|line| regex::escape(line.trim_end_matches('\r')))
        .collect();
    format!("{DECORATION}{}{DECORATION}", lines.join(LINE_BREAK))
}

/// Alternation over all variants of `expression`, in corpus order, plus the literal
/// `SPDX-License-Identifier` marker for real expressions.
pub fn expression_pattern(corpus: &LicenseCorpus, expression: &SpdxExpression) -> String {
    let mut alternatives: Vec<String> = corpus
        .header_texts(expression)
        .iter()
        .map(|text| format!("(?:{})", header_pattern(text)))
        .collect();
    if !Classification::is_sentinel_key(expression.as_str()) {
        alternatives.push(format!(
            "(?:(?P<{MARKER_GROUP}>{}){MARKER_END})",
            regex::escape(&expression.marker())
        ));
    }
    alternatives.join("|")
}

/// [`HeaderMatcher`] backed by one compiled regex per expression.
pub struct RegexMatcher {
    corpus: Arc<LicenseCorpus>,
    cache: MatcherCache<SpdxExpression, Regex>,
}

impl RegexMatcher {
    pub fn new(corpus: Arc<LicenseCorpus>) -> Self {
        Self {
            corpus,
            cache: MatcherCache::new(),
        }
    }

    /// The compiled detector for `expression`, built on first use.
    pub fn regex_for(&self, expression: &SpdxExpression) -> Result<Arc<Regex>, MatchError> {
        if !self.corpus.contains(expression) {
            return Err(MatchError::UnknownExpression(expression.clone()));
        }
        self.cache.get_or_try_build(expression, || {
            let pattern = expression_pattern(&self.corpus, expression);
            debug!(%expression, bytes = pattern.len(), "compiling header regex");
            Regex::new(&pattern).map_err(|source| MatchError::Pattern {
                expression: expression.clone(),
                source,
            })
        })
    }
}

impl HeaderMatcher for RegexMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Regex
    }

    fn corpus(&self) -> &LicenseCorpus {
        &self.corpus
    }

    fn find(&self, text: &str, expression: &SpdxExpression) -> Result<Option<Span>, MatchError> {
        let regex = self.regex_for(expression)?;
        let Some(caps) = regex.captures(text) else {
            return Ok(None);
        };
        let found = caps.name(MARKER_GROUP).or_else(|| caps.get(0));
        Ok(found.map(|m| Span {
            start: m.start(),
            end: m.end(),
        }))
    }

    fn warm_up(&self) {
        for expression in self.corpus.expressions() {
            if let Err(err) = self.regex_for(expression) {
                tracing::error!("{err}");
            }
        }
    }

    fn reload(&mut self, corpus: Arc<LicenseCorpus>) {
        self.corpus = corpus;
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn corpus(entries: &[(&str, &[&str])]) -> Arc<LicenseCorpus> {
        Arc::new(
            LicenseCorpus::new(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect())),
                BTreeMap::new(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_header_pattern_relaxes_line_breaks() {
        let pattern = header_pattern("first (line)\nsecond line.\n");
        assert_eq!(
            pattern,
            r"[\* ]*first \(line\)[\* ]*(?:\r?\n[\* ]*)+second line\.[\* ]*"
        );
        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match("/*\n * first (line)\n * second line.\n */"));
        assert!(re.is_match("/*\n * first (line)  \n *\n *\n * second line.\n */"));
        assert!(!re.is_match("// first (line)\n// second line."));
        assert!(!re.is_match("/**\n ** first (line)   *\n *\tsecond line."));
    }

    #[test]
    fn test_longer_variant_tried_first() {
        let c = corpus(&[("MIT", &["granted", "granted."])]);
        let matcher = RegexMatcher::new(c);
        let text = "/* granted. */";
        let span = matcher.find(text, &"MIT".into()).unwrap().unwrap();
        assert_eq!(&text[span.start..span.end], "* granted. *");
    }

    #[test]
    fn test_marker_only_for_real_expressions() {
        let c = corpus(&[("MIT", &["granted"]), ("TO-CLARIFY", &["review me"])]);
        assert!(expression_pattern(&c, &"MIT".into()).contains("SPDX\\-License\\-Identifier: MIT"));
        assert!(!expression_pattern(&c, &"TO-CLARIFY".into()).contains("SPDX"));
    }

    #[test]
    fn test_compound_marker_detected() {
        let c = corpus(&[("GPL-2.0-only_OR_GPL-3.0-only", &["some gpl text"])]);
        let matcher = RegexMatcher::new(c);
        let text = "# SPDX-License-Identifier: GPL-2.0-only OR GPL-3.0-only\n";
        assert!(matcher
            .find(text, &"GPL-2.0-only_OR_GPL-3.0-only".into())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_marker_span_stops_before_terminator() {
        let matcher = RegexMatcher::new(corpus(&[("MIT", &["granted"])]));
        let mit = SpdxExpression::new("MIT");

        let text = "// SPDX-License-Identifier: MIT\nint x;\n";
        let span = matcher.find(text, &mit).unwrap().unwrap();
        assert_eq!(&text[span.start..span.end], "SPDX-License-Identifier: MIT");

        let text = "/* SPDX-License-Identifier: MIT */";
        let span = matcher.find(text, &mit).unwrap().unwrap();
        assert_eq!(&text[span.start..span.end], "SPDX-License-Identifier: MIT");

        assert!(matcher.find("SPDX-License-Identifier: MIT", &mit).unwrap().is_some());
        assert!(matcher
            .find("// SPDX-License-Identifier: MIT-0\n", &mit)
            .unwrap()
            .is_none());
        assert!(matcher
            .find("// SPDX-License-Identifier: MITx\n", &mit)
            .unwrap()
            .is_none());

        let text = "// SPDX-License-Identifier: MIT-0\n// SPDX-License-Identifier: MIT\n";
        let span = matcher.find(text, &mit).unwrap().unwrap();
        assert_eq!(span.start, text.rfind("SPDX").unwrap());
    }

    #[test]
    fn test_unknown_expression_is_an_error() {
        let matcher = RegexMatcher::new(corpus(&[("MIT", &["granted"])]));
        assert!(matches!(
            matcher.find("granted", &"BSD-2-Clause".into()),
            Err(MatchError::UnknownExpression(_))
        ));
    }

    #[test]
    fn test_cache_memoizes_and_reload_clears() {
        let mut matcher = RegexMatcher::new(corpus(&[("MIT", &["granted"])]));
        let a = matcher.regex_for(&"MIT".into()).unwrap();
        let b = matcher.regex_for(&"MIT".into()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        matcher.reload(corpus(&[("MIT", &["revoked"])]));
        assert!(matcher.cache.is_empty());
        assert!(!matcher.regex_for(&"MIT".into()).unwrap().is_match("granted"));
    }
}
