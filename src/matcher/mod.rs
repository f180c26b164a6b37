//! Strategies for locating known header texts inside file content.
//!
//! - [`regex`] — escaped variant texts compiled into one alternation per expression,
//!   tolerant of `*`/space decoration at line breaks.
//! - [`skip`] — exact KMP matching after stripping whitespace and comment characters
//!   from both sides.
//! - [`cache`] — the memoizing map both strategies keep their compiled artifacts in.
//!
//! Both implement [`HeaderMatcher`], so the classifier is agnostic of the strategy.

use std::sync::Arc;

use thiserror::Error;

use crate::license::LicenseCorpus;
use crate::models::{MatcherKind, RawDetection, SpdxExpression, Span};

pub mod cache;
pub mod regex;
pub mod skip;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("expression {0} is not in the license corpus")]
    UnknownExpression(SpdxExpression),

    #[error("failed to compile header pattern for {expression}")]
    Pattern {
        expression: SpdxExpression,
        #[source]
        source: ::regex::Error,
    },
}

pub trait HeaderMatcher {
    fn kind(&self) -> MatcherKind;

    fn corpus(&self) -> &LicenseCorpus;

    /// First occurrence of any header variant (or the literal marker) of `expression`.
    fn find(&self, text: &str, expression: &SpdxExpression) -> Result<Option<Span>, MatchError>;

    /// Every detectable corpus expression found in `text`, in corpus order.
    fn detect(&self, text: &str) -> Vec<RawDetection> {
        let mut detections = Vec::new();
        for expression in self.corpus().detectable() {
            match self.find(text, expression) {
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

    /// Build the compiled form of every corpus expression up front.
    fn warm_up(&self);

    /// Replace the corpus and drop everything compiled from the previous one.
    fn reload(&mut self, corpus: Arc<LicenseCorpus>);
}

pub fn build(kind: MatcherKind, corpus: Arc<LicenseCorpus>) -> Box<dyn HeaderMatcher> {
    match kind {
        MatcherKind::Regex => Box::new(regex::RegexMatcher::new(corpus)),
        MatcherKind::Skip => Box::new(skip::SkipHeaderMatcher::new(corpus)),
    }
}
