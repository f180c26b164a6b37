use std::collections::{BTreeMap, BTreeSet};

use crate::models::SpdxExpression;

/// Outcome of reducing the raw detections of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing was detected; the caller falls back to blacklists.
    Undetected,
    Single(SpdxExpression),
    /// More than one expression survived pruning.
    Ambiguous(Vec<SpdxExpression>),
}

/// Reduce raw detections to the expressions that are not redundant.
///
/// Duplicates are removed, then every plain identifier that appears in the
/// OR-closure of another detected expression is dropped: a compound statement
/// (`X_OR_Y`, `X_WITH_E`) is the more specific finding once it was also matched.
/// Nested `_AND_` terms and independent OR groups are not reasoned about.
pub fn prune<'a, I>(detections: I) -> Vec<SpdxExpression>
where
    I: IntoIterator<Item = &'a SpdxExpression>,
{
    let unique: BTreeSet<&SpdxExpression> = detections.into_iter().collect();

    let closures: BTreeMap<&SpdxExpression, BTreeSet<SpdxExpression>> = unique
        .iter()
        .filter(|e| e.is_compound())
        .map(|e| (*e, e.or_closure()))
        .collect();

    unique
        .iter()
        .filter(|expr| {
            if expr.is_compound() {
                return true;
            }
            !closures
                .iter()
                .any(|(other, closure)| other != *expr && closure.contains(**expr))
        })
        .map(|e| (*e).clone())
        .collect()
}

pub fn resolve<'a, I>(detections: I) -> Resolution
where
    I: IntoIterator<Item = &'a SpdxExpression>,
{
    let mut survivors = prune(detections);
    match survivors.len() {
        0 => Resolution::Undetected,
        1 => Resolution::Single(survivors.remove(0)),
        _ => Resolution::Ambiguous(survivors),
    }
}
