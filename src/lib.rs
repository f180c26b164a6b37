//! Find license headers in a source tree, classify every file by SPDX expression,
//! and optionally rewrite the headers to `SPDX-License-Identifier` lines.
//!
//! - [`license`] — the header corpus and the pruning of raw detections.
//! - [`matcher`] — the regex and skip-character strategies behind [`matcher::HeaderMatcher`].
//! - [`scanner`] — tree walking, classification with blacklist fallbacks, and header conversion.
//! - [`report`] — terminal and JSON renderers for a [`models::ScanReport`].
//! - [`config`] — the TOML configuration and where it is looked up.

pub mod config;
pub mod license;
pub mod matcher;
pub mod models;
pub mod report;
pub mod scanner;
