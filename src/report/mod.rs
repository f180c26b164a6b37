//! Report renderers for header scan results.
//!
//! - [`terminal`] — colored, tabular output with summary box; respects `--verbose` / `--quiet`.
//! - [`json`] — the full [`ScanReport`](crate::models::ScanReport) as pretty JSON.

pub mod json;
pub mod terminal;
