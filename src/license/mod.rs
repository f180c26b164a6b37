//! License knowledge and detection post-processing.
//!
//! - [`corpus`] — the registry of known header texts per SPDX expression, plus the
//!   identifier → license file map of a corpus directory.
//! - [`builtin`] — the header texts compiled into the binary.
//! - [`pruner`] — reduces the raw detections of one file to a single expression
//!   or an ambiguity.

pub mod builtin;
pub mod corpus;
pub mod pruner;

pub use corpus::{CorpusError, LicenseCorpus};
