//! `license-digger` command line front end.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`load_config`]); CLI flags override it.
//! 3. Load the header corpus, bundled or from `--corpus` ([`LicenseCorpus`]).
//! 4. Build and warm up the selected matcher ([`matcher::build`]).
//! 5. Walk the tree, detect, prune and classify each file, converting if asked ([`DirectoryClassifier`]).
//! 6. Render the requested report ([`report`]).
//! 7. Exit `0`; only an unusable root, config or corpus is fatal.

mod cli;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use license_digger::config::load_config;
use license_digger::license::LicenseCorpus;
use license_digger::scanner::{Blacklist, DirectoryClassifier, FileFilter};
use license_digger::{matcher, report};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Resolve root path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());
    if !path.is_dir() {
        bail!("{} is not a directory", path.display());
    }

    let config = load_config(&path, cli.config.as_deref())?;

    // Load corpus: --corpus, then [corpus] path, then the bundled texts
    let corpus = match cli.corpus.as_ref().or(config.corpus.path.as_ref()) {
        Some(dir) => LicenseCorpus::load_dir(dir)?,
        None => LicenseCorpus::bundled().context("bundled license corpus is invalid")?,
    };
    tracing::debug!(
        expressions = corpus.expressions().count(),
        "license corpus loaded"
    );

    if cli.check_license_files {
        let missing = corpus.missing_license_files();
        match cli.report {
            ReportFormat::Terminal => report::terminal::render_missing_license_files(&missing),
            // keep stdout a single JSON document
            ReportFormat::Json => {
                for id in &missing {
                    tracing::warn!(identifier = %id, "no license file");
                }
            }
        }
    }

    let matcher_kind = cli.matcher.unwrap_or(config.scan.matcher);
    let matcher = matcher::build(matcher_kind, Arc::new(corpus));
    matcher.warm_up();

    let classifier = DirectoryClassifier::new(
        matcher,
        FileFilter::from_config(&config.scan, &cli.ignore)?,
        Blacklist::from_config(&config.blacklist)?,
    );

    let show_progress = !cli.quiet && cli.report == ReportFormat::Terminal;
    let pb = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let report = classifier.classify_tree_with(&path, cli.convert, |file, total| {
        if let Some(pb) = &pb {
            pb.set_length(total as u64);
            pb.set_message(file.display().to_string());
            pb.inc(1);
        }
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    // Render report
    match cli.report {
        ReportFormat::Terminal => report::terminal::render(&report, cli.verbose, cli.quiet)?,
        ReportFormat::Json => report::json::render(&report)?,
    }

    Ok(())
}
