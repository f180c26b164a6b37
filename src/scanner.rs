use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{BlacklistConfig, ScanConfig};
use crate::license::pruner::{resolve, Resolution};
use crate::matcher::{HeaderMatcher, MatchError};
use crate::models::{
    Classification, FileResult, RawDetection, ScanError, ScanReport, SpdxExpression, Span,
};

fn compile_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for g in globs {
        builder.add(Glob::new(g).with_context(|| format!("invalid glob: {g:?}"))?);
    }
    Ok(builder.build()?)
}

/// Extension allow-list plus ignore globs, applied to paths relative to the root.
#[derive(Debug)]
pub struct FileFilter {
    extensions: HashSet<String>,
    ignore: GlobSet,
}

impl FileFilter {
    pub fn new(extensions: &[String], ignore: &[String]) -> Result<Self> {
        Ok(Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ignore: compile_globset(ignore)?,
        })
    }

    pub fn from_config(config: &ScanConfig, extra_ignore: &[String]) -> Result<Self> {
        let mut ignore = config.ignore.clone();
        ignore.extend_from_slice(extra_ignore);
        Self::new(&config.extensions, &ignore)
    }

    pub fn accepts(&self, relative: &Path) -> bool {
        let allowed = relative
            .extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or(false);
        allowed && !self.ignore.is_match(relative)
    }
}

/// Paths that are known to carry no license header.
#[derive(Debug)]
pub struct Blacklist {
    missing: GlobSet,
    generated: GlobSet,
}

impl Blacklist {
    pub fn new(missing: &[String], generated: &[String]) -> Result<Self> {
        Ok(Self {
            missing: compile_globset(missing)?,
            generated: compile_globset(generated)?,
        })
    }

    pub fn from_config(config: &BlacklistConfig) -> Result<Self> {
        Self::new(&config.missing, &config.generated)
    }

    /// Classification of a file in which nothing was detected.
    pub fn classify_undetected(&self, relative: &Path) -> Classification {
        if self.missing.is_match(relative) {
            Classification::Missing
        } else if self.generated.is_match(relative) {
            Classification::MissingGenerated
        } else {
            Classification::Unknown
        }
    }
}

/// Files under `root` accepted by `filter`, relative to `root`, in a stable order.
pub fn enumerate_files(root: &Path, filter: &FileFilter) -> (Vec<PathBuf>, Vec<ScanError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(ScanError {
                    path: err.path().unwrap_or(root).to_path_buf(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        if filter.accepts(&relative) {
            files.push(relative);
        }
    }

    (files, errors)
}

/// Result of classifying one file's content.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub classification: Classification,
    pub conflicts: Vec<SpdxExpression>,
    pub detections: Vec<RawDetection>,
}

/// Classifies every file of a tree and optionally rewrites recognised headers.
pub struct DirectoryClassifier {
    matcher: Box<dyn HeaderMatcher>,
    filter: FileFilter,
    blacklist: Blacklist,
}

impl DirectoryClassifier {
    pub fn new(matcher: Box<dyn HeaderMatcher>, filter: FileFilter, blacklist: Blacklist) -> Self {
        Self {
            matcher,
            filter,
            blacklist,
        }
    }

    pub fn enumerate(&self, root: &Path) -> (Vec<PathBuf>, Vec<ScanError>) {
        enumerate_files(root, &self.filter)
    }

    /// Detect, prune and resolve the license of one file's content.
    pub fn classify_content(&self, relative: &Path, content: &str) -> Verdict {
        let detections = self.matcher.detect(content);
        let resolution = resolve(detections.iter().map(|d| &d.expression));

        let (classification, conflicts) = match resolution {
            Resolution::Undetected => (self.blacklist.classify_undetected(relative), Vec::new()),
            Resolution::Single(expression) => (Classification::from_key(expression.as_str()), Vec::new()),
            Resolution::Ambiguous(conflicts) => {
                warn!(
                    path = %relative.display(),
                    conflicts = ?conflicts.iter().map(SpdxExpression::as_str).collect::<Vec<_>>(),
                    "multiple licenses detected"
                );
                (Classification::Ambiguous, conflicts)
            }
        };

        Verdict {
            classification,
            conflicts,
            detections,
        }
    }

    pub fn classify_tree(&self, root: &Path, convert: bool) -> ScanReport {
        self.classify_tree_with(root, convert, |_, _| {})
    }

    /// Classify every accepted file under `root`. `on_file` is called after each
    /// file with its relative path and the total number of files.
    pub fn classify_tree_with<F>(&self, root: &Path, convert: bool, mut on_file: F) -> ScanReport
    where
        F: FnMut(&Path, usize),
    {
        info!(root = %root.display(), matcher = %self.matcher.kind(), convert, "scanning");
        let (files, errors) = self.enumerate(root);
        let total = files.len();

        let mut report = ScanReport {
            root: root.to_path_buf(),
            matcher: self.matcher.kind(),
            files: Vec::with_capacity(total),
            errors,
        };

        for relative in files {
            self.process_file(root, &relative, convert, &mut report);
            on_file(&relative, total);
        }

        info!(
            files = report.files.len(),
            undetected = report.undetected(),
            errors = report.errors.len(),
            "scan finished"
        );
        report
    }

    fn process_file(&self, root: &Path, relative: &Path, convert: bool, report: &mut ScanReport) {
        let path = root.join(relative);
        let content = match read_source(&path) {
            Ok(content) => content,
            Err(message) => {
                report.errors.push(ScanError {
                    path: relative.to_path_buf(),
                    message,
                });
                return;
            }
        };

        let verdict = self.classify_content(relative, &content);
        debug!(path = %relative.display(), classification = %verdict.classification);

        let mut rewritten = false;
        if convert {
            if let Classification::Identified(expression) = &verdict.classification {
                if let Some(converted) = rewrite_header(&content, &verdict.detections, expression) {
                    match std::fs::write(&path, converted) {
                        Ok(()) => rewritten = true,
                        Err(err) => report.errors.push(ScanError {
                            path: relative.to_path_buf(),
                            message: format!("failed to write converted header: {err}"),
                        }),
                    }
                }
            }
        }

        report.files.push(FileResult {
            path: relative.to_path_buf(),
            classification: verdict.classification,
            conflicts: verdict.conflicts,
            rewritten,
        });
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|err| format!("failed to read file: {err}"))?;
    String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8".to_string())
}

/// Replace the header spans that resolved to `expression` with its canonical
/// `SPDX-License-Identifier` line. Spans of detections subsumed by `expression`
/// are replaced too; overlapping spans are replaced once. Returns `None` when the
/// content would not change.
pub fn rewrite_header(
    content: &str,
    detections: &[RawDetection],
    expression: &SpdxExpression,
) -> Option<String> {
    let closure = expression.or_closure();
    let mut spans: Vec<Span> = detections
        .iter()
        .filter(|d| &d.expression == expression || closure.contains(&d.expression))
        .map(|d| d.span)
        .collect();
    spans.sort_by_key(|s| (s.start, Reverse(s.end)));

    let mut kept: Vec<Span> = Vec::new();
    for span in spans {
        if kept.last().map_or(true, |last| !last.overlaps(&span)) {
            kept.push(span);
        }
    }

    let marker = expression.marker();
    let mut converted = content.to_string();
    let mut changed = false;
    for span in kept.iter().rev() {
        if content[span.start..span.end] == marker {
            continue;
        }
        converted.replace_range(span.start..span.end, &marker);
        changed = true;
    }
    changed.then_some(converted)
}

/// Replace the first header of `expression` in `content` with its marker line.
pub fn replace_header_text(
    matcher: &dyn HeaderMatcher,
    content: &str,
    expression: &SpdxExpression,
) -> Result<Option<String>, MatchError> {
    let span = match matcher.find(content, expression)? {
        Some(span) => span,
        None => return Ok(None),
    };
    let mut converted = content.to_string();
    converted.replace_range(span.start..span.end, &expression.marker());
    Ok(Some(converted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::LicenseCorpus;
    use crate::matcher;
    use crate::models::MatcherKind;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LGPL_PROGRAM: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/licenses/LGPL-2.0-or-later/program.txt"));

    const KBOUNCE_RENDERER: &str = r#"/*
 * Copyright (C) 2006 Dmitry Suzdalev <dimsuz@gmail.com>
 * Copyright (C) 2007 Tomasz Boczkowski <tboczkowski@onet.pl>
 *
 * This file is part of the KDE project "KBounce"
 *
 * This program is free software; you can redistribute it and/or
 * modify it under the terms of the GNU Library General Public
 * License as published by the Free Software Foundation; either
 * version 2 of the License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Library General Public License for more details.
 *
 * You should have received a copy of the GNU Library General Public
 * License along with this program; if not, write to the Free Software
 * Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301, USA.
 */

#ifndef RENDERER_H
#define RENDERER_H
"#;

    const CONFIGWIDGET: &str = r#"/************************************************************************
 * KDevelop4 Custom Buildsystem Support                                 *
 *                                                                      *
 * Copyright 2010 Andreas Pakulat <apaku@gmx.de>                        *
 *                                                                      *
 * This program is free software; you can redistribute it and/or modify *
 * it under the terms of the GNU General Public License as published by *
 * the Free Software Foundation; either version 2 or version 3 of the   *
 * License, or (at your option) any later version.                      *
 *                                                                      *
 * This program is distributed in the hope that it will be useful, but  *
 * WITHOUT ANY WARRANTY; without even the implied warranty of           *
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU     *
 * General Public License for more details.                             *
 *                                                                      *
 * You should have received a copy of the GNU General Public License    *
 * along with this program; if not, see <http://www.gnu.org/licenses/>. *
 ************************************************************************/

#ifndef CONFIGWIDGET_H
"#;

    fn classifier(kind: MatcherKind, missing: &[&str]) -> DirectoryClassifier {
        let corpus = Arc::new(LicenseCorpus::bundled().unwrap());
        let missing: Vec<String> = missing.iter().map(|s| s.to_string()).collect();
        DirectoryClassifier::new(
            matcher::build(kind, corpus),
            FileFilter::new(&["cpp".to_string(), "h".to_string()], &["build/**".to_string()]).unwrap(),
            Blacklist::new(&missing, &["**/moc_*.cpp".to_string()]).unwrap(),
        )
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn classification_of<'a>(report: &'a ScanReport, relative: &str) -> &'a Classification {
        &report
            .files
            .iter()
            .find(|f| f.path == Path::new(relative))
            .unwrap()
            .classification
    }

    #[test]
    fn test_replace_header_text_of_corpus_file() {
        let corpus = Arc::new(LicenseCorpus::bundled().unwrap());
        let expression = SpdxExpression::new("LGPL-2.0-or-later");
        for kind in [MatcherKind::Regex, MatcherKind::Skip] {
            let matcher = matcher::build(kind, corpus.clone());
            assert_eq!(
                replace_header_text(matcher.as_ref(), LGPL_PROGRAM, &expression).unwrap(),
                Some("SPDX-License-Identifier: LGPL-2.0-or-later\n".to_string()),
                "matcher {kind}"
            );
        }
    }

    #[test]
    fn test_detects_known_headers_with_both_matchers() {
        for kind in [MatcherKind::Regex, MatcherKind::Skip] {
            let c = classifier(kind, &[]);
            let verdict = c.classify_content(Path::new("renderer.h"), KBOUNCE_RENDERER);
            assert_eq!(
                verdict.classification,
                Classification::from_key("LGPL-2.0-or-later"),
                "matcher {kind}"
            );
            let verdict = c.classify_content(Path::new("configwidget.h"), CONFIGWIDGET);
            assert_eq!(
                verdict.classification,
                Classification::from_key("GPL-2.0-only_OR_GPL-3.0-or-later"),
                "matcher {kind}"
            );
        }
    }

    #[test]
    fn test_literal_marker_classifies_compound_expression() {
        let content = "/*\n * SPDX-FileCopyrightText: 2020 Jane Doe <jane@example.com>\n *\n * SPDX-License-Identifier: GPL-2.0-only OR GPL-3.0-only OR LicenseRef-KDE-Accepted-GPL\n */\n\nint x;\n";
        for kind in [MatcherKind::Regex, MatcherKind::Skip] {
            let verdict = classifier(kind, &[]).classify_content(Path::new("a.cpp"), content);
            assert_eq!(
                verdict.classification,
                Classification::from_key("GPL-2.0-only_OR_GPL-3.0-only_OR_LicenseRef-KDE-Accepted-GPL"),
                "matcher {kind}"
            );
            assert!(rewrite_header(
                content,
                &verdict.detections,
                verdict.classification.expression().unwrap()
            )
            .is_none());
        }
    }

    #[test]
    fn test_classifies_header_fixtures() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata");
        for kind in [MatcherKind::Skip, MatcherKind::Regex] {
            let report = classifier(kind, &[]).classify_tree(&root, false);
            assert!(report.errors.is_empty(), "{:?}", report.errors);
            assert_eq!(report.files.len(), 7);

            for file in &report.files {
                // line breaks moved inside a sentence are only tolerated by the skip matcher
                if kind == MatcherKind::Regex && file.path.ends_with("configwidget.h") {
                    assert_eq!(file.classification, Classification::Unknown);
                    continue;
                }
                let expected = file.path.iter().next().unwrap().to_string_lossy();
                assert_eq!(
                    file.classification,
                    Classification::from_key(&expected),
                    "matcher {kind}: {}",
                    file.path.display()
                );
            }
        }
    }

    #[test]
    fn test_marker_of_longer_identifier_is_not_detected() {
        let content = "// SPDX-License-Identifier: MIT-0\n\nint x;\n";
        for kind in [MatcherKind::Regex, MatcherKind::Skip] {
            let verdict = classifier(kind, &[]).classify_content(Path::new("a.cpp"), content);
            assert_eq!(verdict.classification, Classification::Unknown, "matcher {kind}");
        }
    }

    #[test]
    fn test_convert_rewrites_only_header_span() {
        let root = TempDir::new().unwrap();
        write(root.path(), "src/renderer.h", KBOUNCE_RENDERER);

        let report = classifier(MatcherKind::Skip, &[]).classify_tree(root.path(), true);
        assert!(report.errors.is_empty());
        assert_eq!(report.rewritten(), 1);

        let header_start = KBOUNCE_RENDERER.find("This program is free").unwrap();
        let header_end = KBOUNCE_RENDERER.find("02110-1301, USA.").unwrap() + "02110-1301, USA.".len();
        let expected = format!(
            "{}SPDX-License-Identifier: LGPL-2.0-or-later{}",
            &KBOUNCE_RENDERER[..header_start],
            &KBOUNCE_RENDERER[header_end..]
        );
        let converted = std::fs::read_to_string(root.path().join("src/renderer.h")).unwrap();
        assert_eq!(converted, expected);

        // a second run finds the marker and leaves the file alone
        let again = classifier(MatcherKind::Skip, &[]).classify_tree(root.path(), true);
        assert_eq!(
            classification_of(&again, "src/renderer.h"),
            &Classification::from_key("LGPL-2.0-or-later")
        );
        assert_eq!(again.rewritten(), 0);
    }

    #[test]
    fn test_without_convert_files_untouched() {
        let root = TempDir::new().unwrap();
        write(root.path(), "renderer.h", KBOUNCE_RENDERER);
        let report = classifier(MatcherKind::Regex, &[]).classify_tree(root.path(), false);
        assert_eq!(report.rewritten(), 0);
        assert_eq!(
            std::fs::read_to_string(root.path().join("renderer.h")).unwrap(),
            KBOUNCE_RENDERER
        );
    }

    #[test]
    fn test_fallbacks_filters_and_errors() {
        let root = TempDir::new().unwrap();
        write(root.path(), "main.cpp", "int main() {}\n");
        write(root.path(), "moc_window.cpp", "// generated\n");
        write(root.path(), "data/table.h", "static int table[] = {};\n");
        write(root.path(), "build/generated.cpp", KBOUNCE_RENDERER);
        write(root.path(), "README.md", KBOUNCE_RENDERER);
        std::fs::write(root.path().join("latin1.cpp"), b"/* Gr\xfc\xdfe */\n").unwrap();

        let report = classifier(MatcherKind::Skip, &["data/**"]).classify_tree(root.path(), true);

        let paths: Vec<String> = report
            .files
            .iter()
            .map(|f| f.path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(paths, vec!["data/table.h", "main.cpp", "moc_window.cpp"]);
        assert_eq!(classification_of(&report, "main.cpp"), &Classification::Unknown);
        assert_eq!(classification_of(&report, "moc_window.cpp"), &Classification::MissingGenerated);
        assert_eq!(classification_of(&report, "data/table.h"), &Classification::Missing);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, PathBuf::from("latin1.cpp"));
        assert_eq!(report.undetected(), 1);
        assert_eq!(report.detected(), 2);
    }

    #[test]
    fn test_ambiguous_detection_is_not_rewritten() {
        let content = format!(
            "/*\n * SPDX-License-Identifier: MIT\n */\n{}",
            KBOUNCE_RENDERER
        );
        let root = TempDir::new().unwrap();
        write(root.path(), "mixed.cpp", &content);

        let report = classifier(MatcherKind::Regex, &[]).classify_tree(root.path(), true);
        let file = &report.files[0];
        assert_eq!(file.classification, Classification::Ambiguous);
        assert_eq!(
            file.conflicts,
            vec![SpdxExpression::new("LGPL-2.0-or-later"), SpdxExpression::new("MIT")]
        );
        assert!(!file.rewritten);
        assert_eq!(std::fs::read_to_string(root.path().join("mixed.cpp")).unwrap(), content);
    }

    #[test]
    fn test_to_clarify_is_never_rewritten() {
        let corpus = LicenseCorpus::new(
            vec![("TO-CLARIFY".to_string(), vec!["Ask the original author".to_string()])],
            BTreeMap::new(),
        )
        .unwrap();
        let c = DirectoryClassifier::new(
            matcher::build(MatcherKind::Skip, Arc::new(corpus)),
            FileFilter::new(&["cpp".to_string()], &[]).unwrap(),
            Blacklist::new(&[], &[]).unwrap(),
        );
        let root = TempDir::new().unwrap();
        write(root.path(), "a.cpp", "// Ask the original\n// author\n");
        let report = c.classify_tree(root.path(), true);
        assert_eq!(report.files[0].classification, Classification::ToClarify);
        assert!(!report.files[0].rewritten);
    }

    #[test]
    fn test_rewrite_merges_overlapping_spans() {
        let content = "// SPDX-License-Identifier: MIT  OR Apache-2.0\nrest";
        let or_start = content.find("SPDX").unwrap();
        let detections = vec![
            RawDetection {
                expression: "MIT".into(),
                span: Span { start: or_start, end: or_start + 28 },
            },
            RawDetection {
                expression: "MIT_OR_Apache-2.0".into(),
                span: Span { start: or_start, end: content.find("\nrest").unwrap() },
            },
        ];
        let converted = rewrite_header(content, &detections, &"MIT_OR_Apache-2.0".into()).unwrap();
        assert_eq!(converted, "// SPDX-License-Identifier: MIT OR Apache-2.0\nrest");
    }
}
