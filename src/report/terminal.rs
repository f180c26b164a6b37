use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{Classification, FileResult, ScanReport};

/// Render a colored terminal report.
pub fn render(report: &ScanReport, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("{}", undetected_line(report));
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-digger".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        " Scanning: {} (matcher: {})\n",
        report.root.display(),
        report.matcher
    );

    let ambiguous = report.ambiguous();
    let unknown = report.undetected();

    // Summary box
    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Files scanned      : {}", report.files.len())
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Detected        : {:>4}  {}",
            "✓".green(),
            report.detected() - ambiguous,
            top_classifications(report)
        )
    );
    println!(
        " │  {:<48} │",
        format!("{}  Ambiguous       : {:>4}", "⚠".yellow(), ambiguous)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Unknown         : {:>4}", "✗".red(), unknown)
    );
    if report.rewritten() > 0 {
        println!(
            " │  {:<48} │",
            format!("{}  Converted       : {:>4}", "→".cyan(), report.rewritten())
        );
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    if ambiguous > 0 {
        println!(" {} Files with conflicting licenses:\n", "[AMBIGUOUS]".yellow().bold());
        render_table(report.files.iter().filter(|f| f.classification == Classification::Ambiguous));
        println!();
    }

    if unknown > 0 {
        println!(" {} Files without a recognised header:\n", "[UNKNOWN]".red().bold());
        render_table(report.files.iter().filter(|f| f.classification == Classification::Unknown));
        println!();
    }

    if verbose && !report.files.is_empty() {
        println!(" {} All files:\n", "[FILES]".green().bold());
        render_table(report.files.iter());
        println!();
    }

    if !report.errors.is_empty() {
        println!(" {} Files that could not be scanned:\n", "[ERROR]".red().bold());
        for error in &report.errors {
            println!("   {}  {}", error.path.display(), error.message.dimmed());
        }
        println!();
    }

    println!("{}", undetected_line(report));
    Ok(())
}

/// Print the corpus identifiers that have no license text file.
pub fn render_missing_license_files(missing: &[String]) {
    if missing.is_empty() {
        println!(" {} Every identifier has a license file", "✓".green());
        return;
    }
    println!(" {} Identifiers without a license file:\n", "[MISSING]".yellow().bold());
    for id in missing {
        println!("   {}", id);
    }
    println!();
}

pub fn undetected_line(report: &ScanReport) -> String {
    format!(
        "Undetected files: {} (total: {})",
        report.undetected(),
        report.files.len()
    )
}

fn render_table<'a>(files: impl Iterator<Item = &'a FileResult>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("File").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Conflicts").add_attribute(Attribute::Bold),
            Cell::new("Converted").add_attribute(Attribute::Bold),
        ]);

    for file in files {
        let color = match &file.classification {
            Classification::Identified(_) => Color::Green,
            Classification::Ambiguous | Classification::ToClarify => Color::Yellow,
            Classification::Unknown => Color::Red,
            Classification::Missing | Classification::MissingGenerated => Color::DarkGrey,
        };
        let conflicts: Vec<&str> = file.conflicts.iter().map(|c| c.as_str()).collect();

        table.add_row(vec![
            Cell::new(file.path.display()),
            Cell::new(file.classification.as_key()).fg(color),
            Cell::new(conflicts.join(", ")),
            Cell::new(if file.rewritten { "✓" } else { "" })
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}

/// The three most frequent detected classifications, e.g. `[MIT (4), LGPL-2.1-or-later (2)]`.
fn top_classifications(report: &ScanReport) -> String {
    let summary: Vec<String> = report
        .counts()
        .into_iter()
        .filter(|(c, _)| !matches!(c, Classification::Unknown | Classification::Ambiguous))
        .take(3)
        .map(|(c, n)| format!("{} ({})", c, n))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
