use anyhow::Result;

use crate::models::ScanReport;

pub fn to_json(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render(report: &ScanReport) -> Result<()> {
    println!("{}", to_json(report)?);
    Ok(())
}
