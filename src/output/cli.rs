use crate::model::{RiskReport, RiskScore, Vendor};
use anyhow::Result;
use std::collections::BTreeMap;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ExtensionRow {
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "URLs")]
    urls: usize,
    #[tabled(rename = "IPs")]
    ips: usize,
}

pub fn print_cli_table(report: &RiskReport) -> Result<()> {
    println!();
    println!(
        "Run {} completed at: {}",
        report.run_id,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.extensions.is_empty() {
        println!("No extensions found.");
    } else {
        println!("Found {} extensions:", report.total);
        println!();

        let mut records: Vec<_> = report.extensions.iter().collect();
        records.sort_by_key(|r| risk_rank(r.risk_score));

        let rows: Vec<ExtensionRow> = records
            .iter()
            .map(|r| ExtensionRow {
                vendor: r.vendor_label.clone(),
                name: truncate(&r.name, 40),
                version: r.version.clone(),
                id: truncate(&r.id, 34),
                risk: format_risk(r.risk_score),
                urls: r.extracted_urls.len(),
                ips: r.extracted_ips.len(),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    print_high_risk_reasons(report);

    println!();
    print_summary(report);

    Ok(())
}

/// Highest risk first.
fn risk_rank(score: RiskScore) -> u8 {
    match score {
        RiskScore::Critical => 0,
        RiskScore::High => 1,
        RiskScore::Medium => 2,
        RiskScore::Low => 3,
        RiskScore::Unknown => 4,
    }
}

fn print_high_risk_reasons(report: &RiskReport) {
    let flagged: Vec<_> = report
        .extensions
        .iter()
        .filter(|r| r.risk_score.is_high_risk())
        .collect();

    if flagged.is_empty() {
        return;
    }

    println!();
    println!("High risk extensions:");
    for record in flagged {
        println!(
            "  {} ({}) [{}]",
            record.name,
            record.id,
            format_risk(record.risk_score)
        );
        for line in record.risk_summary.lines().filter(|l| !l.trim().is_empty()) {
            println!("    {}", truncate(line.trim(), 100));
        }
    }
}

fn format_risk(score: RiskScore) -> String {
    match score {
        RiskScore::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        RiskScore::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        RiskScore::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        RiskScore::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        RiskScore::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn print_summary(report: &RiskReport) {
    let mut by_score: BTreeMap<u8, usize> = BTreeMap::new();
    let mut by_vendor: BTreeMap<Vendor, usize> = BTreeMap::new();
    for record in &report.extensions {
        *by_score.entry(risk_rank(record.risk_score)).or_default() += 1;
        *by_vendor.entry(record.vendor).or_default() += 1;
    }
    let count = |score: RiskScore| by_score.get(&risk_rank(score)).copied().unwrap_or(0);

    println!("Summary:");
    println!("  Total extensions: {}", report.total);

    if by_vendor.len() > 1 {
        let vendor_summary: Vec<String> = by_vendor
            .iter()
            .map(|(v, c)| format!("{} {}", c, v.display_name()))
            .collect();
        println!("  By vendor: {}", vendor_summary.join(", "));
    }

    println!(
        "  Risk: {} critical, {} high, {} medium, {} low, {} unknown",
        count(RiskScore::Critical),
        count(RiskScore::High),
        count(RiskScore::Medium),
        count(RiskScore::Low),
        count(RiskScore::Unknown)
    );
}
