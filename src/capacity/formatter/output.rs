//! Output formatting for capacity reports.
//!
//! Supports multiple output formats: table, JSON, YAML and CSV.

use crate::capacity::report::CapacityReport;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

const WIDTH: usize = 100;

// ============================================================================
// Output Format
// ============================================================================

/// Output format for capacity reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Box-drawn tables (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// One CSV section per table
    Csv,
}

impl OutputFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Formatting Functions
// ============================================================================

/// Format a capacity report to string.
pub fn format_report_to_string(report: &CapacityReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(report),
        OutputFormat::Json => format_json(report),
        OutputFormat::Yaml => format_yaml(report),
        OutputFormat::Csv => format_csv(report),
    }
}

/// Format and print a capacity report.
pub fn format_report(report: &CapacityReport, format: OutputFormat) {
    println!("{}", format_report_to_string(report, format));
}

// ============================================================================
// Table Format
// ============================================================================

fn rule(c: char) -> String {
    std::iter::repeat_n(c, WIDTH).collect()
}

fn section_open(title: &str) -> String {
    let used = title.chars().count() + 4;
    let fill: String = std::iter::repeat_n('─', WIDTH.saturating_sub(used + 1)).collect();
    format!("\n┌─ {} {}┐\n", title, fill)
}

fn section_close() -> String {
    let fill: String = std::iter::repeat_n('─', WIDTH - 2).collect();
    format!("└{}┘\n", fill)
}

fn format_table(report: &CapacityReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{}\n", rule('═').bright_blue()));
    output.push_str(&format!(
        "{}\n",
        "☁  CLOUD CAPACITY CENSUS".bright_white().bold()
    ));
    output.push_str(&format!("{}\n", rule('═').bright_blue()));

    output.push_str(&format_summary_section(report));
    output.push_str(&format_totals_section(report));
    output.push_str(&format_region_section(report));
    output.push_str(&format_completeness_section(report));
    output.push_str(&format_protection_section(report));
    if !report.details.is_empty() {
        output.push_str(&format_details_section(report));
    }
    output.push_str(&format_quality_section(report));

    output.push_str(&format!("\n{}\n", rule('═').bright_blue()));
    output
}

fn format_summary_section(report: &CapacityReport) -> String {
    let meta = &report.metadata;
    let mut output = String::new();

    output.push_str(&format!("{}", section_open("Summary").bright_blue()));
    output.push_str(&format!(
        "│ {} {:>6}     {} {:>8}     {} {:>12}\n",
        "Accounts:".dimmed(),
        meta.accounts.to_string().bright_white(),
        "Resources:".dimmed(),
        meta.resources.to_string().bright_white(),
        "Total TiB:".dimmed(),
        format!("{:.3}", crate::capacity::units::to_tib(report.total_bytes())).bright_white(),
    ));
    output.push_str(&format!(
        "│ {} {}     {} {}\n",
        "Storage mode:".dimmed(),
        meta.storage_mode.to_string().cyan(),
        "Anonymize:".dimmed(),
        meta.anonymize_scope.to_string().cyan(),
    ));
    if let Some(salt) = &meta.generated_salt {
        output.push_str(&format!(
            "│ {} {}\n",
            "Generated salt:".dimmed(),
            salt.yellow()
        ));
    }
    output.push_str(&format!(
        "│ {} {}ms     {} {}\n",
        "Duration:".dimmed(),
        meta.duration_ms.to_string().dimmed(),
        "Run:".dimmed(),
        meta.run_id.dimmed(),
    ));
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_totals_section(report: &CapacityReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}", section_open("Totals by Workload").bright_blue()));
    output.push_str(&format!(
        "│ {}\n",
        format!("{:<32} {:>8} {:>14} {:>12}", "Workload", "Count", "Size GiB", "Size TiB").dimmed()
    ));
    for row in &report.totals {
        output.push_str(&format!(
            "│ {} {:>8} {:>14.2} {:>12.3}\n",
            format!("{:<32}", row.workload.label()).cyan(),
            row.count,
            row.size_gib,
            row.size_tib
        ));
    }
    if report.totals.is_empty() {
        output.push_str(&format!("│ {}\n", "No resources discovered".dimmed()));
    }
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_region_section(report: &CapacityReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}", section_open("By Region").bright_blue()));
    output.push_str(&format!(
        "│ {}\n",
        format!(
            "{:<18} {:<32} {:>8} {:>14} {:>12}",
            "Region", "Workload", "Count", "Size GiB", "Size TiB"
        )
        .dimmed()
    ));
    for row in &report.by_region {
        output.push_str(&format!(
            "│ {} {:<32} {:>8} {:>14.2} {:>12.3}\n",
            format!("{:<18}", row.region).yellow(),
            row.workload.label(),
            row.count,
            row.size_gib,
            row.size_tib
        ));
    }
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_completeness_section(report: &CapacityReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}", section_open("Completeness").bright_blue()));
    output.push_str(&format!(
        "│ {}\n",
        format!(
            "{:<32} {:>10} {:>10} {:>10}",
            "Workload", "Discovered", "With size", "Percent"
        )
        .dimmed()
    ));
    for row in &report.completeness {
        let percent = format!("{:>9.1}%", row.completeness_percent);
        let percent = if row.completeness_percent >= 100.0 {
            percent.green()
        } else if row.completeness_percent >= 75.0 {
            percent.yellow()
        } else {
            percent.red()
        };
        output.push_str(&format!(
            "│ {:<32} {:>10} {:>10} {}\n",
            row.workload.label(),
            row.discovered,
            row.with_size,
            percent
        ));
    }
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_protection_section(report: &CapacityReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}", section_open("Protection").bright_blue()));
    output.push_str(&format!(
        "│ {}\n",
        format!(
            "{:<18} {:<28} {:>10} {:>10} {:>8} {:>12} {:>8}",
            "Region", "Workload", "Discovered", "Protected", "Percent", "Est. TiB", "On-prem"
        )
        .dimmed()
    ));
    for row in &report.protection {
        let percent = format!("{:>7}%", row.percent_protected);
        let percent = if row.percent_protected >= 100 {
            percent.green()
        } else if row.percent_protected > 0 {
            percent.yellow()
        } else {
            percent.red()
        };
        output.push_str(&format!(
            "│ {} {:<28} {:>10} {:>10} {} {:>12.3} {:>8}\n",
            format!("{:<18}", row.region).yellow(),
            row.workload.label(),
            row.discovered,
            row.protected,
            percent,
            row.protected_size_tib,
            if row.on_prem { "yes" } else { "-" }
        ));
    }
    output.push_str(&format!(
        "│ {}\n",
        "Est. TiB = cell TiB × protected / discovered (proportional estimate)".dimmed()
    ));
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_details_section(report: &CapacityReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}", section_open("Resources").bright_blue()));
    for detail in &report.details {
        output.push_str(&format!(
            "│ {} {} {}\n",
            detail.workload.label().cyan(),
            detail.resource.bright_white(),
            format!("({})", detail.region).yellow()
        ));
        output.push_str(&format!(
            "│   {} {:.2} GiB via {}   {} {:.2} GiB\n",
            "Resolved:".dimmed(),
            detail.resolved_gib,
            detail.step,
            "Contributed:".dimmed(),
            detail.contributed_gib
        ));
        if let Some(parent) = &detail.attributed_to {
            output.push_str(&format!("│   {} {}\n", "Attributed to:".dimmed(), parent));
        }
    }
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

fn format_quality_section(report: &CapacityReport) -> String {
    if !report.has_data_quality_issues() {
        return format!("\n{}\n", "✅ No data quality issues recorded.".green());
    }

    let mut output = String::new();
    output.push_str(&format!("{}", section_open("Data Quality").bright_blue()));
    for skip in &report.skipped {
        output.push_str(&format!(
            "│ {} {} {} {}\n",
            "⚠".yellow(),
            format!("[{}]", skip.account).bright_cyan(),
            "skipped record:".dimmed(),
            match &skip.identity {
                Some(identity) => format!("{} ({})", identity, skip.reason),
                None => skip.reason.to_string(),
            }
        ));
    }
    for note in &report.data_quality {
        output.push_str(&format!(
            "│ {} {} {} {}\n",
            "⚠".yellow(),
            format!("[{}]", note.account).bright_cyan(),
            format!("{}:", note.kind).dimmed(),
            note.message
        ));
    }
    output.push_str(&format!("{}", section_close().bright_blue()));
    output
}

// ============================================================================
// JSON Format
// ============================================================================

fn format_json(report: &CapacityReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

// ============================================================================
// YAML Format
// ============================================================================

fn format_yaml(report: &CapacityReport) -> String {
    serde_yaml::to_string(report).unwrap_or_else(|_| "".to_string())
}

// ============================================================================
// CSV Format
// ============================================================================

/// RFC 4180 records with CRLF line endings, one titled section per table.
fn format_csv(report: &CapacityReport) -> String {
    let mut output = String::new();

    csv_section(
        &mut output,
        "totals_by_workload",
        &["workload", "count", "size_GiB", "size_TiB"],
        report.totals.iter().map(|r| {
            vec![
                r.workload.label().to_string(),
                r.count.to_string(),
                r.size_gib.to_string(),
                r.size_tib.to_string(),
            ]
        }),
    );
    csv_section(
        &mut output,
        "totals_by_region",
        &["region", "workload", "count", "size_GiB", "size_TiB"],
        report.by_region.iter().map(|r| {
            vec![
                r.region.clone(),
                r.workload.label().to_string(),
                r.count.to_string(),
                r.size_gib.to_string(),
                r.size_tib.to_string(),
            ]
        }),
    );
    csv_section(
        &mut output,
        "completeness",
        &["workload", "discovered", "withSize", "completenessPercent"],
        report.completeness.iter().map(|r| {
            vec![
                r.workload.label().to_string(),
                r.discovered.to_string(),
                r.with_size.to_string(),
                r.completeness_percent.to_string(),
            ]
        }),
    );
    csv_section(
        &mut output,
        "protection",
        &[
            "region",
            "workload",
            "discovered",
            "protected",
            "percentProtected",
            "protectedSize_TiB",
            "onPremFlag",
        ],
        report.protection.iter().map(|r| {
            vec![
                r.region.clone(),
                r.workload.label().to_string(),
                r.discovered.to_string(),
                r.protected.to_string(),
                r.percent_protected.to_string(),
                r.protected_size_tib.to_string(),
                r.on_prem.to_string(),
            ]
        }),
    );
    if !report.details.is_empty() {
        csv_section(
            &mut output,
            "resources",
            &[
                "account",
                "resourceGroup",
                "resource",
                "workload",
                "region",
                "resolved_GiB",
                "contributed_GiB",
                "step",
                "attributedTo",
            ],
            report.details.iter().map(|d| {
                vec![
                    d.account.clone(),
                    d.resource_group.clone().unwrap_or_default(),
                    d.resource.clone(),
                    d.workload.label().to_string(),
                    d.region.clone(),
                    d.resolved_gib.to_string(),
                    d.contributed_gib.to_string(),
                    d.step.to_string(),
                    d.attributed_to.clone().unwrap_or_default(),
                ]
            }),
        );
    }
    csv_section(
        &mut output,
        "data_quality",
        &["account", "kind", "message"],
        report
            .skipped
            .iter()
            .map(|s| {
                let message = match &s.identity {
                    Some(identity) => format!("{}: {}", identity, s.reason),
                    None => s.reason.to_string(),
                };
                vec![s.account.clone(), "skipped_record".to_string(), message]
            })
            .chain(
                report
                    .data_quality
                    .iter()
                    .map(|n| vec![n.account.clone(), n.kind.to_string(), n.message.clone()]),
            ),
    );

    output
}

fn csv_section(
    output: &mut String,
    title: &str,
    header: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) {
    if !output.is_empty() {
        output.push_str("\r\n");
    }
    output.push_str(&format!("# {}\r\n", title));
    let header: Vec<String> = header.iter().map(|h| csv_field(h)).collect();
    output.push_str(&header.join(","));
    output.push_str("\r\n");
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        output.push_str(&fields.join(","));
        output.push_str("\r\n");
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
