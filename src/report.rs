//! Output formatting for truthgate results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::access::Denial;
use crate::category::ContentCategory;
use crate::normalize::{AnalysisResult, MEDIA_VERDICTS, SAFETY_RATINGS, VOICE_VERDICTS};
use crate::state::{AuditEntry, UserAccessRecord};

/// News verdicts, most favorable first.
const NEWS_VERDICTS: &[&str] = &["Credible", "Mostly True", "Questionable", "Likely False", "False"];

/// Report fields printed as lists in pretty output.
const LIST_FIELDS: &[(&str, &str)] = &[
    ("claimsAnalyzed", "Claims analyzed"),
    ("flaggedClaims", "Flagged claims"),
    ("flags", "Flags"),
    ("recommendations", "Recommendations"),
    ("sources", "Sources"),
];

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report for one analysis.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub engine: &'static str,
    pub detected_type: ContentCategory,
    pub result: &'a AnalysisResult,
}

/// Write an analysis result in JSON format.
pub fn write_json(result: &AnalysisResult) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        engine: result.category.engine_name(),
        detected_type: result.category,
        result,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json_value<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write an analysis result in pretty (human-readable) format.
pub fn write_pretty(result: &AnalysisResult) {
    write_header();

    print!("  {}", "Engine:   ".dimmed());
    println!("{}", result.category.display_name());
    print!("  {}", "Origin:   ".dimmed());
    if result.is_fallback() {
        println!("{}", "fallback (engine output unavailable)".yellow());
    } else {
        println!("{}", "engine".green());
    }
    println!();

    write_verdict_line(result);
    println!();

    if let Some(title) = title_of(result) {
        print!("  {}", "Subject:  ".dimmed());
        println!("{}", title);
    }
    if let Some(text) = summary_text(result) {
        println!();
        for line in wrap(text, 72) {
            println!("  {}", line);
        }
    }
    println!();

    for (key, label) in LIST_FIELDS {
        if let Some(Value::Array(items)) = result.report.get(*key) {
            if items.is_empty() {
                continue;
            }
            println!("  {} ({}):", label.bold(), items.len());
            for item in items {
                match item {
                    Value::String(s) => println!("    - {}", s),
                    other => println!("    - {}", other),
                }
            }
            println!();
        }
    }
}

/// Write a denial in pretty format, with the required plan's price when known.
pub fn write_denial(denial: &Denial, price: Option<&str>) {
    write_header();
    match denial {
        Denial::CategoryOffline { .. } => print!("  {}", "✗ OFFLINE".yellow()),
        Denial::InsufficientTier { .. } => print!("  {}", "✗ UPGRADE REQUIRED".red()),
    }
    println!("  {}", denial);
    if let (Denial::InsufficientTier { required_plan, .. }, Some(price)) = (denial, price) {
        println!("    {} {}", required_plan.as_str().to_uppercase().bold(), price);
    }
    println!();
}

/// Write the audit history, oldest first.
pub fn write_history(entries: &[AuditEntry]) {
    write_header();
    if entries.is_empty() {
        println!("  {}", "No audit entries recorded.".dimmed());
        println!();
        return;
    }

    println!("  {} ({}):", "Audit history".bold(), entries.len());
    println!();
    for entry in entries {
        print!("    {} ", entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed());
        print!("{:<6} ", entry.category.as_str().blue());
        if entry.result_origin == crate::normalize::ResultOrigin::Fallback {
            print!("{} ", "[fallback]".yellow());
        }
        let summary: Vec<String> = entry
            .result_summary
            .iter()
            .map(|(k, v)| format!("{}={}", k, plain(v)))
            .collect();
        println!("{}", summary.join(" "));
        println!("            {}", entry.content_excerpt.dimmed());
    }
    println!();
}

/// Write the access registry.
pub fn write_users(users: &BTreeMap<String, UserAccessRecord>) {
    write_header();
    if users.is_empty() {
        println!("  {}", "No registered users.".dimmed());
        println!();
        return;
    }

    println!("  {} ({}):", "Users".bold(), users.len());
    println!();
    for (email, record) in users {
        println!(
            "    {:<32} {:<8} level {:>2}  {}  {}",
            email.blue(),
            record.tier.as_str(),
            record.access_level,
            record.plan,
            record.joined_date.dimmed()
        );
    }
    println!();
}

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "truthgate".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn write_verdict_line(result: &AnalysisResult) {
    let verdict = result.verdict().unwrap_or("unknown");
    print!("  Verdict: ");
    write_colored_verdict(result.category, verdict);

    if let Some(score) = result.score() {
        let label = match result.category {
            ContentCategory::News => "Credibility",
            ContentCategory::Tool => "Authority",
            ContentCategory::Media => "Forensic score",
            ContentCategory::Audio => "Confidence",
        };
        print!("  {}: ", label);
        if result.category == ContentCategory::Audio {
            print!("{}", score);
        } else {
            write_colored_score(score);
        }
        print!("%");
    }

    if result.category == ContentCategory::Tool {
        if let Some(risk) = result.field(&["riskLevel"]).and_then(Value::as_str) {
            print!("  Risk: {}", risk);
        }
    }
    println!();
}

/// Position of a verdict on its category's scale, 0.0 most favorable.
fn unfavorability(category: ContentCategory, verdict: &str) -> Option<f32> {
    let scale = match category {
        ContentCategory::News => NEWS_VERDICTS,
        ContentCategory::Tool => SAFETY_RATINGS,
        ContentCategory::Media => MEDIA_VERDICTS,
        ContentCategory::Audio => VOICE_VERDICTS,
    };
    let idx = scale.iter().position(|v| v.eq_ignore_ascii_case(verdict))?;
    Some(idx as f32 / (scale.len() - 1) as f32)
}

fn write_colored_verdict(category: ContentCategory, verdict: &str) {
    match unfavorability(category, verdict) {
        Some(u) if u <= 0.25 => print!("{}", verdict.green().bold()),
        Some(u) if u <= 0.5 => print!("{}", verdict.yellow()),
        Some(_) => print!("{}", verdict.red().bold()),
        None => print!("{}", verdict.yellow()),
    }
}

fn write_colored_score(s: u8) {
    match s {
        s if s >= 80 => print!("{}", s.to_string().green().bold()),
        s if s >= 60 => print!("{}", s.to_string().green()),
        s if s >= 40 => print!("{}", s.to_string().yellow()),
        s if s >= 20 => print!("{}", s.to_string().yellow().bold()),
        _ => print!("{}", s.to_string().red()),
    }
}

fn title_of(result: &AnalysisResult) -> Option<&str> {
    let key = match result.category {
        ContentCategory::News => return None,
        ContentCategory::Tool => "toolName",
        ContentCategory::Media => "mediaName",
        ContentCategory::Audio => "audioTitle",
    };
    result.report.get(key).and_then(Value::as_str)
}

fn summary_text(result: &AnalysisResult) -> Option<&str> {
    let path: &[&str] = match result.category {
        ContentCategory::News => &["summary"],
        ContentCategory::Tool => &["details"],
        ContentCategory::Media => &["tamperCheck", "method"],
        ContentCategory::Audio => &["smartSummary"],
    };
    result.field(path).and_then(Value::as_str)
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Greedy word wrap.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfavorability_scale() {
        assert_eq!(unfavorability(ContentCategory::Tool, "AAA+++"), Some(0.0));
        assert_eq!(unfavorability(ContentCategory::Tool, "F"), Some(1.0));
        assert_eq!(unfavorability(ContentCategory::Audio, "ai_generated"), Some(1.0));
        assert!(unfavorability(ContentCategory::News, "Unverified - Analysis Unavailable").is_none());
    }

    #[test]
    fn test_wrap() {
        let lines = wrap("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn test_plain_strips_quotes() {
        assert_eq!(plain(&Value::String("D".to_string())), "D");
        assert_eq!(plain(&serde_json::json!(15)), "15");
    }
}
