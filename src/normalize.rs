//! Result normalization.
//!
//! The analysis engine is untrusted: its reply is validated against the
//! category's schema, numeric scores are clamped into 0-100, and anything
//! unusable is replaced by a deterministic fallback report. Fallbacks sit
//! on the suspicious end of each category's verdict scale so that a failed
//! analysis never reads as a clean bill of health.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::{ContentCategory, MediaKind};
use crate::engine::{EngineError, EngineRequest};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultOrigin {
    Engine,
    Fallback,
}

impl ResultOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultOrigin::Engine => "engine",
            ResultOrigin::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ResultOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Values used by the fallback reports.
pub mod fallback {
    pub const NEWS_VERDICT: &str = "Unverified - Analysis Unavailable";
    pub const NEWS_CREDIBILITY: u8 = 15;
    pub const TOOL_SAFETY_RATING: &str = "D";
    pub const TOOL_RISK_LEVEL: &str = "High";
    pub const MEDIA_VERDICT: &str = "LIKELY_MANIPULATED";
    pub const MEDIA_FORENSIC_SCORE: u8 = 15;
    pub const MEDIA_AUTHENTICITY: u8 = 10;
    pub const AUDIO_VERDICT: &str = "AI_GENERATED";
    pub const AUDIO_CONFIDENCE: u8 = 20;
    /// Characters of content used as a title in fallback reports.
    pub const TITLE_CHARS: usize = 50;
}

/// Tool safety ratings, most favorable first.
pub const SAFETY_RATINGS: &[&str] = &["AAA+++", "AA+", "A", "B", "D", "F"];

/// Tool risk levels, least risky first.
pub const RISK_LEVELS: &[&str] = &["Minimal", "Low", "Medium", "High", "Critical"];

/// Media verdicts, most favorable first.
pub const MEDIA_VERDICTS: &[&str] = &[
    "AUTHENTIC",
    "LIKELY_AUTHENTIC",
    "INCONCLUSIVE",
    "LIKELY_MANIPULATED",
    "MANIPULATED",
    "SYNTHETIC",
];

/// Voice verdicts, most favorable first.
pub const VOICE_VERDICTS: &[&str] = &["HUMAN", "MIXED", "INCONCLUSIVE", "AI_GENERATED"];

/// Optional score fields clamped when present.
fn optional_scores(category: ContentCategory) -> &'static [&'static [&'static str]] {
    match category {
        ContentCategory::News => &[&["motiveAnalysis", "confidenceLevel"]],
        ContentCategory::Tool => &[&["globalAuthorityScore"], &["resultAccuracy"]],
        ContentCategory::Media => &[&["aiDetection", "confidence"]],
        ContentCategory::Audio => &[
            &["voiceAudit", "naturalness"],
            &["languageAnalysis", "confidence"],
            &["audioQuality", "overallScore"],
        ],
    }
}

/// Why an engine reply was rejected.
#[derive(Error, Debug)]
pub enum RejectReason {
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("reply is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("reply is not a JSON object")]
    NotObject,
    #[error("missing required field {0:?}")]
    MissingField(&'static str),
    #[error("invalid value for {field:?}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// A normalized, schema-valid analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(skip)]
    pub category: ContentCategory,
    #[serde(flatten)]
    pub report: Map<String, Value>,
    pub result_origin: ResultOrigin,
    pub received_at: DateTime<Utc>,
}

impl AnalysisResult {
    fn new(category: ContentCategory, report: Map<String, Value>, origin: ResultOrigin) -> Self {
        Self {
            category,
            report,
            result_origin: origin,
            received_at: Utc::now(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.result_origin == ResultOrigin::Fallback
    }

    /// Look up a (possibly nested) report field.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.report, path)
    }

    /// The category's primary verdict.
    pub fn verdict(&self) -> Option<&str> {
        self.field(verdict_path(self.category)).and_then(Value::as_str)
    }

    /// The category's primary 0-100 score, if it has one.
    pub fn score(&self) -> Option<u8> {
        let path: &[&str] = match self.category {
            ContentCategory::News => &["credibilityScore"],
            ContentCategory::Tool => &["globalAuthorityScore"],
            ContentCategory::Media => &["forensicScore"],
            ContentCategory::Audio => &["voiceAudit", "confidence"],
        };
        self.field(path)
            .and_then(Value::as_u64)
            .map(|v| v.min(100) as u8)
    }
}

fn verdict_path(category: ContentCategory) -> &'static [&'static str] {
    match category {
        ContentCategory::News => &["verdict"],
        ContentCategory::Tool => &["safetyRating"],
        ContentCategory::Media => &["verdict"],
        ContentCategory::Audio => &["voiceAudit", "verdict"],
    }
}

/// Normalize an engine reply (or failure) into a result.
pub fn normalize(request: &EngineRequest, output: Result<String, EngineError>) -> AnalysisResult {
    let category = request.category;
    let parsed = output
        .map_err(RejectReason::from)
        .and_then(|raw| parse_report(category, &raw));

    match parsed {
        Ok(report) => {
            debug!(category = %category, "engine reply accepted");
            AnalysisResult::new(category, report, ResultOrigin::Engine)
        }
        Err(reason) => {
            warn!(category = %category, reason = %reason, "engine reply unusable, applying fallback");
            AnalysisResult::new(category, fallback_report(request), ResultOrigin::Fallback)
        }
    }
}

/// Validate a raw engine reply against the category schema.
pub fn parse_report(category: ContentCategory, raw: &str) -> Result<Map<String, Value>, RejectReason> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(mut report) = value else {
        return Err(RejectReason::NotObject);
    };

    // Cross-cutting fields are owned by the normalizer.
    report.remove("resultOrigin");
    report.remove("receivedAt");

    match category {
        ContentCategory::News => {
            require_text(&report, "verdict")?;
            require_score(&mut report, &["credibilityScore"], "credibilityScore")?;
        }
        ContentCategory::Tool => {
            require_choice(&mut report, &["safetyRating"], "safetyRating", SAFETY_RATINGS)?;
            require_choice(&mut report, &["riskLevel"], "riskLevel", RISK_LEVELS)?;
        }
        ContentCategory::Media => {
            require_choice(&mut report, &["verdict"], "verdict", MEDIA_VERDICTS)?;
            require_score(&mut report, &["forensicScore"], "forensicScore")?;
            require_score(
                &mut report,
                &["authenticityProbability"],
                "authenticityProbability",
            )?;
        }
        ContentCategory::Audio => {
            require_choice(
                &mut report,
                &["voiceAudit", "verdict"],
                "voiceAudit.verdict",
                VOICE_VERDICTS,
            )?;
            require_score(&mut report, &["voiceAudit", "confidence"], "voiceAudit.confidence")?;
        }
    }

    for path in optional_scores(category) {
        if let Some(slot) = lookup_mut(&mut report, path) {
            if let Some(score) = parse_score(slot) {
                *slot = json!(score);
            }
        }
    }

    Ok(report)
}

/// Build the pessimistic fallback report for a request.
pub fn fallback_report(request: &EngineRequest) -> Map<String, Value> {
    let title = request.title(fallback::TITLE_CHARS);
    let value = match request.category {
        ContentCategory::News => json!({
            "verdict": fallback::NEWS_VERDICT,
            "credibilityScore": fallback::NEWS_CREDIBILITY,
            "summary": "The verification engine did not return a usable analysis. Treat this content as unverified until it can be checked again.",
            "sources": [],
            "claimsAnalyzed": [],
            "flaggedClaims": ["Content could not be verified automatically"],
        }),
        ContentCategory::Tool => json!({
            "toolName": title,
            "safetyRating": fallback::TOOL_SAFETY_RATING,
            "legitimacy": "Unknown Publisher",
            "userTrust": "Low",
            "riskLevel": fallback::TOOL_RISK_LEVEL,
            "details": "The audit engine did not return a usable assessment. Default caution applies until the tool is verified.",
            "recommendations": [
                "Verify the publisher through an official source before installing",
                "Re-submit the audit later",
            ],
            "flags": ["Automated audit unavailable - default caution applied"],
        }),
        ContentCategory::Media => json!({
            "mediaName": title,
            "mediaType": request.media_kind.unwrap_or(MediaKind::Image).as_str(),
            "verdict": fallback::MEDIA_VERDICT,
            "forensicScore": fallback::MEDIA_FORENSIC_SCORE,
            "authenticityProbability": fallback::MEDIA_AUTHENTICITY,
            "flags": [
                "Forensic scan unavailable - unable to verify authenticity",
                "High doubt default applied",
            ],
            "recommendations": [
                "Re-submit with a higher quality source",
                "Verify through an alternative forensic tool",
            ],
        }),
        ContentCategory::Audio => json!({
            "audioTitle": title,
            "platform": request.platform.as_deref().unwrap_or(crate::classify::DIRECT_UPLOAD),
            "transcription": "Unavailable.",
            "smartSummary": "Analysis could not be completed.",
            "voiceAudit": {
                "verdict": fallback::AUDIO_VERDICT,
                "confidence": fallback::AUDIO_CONFIDENCE,
                "detectedModel": "Unknown",
                "naturalness": 10,
                "breathingPatterns": "ABSENT",
                "microExpressions": "ABSENT",
                "pitchVariation": "MONOTONE",
                "finding": "Voice authenticity could not be verified; AI suspicion applied by default.",
            },
            "riskAssessment": "HIGH_RISK",
            "flags": [
                "Voice analysis unavailable - unable to verify authenticity",
                "Default AI suspicion applied",
            ],
            "recommendations": [
                "Re-submit with a higher quality audio source",
                "Verify through an alternative voice analysis tool",
            ],
        }),
    };

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

fn lookup_mut<'a>(map: &'a mut Map<String, Value>, path: &[&str]) -> Option<&'a mut Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get_mut(*first)?;
    for key in rest {
        current = current.as_object_mut()?.get_mut(*key)?;
    }
    Some(current)
}

fn require_text(report: &Map<String, Value>, field: &'static str) -> Result<(), RejectReason> {
    match report.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        Some(other) => Err(RejectReason::InvalidValue {
            field,
            value: other.to_string(),
        }),
        None => Err(RejectReason::MissingField(field)),
    }
}

/// Require a 0-100 score and rewrite it as a clamped integer.
fn require_score(
    report: &mut Map<String, Value>,
    path: &[&str],
    field: &'static str,
) -> Result<(), RejectReason> {
    let slot = lookup_mut(report, path).ok_or(RejectReason::MissingField(field))?;
    let score = parse_score(slot).ok_or_else(|| RejectReason::InvalidValue {
        field,
        value: slot.to_string(),
    })?;
    *slot = json!(score);
    Ok(())
}

/// Require one of a fixed set of labels and rewrite it in canonical form.
fn require_choice(
    report: &mut Map<String, Value>,
    path: &[&str],
    field: &'static str,
    choices: &[&str],
) -> Result<(), RejectReason> {
    let slot = lookup_mut(report, path).ok_or(RejectReason::MissingField(field))?;
    let canonical = slot
        .as_str()
        .and_then(|s| canonical_choice(s, choices))
        .ok_or_else(|| RejectReason::InvalidValue {
            field,
            value: slot.to_string(),
        })?;
    *slot = Value::String(canonical.to_string());
    Ok(())
}

fn canonical_choice<'a>(raw: &str, choices: &[&'a str]) -> Option<&'a str> {
    let wanted = raw.trim().replace([' ', '-'], "_");
    choices
        .iter()
        .find(|c| c.replace([' ', '-'], "_").eq_ignore_ascii_case(&wanted))
        .copied()
}

/// Parse a score from a number or a numeric string ("72", "72%"), clamped
/// into 0-100.
pub fn parse_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}
