//! Audit trail: a bounded history of completed analyses.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::category::ContentCategory;
use crate::engine::EngineRequest;
use crate::normalize::AnalysisResult;
use crate::settings::AuditSettings;
use crate::state::{AuditEntry, ConfigDocument};
use crate::store::{ConfigStore, StoreError};

/// Ring-buffer policy over the store's `auditHistory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditTrail {
    capacity: usize,
    excerpt_chars: usize,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::from_settings(&AuditSettings::default())
    }
}

impl AuditTrail {
    pub fn new(capacity: usize, excerpt_chars: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            excerpt_chars,
        }
    }

    pub fn from_settings(settings: &AuditSettings) -> Self {
        Self::new(settings.capacity, settings.excerpt_chars)
    }

    /// Append an entry for `result` if the trail is switched on. Returns
    /// whether an entry was written.
    pub fn record(
        &self,
        store: &ConfigStore,
        request: &EngineRequest,
        result: &AnalysisResult,
    ) -> Result<bool, StoreError> {
        if !store.read(|doc| doc.audit_sync_enabled)? {
            return Ok(false);
        }

        let entry = AuditEntry {
            category: result.category,
            content_excerpt: excerpt(&request.content, self.excerpt_chars),
            result_summary: summarize(result),
            result_origin: result.result_origin,
            timestamp: Utc::now(),
        };

        let len = store.update(|doc| self.append(doc, entry))?;
        debug!(category = %result.category, entries = len, "audit entry recorded");
        Ok(true)
    }

    /// Append and trim to capacity, evicting the oldest first. Returns the
    /// resulting length.
    pub fn append(&self, doc: &mut ConfigDocument, entry: AuditEntry) -> usize {
        doc.audit_history.push_back(entry);
        while doc.audit_history.len() > self.capacity {
            doc.audit_history.pop_front();
        }
        doc.audit_history.len()
    }

    /// Entries, oldest first.
    pub fn read(store: &ConfigStore) -> Result<Vec<AuditEntry>, StoreError> {
        store.read(|doc| doc.audit_history.iter().cloned().collect())
    }
}

/// The first `max_chars` characters of `content`.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}

/// Category-specific subset of a result kept in the trail.
pub fn summarize(result: &AnalysisResult) -> Map<String, Value> {
    let fields: &[(&str, &[&str])] = match result.category {
        ContentCategory::News => &[
            ("verdict", &["verdict"]),
            ("credibilityScore", &["credibilityScore"]),
        ],
        ContentCategory::Tool => &[
            ("toolName", &["toolName"]),
            ("safetyRating", &["safetyRating"]),
            ("riskLevel", &["riskLevel"]),
        ],
        ContentCategory::Media => &[
            ("mediaName", &["mediaName"]),
            ("verdict", &["verdict"]),
            ("forensicScore", &["forensicScore"]),
            ("authenticityProbability", &["authenticityProbability"]),
        ],
        ContentCategory::Audio => &[
            ("audioTitle", &["audioTitle"]),
            ("platform", &["platform"]),
            ("voiceVerdict", &["voiceAudit", "verdict"]),
            ("confidence", &["voiceAudit", "confidence"]),
        ],
    };

    fields
        .iter()
        .filter_map(|(key, path)| result.field(path).map(|v| (key.to_string(), v.clone())))
        .collect()
}
