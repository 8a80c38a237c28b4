//! The persisted state document.
//!
//! Everything the dispatcher reads or mutates at runtime (feature flags,
//! monetization settings, category requirements, the access registry and
//! the audit history) lives in one JSON document. Missing keys are filled
//! from defaults on load and keys owned by other parts of the product are
//! carried through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};

use crate::category::{AccessTier, ContentCategory, Plan};
use crate::normalize::ResultOrigin;

/// Per-category administrative switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub news_engine: bool,
    #[serde(default = "default_true")]
    pub tool_auditor: bool,
    #[serde(default = "default_true")]
    pub media_intelligence: bool,
    #[serde(default = "default_true")]
    pub audio_intelligence: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            news_engine: true,
            tool_auditor: true,
            media_intelligence: true,
            audio_intelligence: true,
        }
    }
}

impl FeatureFlags {
    pub fn is_enabled(&self, category: ContentCategory) -> bool {
        *self.slot(category)
    }

    pub fn set(&mut self, category: ContentCategory, enabled: bool) {
        *self.slot_mut(category) = enabled;
    }

    /// Flip one category and return its new value.
    pub fn toggle(&mut self, category: ContentCategory) -> bool {
        let slot = self.slot_mut(category);
        *slot = !*slot;
        *slot
    }

    /// Master override: set every category at once.
    pub fn set_all(&mut self, enabled: bool) {
        for category in ContentCategory::ALL {
            self.set(category, enabled);
        }
    }

    fn slot(&self, category: ContentCategory) -> &bool {
        match category {
            ContentCategory::News => &self.news_engine,
            ContentCategory::Tool => &self.tool_auditor,
            ContentCategory::Media => &self.media_intelligence,
            ContentCategory::Audio => &self.audio_intelligence,
        }
    }

    fn slot_mut(&mut self, category: ContentCategory) -> &mut bool {
        match category {
            ContentCategory::News => &mut self.news_engine,
            ContentCategory::Tool => &mut self.tool_auditor,
            ContentCategory::Media => &mut self.media_intelligence,
            ContentCategory::Audio => &mut self.audio_intelligence,
        }
    }
}

/// Paywall switch and tier prices. Prices are display strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetizationSettings {
    #[serde(default)]
    pub paywall_enabled: bool,
    #[serde(default = "default_basic_price")]
    pub basic_price: String,
    #[serde(default = "default_starter_price")]
    pub starter_price: String,
    #[serde(default = "default_pure_price")]
    pub pure_price: String,
    #[serde(default = "default_elite_price")]
    pub elite_price: String,
}

fn default_basic_price() -> String {
    "0".to_string()
}

fn default_starter_price() -> String {
    "10".to_string()
}

fn default_pure_price() -> String {
    "25".to_string()
}

fn default_elite_price() -> String {
    "49".to_string()
}

impl Default for MonetizationSettings {
    fn default() -> Self {
        Self {
            paywall_enabled: false,
            basic_price: default_basic_price(),
            starter_price: default_starter_price(),
            pure_price: default_pure_price(),
            elite_price: default_elite_price(),
        }
    }
}

impl MonetizationSettings {
    /// Display price for a plan.
    pub fn price_of(&self, plan: Plan) -> &str {
        match plan {
            Plan::Free => "0",
            Plan::Basic => &self.basic_price,
            Plan::Starter => &self.starter_price,
            Plan::Pure => &self.pure_price,
            Plan::Elite => &self.elite_price,
        }
    }
}

/// Minimum access level for a category and the plan to advertise on denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryRequirement {
    pub level: u32,
    pub plan: Plan,
}

impl CategoryRequirement {
    pub const fn new(level: u32, plan: Plan) -> Self {
        Self { level, plan }
    }
}

/// Paywall policy table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryRequirements {
    #[serde(default = "default_news_requirement")]
    pub news: CategoryRequirement,
    #[serde(default = "default_tool_requirement")]
    pub tool: CategoryRequirement,
    #[serde(default = "default_media_requirement")]
    pub media: CategoryRequirement,
    #[serde(default = "default_audio_requirement")]
    pub audio: CategoryRequirement,
}

fn default_news_requirement() -> CategoryRequirement {
    CategoryRequirement::new(1, Plan::Starter)
}

fn default_tool_requirement() -> CategoryRequirement {
    CategoryRequirement::new(3, Plan::Starter)
}

fn default_media_requirement() -> CategoryRequirement {
    CategoryRequirement::new(7, Plan::Pure)
}

fn default_audio_requirement() -> CategoryRequirement {
    CategoryRequirement::new(1, Plan::Starter)
}

impl Default for CategoryRequirements {
    fn default() -> Self {
        Self {
            news: default_news_requirement(),
            tool: default_tool_requirement(),
            media: default_media_requirement(),
            audio: default_audio_requirement(),
        }
    }
}

impl CategoryRequirements {
    pub fn get(&self, category: ContentCategory) -> CategoryRequirement {
        match category {
            ContentCategory::News => self.news,
            ContentCategory::Tool => self.tool,
            ContentCategory::Media => self.media,
            ContentCategory::Audio => self.audio,
        }
    }

    pub fn set(&mut self, category: ContentCategory, requirement: CategoryRequirement) {
        match category {
            ContentCategory::News => self.news = requirement,
            ContentCategory::Tool => self.tool = requirement,
            ContentCategory::Media => self.media = requirement,
            ContentCategory::Audio => self.audio = requirement,
        }
    }
}

/// A caller's subscription, keyed by lower-cased identity in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccessRecord {
    #[serde(default = "default_status")]
    pub status: String,
    pub tier: AccessTier,
    pub plan: Plan,
    pub access_level: u32,
    #[serde(default)]
    pub joined_date: String,
}

fn default_status() -> String {
    "PAID".to_string()
}

impl UserAccessRecord {
    /// Record for a caller who just bought `plan`.
    pub fn for_plan(plan: Plan, joined: DateTime<Utc>) -> Self {
        Self {
            status: default_status(),
            tier: plan.tier(),
            plan,
            access_level: plan.access_level(),
            joined_date: joined.format("%Y-%m-%d").to_string(),
        }
    }

    /// Implicit record of a caller with no registry entry.
    pub fn anonymous() -> Self {
        Self {
            status: "FREE".to_string(),
            tier: AccessTier::Free,
            plan: Plan::Free,
            access_level: 0,
            joined_date: String::new(),
        }
    }
}

/// One completed analysis in the audit trail.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub category: ContentCategory,
    pub content_excerpt: String,
    pub result_summary: Map<String, Value>,
    pub result_origin: ResultOrigin,
    pub timestamp: DateTime<Utc>,
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub system_status: FeatureFlags,
    #[serde(default)]
    pub monetization_settings: MonetizationSettings,
    #[serde(default)]
    pub category_requirements: CategoryRequirements,
    #[serde(default, deserialize_with = "deserialize_registry")]
    pub user_registry: BTreeMap<String, UserAccessRecord>,
    #[serde(default)]
    pub audit_sync_enabled: bool,
    #[serde(default, deserialize_with = "deserialize_audit_history")]
    pub audit_history: VecDeque<AuditEntry>,
    /// Keys owned by other parts of the product, preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    /// Parse a document, migrating legacy layouts first.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let mut value: Value = serde_json::from_str(content)?;
        migrate_legacy(&mut value);
        serde_json::from_value(value)
    }

    /// Access record for a caller. Identities are matched case-insensitively.
    pub fn access_record(&self, identity: Option<&str>) -> UserAccessRecord {
        identity
            .map(normalize_identity)
            .and_then(|id| self.user_registry.get(&id).cloned())
            .unwrap_or_else(UserAccessRecord::anonymous)
    }
}

/// Registry key for a caller identity.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Keep the audit entries that parse; entries written by older releases in
/// a different shape are dropped rather than failing the whole load.
fn deserialize_audit_history<'de, D>(deserializer: D) -> Result<VecDeque<AuditEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    let raw = raw.unwrap_or_default();
    let total = raw.len();
    let entries: VecDeque<AuditEntry> = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if entries.len() < total {
        tracing::warn!(
            dropped = total - entries.len(),
            "skipped unreadable audit history entries"
        );
    }
    Ok(entries)
}

/// Keep the registry records that parse, like the audit history.
fn deserialize_registry<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, UserAccessRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    let mut registry = BTreeMap::new();
    for (identity, value) in raw.unwrap_or_default() {
        match serde_json::from_value(value) {
            Ok(record) => {
                registry.insert(identity, record);
            }
            Err(e) => tracing::warn!(user = %identity, error = %e, "skipped unreadable registry entry"),
        }
    }
    Ok(registry)
}

/// Rewrite legacy layouts in place: the `googleSheetsIntegration` switch
/// becomes `auditSyncEnabled` unless that key is already set, and legacy
/// monetization keys (`proPrice`, `enterprisePrice`) move to the current
/// four-tier layout.
pub fn migrate_legacy(doc: &mut Value) {
    if let Some(obj) = doc.as_object_mut() {
        if let Some(legacy) = obj.remove("googleSheetsIntegration") {
            if !obj.contains_key("auditSyncEnabled") {
                obj.insert("auditSyncEnabled".to_string(), legacy);
            }
        }
    }

    let Some(m) = doc
        .get_mut("monetizationSettings")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let present = |m: &Map<String, Value>, key: &str| m.get(key).map_or(false, |v| !v.is_null());

    if present(m, "proPrice") && !present(m, "purePrice") {
        let starter = m
            .get("basicPrice")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String("10".to_string()));
        let pro = m.get("proPrice").cloned().unwrap_or(Value::Null);
        m.insert("starterPrice".to_string(), starter);
        m.insert("purePrice".to_string(), pro);
        m.insert("basicPrice".to_string(), Value::String("0".to_string()));
    }

    if present(m, "enterprisePrice") && !present(m, "elitePrice") {
        let enterprise = m.get("enterprisePrice").cloned().unwrap_or(Value::Null);
        m.insert("elitePrice".to_string(), enterprise);
    }

    m.remove("proPrice");
    m.remove("enterprisePrice");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_flags_are_independent() {
        let mut flags = FeatureFlags::default();
        assert!(!flags.toggle(ContentCategory::Media));
        assert!(!flags.is_enabled(ContentCategory::Media));
        assert!(flags.is_enabled(ContentCategory::News));
        assert!(flags.is_enabled(ContentCategory::Tool));
        assert!(flags.is_enabled(ContentCategory::Audio));
    }

    #[test]
    fn test_master_override() {
        let mut flags = FeatureFlags::default();
        flags.set(ContentCategory::Tool, false);
        flags.set_all(true);
        assert!(ContentCategory::ALL.iter().all(|c| flags.is_enabled(*c)));
        flags.set_all(false);
        assert!(ContentCategory::ALL.iter().all(|c| !flags.is_enabled(*c)));
    }

    #[test]
    fn test_partial_document_merges_defaults() {
        let doc = ConfigDocument::from_json_str(
            r#"{"systemStatus":{"news_engine":false},"policyText":"keep me"}"#,
        )
        .unwrap();
        assert!(!doc.system_status.news_engine);
        assert!(doc.system_status.media_intelligence);
        assert!(doc.system_status.audio_intelligence);
        assert_eq!(doc.category_requirements.media.level, 7);
        assert_eq!(doc.monetization_settings.elite_price, "49");
        assert_eq!(doc.extra.get("policyText"), Some(&json!("keep me")));

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["policyText"], json!("keep me"));
    }

    #[test]
    fn test_legacy_monetization_migration() {
        let doc = ConfigDocument::from_json_str(
            r#"{"monetizationSettings":{"paywallEnabled":true,"basicPrice":"12","proPrice":"30","enterprisePrice":"99"}}"#,
        )
        .unwrap();
        let m = &doc.monetization_settings;
        assert!(m.paywall_enabled);
        assert_eq!(m.basic_price, "0");
        assert_eq!(m.starter_price, "12");
        assert_eq!(m.pure_price, "30");
        assert_eq!(m.elite_price, "99");
        assert_eq!(m.price_of(Plan::Pure), "30");
        assert!(!doc.extra.contains_key("proPrice"));
    }

    #[test]
    fn test_legacy_sync_flag() {
        let doc = ConfigDocument::from_json_str(r#"{"googleSheetsIntegration":true}"#).unwrap();
        assert!(doc.audit_sync_enabled);
        assert!(!doc.extra.contains_key("googleSheetsIntegration"));
    }

    #[test]
    fn test_current_sync_flag_wins_over_legacy() {
        let doc = ConfigDocument::from_json_str(
            r#"{"googleSheetsIntegration":false,"auditSyncEnabled":true}"#,
        )
        .unwrap();
        assert!(doc.audit_sync_enabled);
        assert!(!doc.extra.contains_key("googleSheetsIntegration"));

        let written = serde_json::to_value(&doc).unwrap();
        assert!(written.get("googleSheetsIntegration").is_none());
    }

    #[test]
    fn test_registry_tolerates_foreign_records() {
        let doc = ConfigDocument::from_json_str(
            r#"{"userRegistry":{
                "a@x.org":{"status":"PAID","tier":"STARTER","plan":"gold","accessLevel":3,"joinedDate":"2025-01-01"},
                "b@x.org":{"status":"FREE","tier":"NONE","plan":"free","accessLevel":0},
                "c@x.org":{"plan":"elite"}
            }}"#,
        )
        .unwrap();

        let gold = &doc.user_registry["a@x.org"];
        assert_eq!(gold.plan, Plan::Starter);
        assert_eq!(gold.tier, AccessTier::Starter);
        assert_eq!(gold.access_level, 3);

        let free = &doc.user_registry["b@x.org"];
        assert_eq!(free.plan, Plan::Free);
        assert_eq!(free.tier, AccessTier::Free);
        assert_eq!(free.joined_date, "");

        // Missing tier and level: dropped instead of failing the load.
        assert!(!doc.user_registry.contains_key("c@x.org"));
    }

    #[test]
    fn test_anonymous_record_is_free_plan() {
        let anon = UserAccessRecord::anonymous();
        assert_eq!(anon.plan, Plan::Free);
        assert_eq!(anon.access_level, Plan::Free.access_level());
        let value = serde_json::to_value(&anon).unwrap();
        assert_eq!(value["plan"], json!("free"));
        assert_eq!(value["tier"], json!("FREE"));
    }

    #[test]
    fn test_unreadable_history_entries_are_skipped() {
        let doc = ConfigDocument::from_json_str(
            r#"{"auditHistory":[
                {"type":"tool-audit","content":"x","result":{},"timestamp":"2025-01-01T00:00:00Z"},
                {"category":"news","contentExcerpt":"y","resultSummary":{"verdict":"False"},"resultOrigin":"engine","timestamp":"2025-01-02T00:00:00Z"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(doc.audit_history.len(), 1);
        assert_eq!(doc.audit_history[0].content_excerpt, "y");
    }

    #[test]
    fn test_access_record_lookup() {
        let mut doc = ConfigDocument::default();
        let joined = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
        doc.user_registry.insert(
            "ana@example.org".to_string(),
            UserAccessRecord::for_plan(Plan::Pure, joined),
        );

        let rec = doc.access_record(Some(" Ana@Example.org "));
        assert_eq!(rec.tier, AccessTier::Pure);
        assert_eq!(rec.access_level, 7);
        assert_eq!(rec.joined_date, "2025-03-04");

        let anon = doc.access_record(Some("nobody@example.org"));
        assert_eq!(anon.tier, AccessTier::Free);
        assert_eq!(anon.access_level, 0);
        assert_eq!(doc.access_record(None).access_level, 0);
    }
}
