//! Core types shared by every stage of the dispatcher.

use serde::{Deserialize, Deserializer, Serialize};

/// The content kinds the dispatcher can route to an analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    News,
    Tool,
    Media,
    Audio,
}

impl ContentCategory {
    /// All categories, in routing order.
    pub const ALL: [ContentCategory; 4] = [
        ContentCategory::News,
        ContentCategory::Tool,
        ContentCategory::Media,
        ContentCategory::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::News => "news",
            ContentCategory::Tool => "tool",
            ContentCategory::Media => "media",
            ContentCategory::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "news" => Some(ContentCategory::News),
            "tool" => Some(ContentCategory::Tool),
            "media" => Some(ContentCategory::Media),
            "audio" => Some(ContentCategory::Audio),
            _ => None,
        }
    }

    /// Name of the engine serving this category, as reported to callers.
    pub fn engine_name(&self) -> &'static str {
        match self {
            ContentCategory::News => "news_engine",
            ContentCategory::Tool => "tool_auditor",
            ContentCategory::Media => "media_intelligence",
            ContentCategory::Audio => "audio_intelligence",
        }
    }

    /// Human-readable product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ContentCategory::News => "News Engine",
            ContentCategory::Tool => "Tool Auditor",
            ContentCategory::Media => "Media Intelligence",
            ContentCategory::Audio => "Audio Intelligence",
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Kind of visual media under audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(format!("unknown media kind: {}", s)),
        }
    }
}

/// Subscription tier. Ordering follows access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessTier {
    #[serde(alias = "NONE")]
    Free,
    Starter,
    Pure,
    Elite,
}

impl AccessTier {
    /// Base access level carried by the tier.
    pub fn access_level(&self) -> u32 {
        match self {
            AccessTier::Free => 0,
            AccessTier::Starter => 3,
            AccessTier::Pure => 7,
            AccessTier::Elite => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Free => "FREE",
            AccessTier::Starter => "STARTER",
            AccessTier::Pure => "PURE",
            AccessTier::Elite => "ELITE",
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plan, as named by the upgrade action. `Free` is the implicit plan of
/// callers without a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Starter,
    Pure,
    Elite,
}

impl Plan {
    /// Parse a plan name. Unrecognised names resolve to `Starter`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "free" => Plan::Free,
            "basic" => Plan::Basic,
            "pure" => Plan::Pure,
            "elite" => Plan::Elite,
            _ => Plan::Starter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Starter => "starter",
            Plan::Pure => "pure",
            Plan::Elite => "elite",
        }
    }

    pub fn tier(&self) -> AccessTier {
        match self {
            Plan::Free | Plan::Basic => AccessTier::Free,
            Plan::Starter => AccessTier::Starter,
            Plan::Pure => AccessTier::Pure,
            Plan::Elite => AccessTier::Elite,
        }
    }

    /// Access level granted by the plan. A registered basic plan sits one
    /// level above an anonymous caller.
    pub fn access_level(&self) -> u32 {
        match self {
            Plan::Basic => 1,
            other => other.tier().access_level(),
        }
    }
}

/// Stored plan names are free-form; anything unrecognised reads as starter.
impl<'de> Deserialize<'de> for Plan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Plan::parse_lenient(&name))
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input to the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub raw_content: String,
    #[serde(default)]
    pub category_hint: Option<ContentCategory>,
    #[serde(default)]
    pub media_kind: Option<MediaKind>,
    #[serde(default)]
    pub caller_identity: Option<String>,
}

impl AnalysisRequest {
    pub fn new(raw_content: impl Into<String>) -> Self {
        Self {
            raw_content: raw_content.into(),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, category: ContentCategory) -> Self {
        self.category_hint = Some(category);
        self
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind);
        self
    }

    pub fn with_caller(mut self, identity: impl Into<String>) -> Self {
        self.caller_identity = Some(identity.into());
        self
    }

    /// Content with surrounding whitespace removed.
    pub fn content(&self) -> &str {
        self.raw_content.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(ContentCategory::parse("news"), Some(ContentCategory::News));
        assert_eq!(ContentCategory::parse(" Media "), Some(ContentCategory::Media));
        assert_eq!(ContentCategory::parse("video"), None);
        assert!("podcast".parse::<ContentCategory>().is_err());
    }

    #[test]
    fn test_tier_levels_monotonic() {
        let tiers = [
            AccessTier::Free,
            AccessTier::Starter,
            AccessTier::Pure,
            AccessTier::Elite,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].access_level() < pair[1].access_level());
        }
    }

    #[test]
    fn test_plan_mapping() {
        assert_eq!(Plan::parse_lenient("ELITE"), Plan::Elite);
        assert_eq!(Plan::parse_lenient("gold"), Plan::Starter);
        assert_eq!(Plan::parse_lenient("free"), Plan::Free);
        assert_eq!(Plan::Free.tier(), AccessTier::Free);
        assert_eq!(Plan::Free.access_level(), 0);
        assert_eq!(Plan::Basic.tier(), AccessTier::Free);
        assert_eq!(Plan::Basic.access_level(), 1);
        assert_eq!(Plan::Pure.access_level(), 7);
    }

    #[test]
    fn test_request_serde_camel_case() {
        let req: AnalysisRequest = serde_json::from_str(
            r#"{"rawContent":"hi","categoryHint":"audio","mediaKind":"video"}"#,
        )
        .unwrap();
        assert_eq!(req.category_hint, Some(ContentCategory::Audio));
        assert_eq!(req.media_kind, Some(MediaKind::Video));
        assert!(req.caller_identity.is_none());
    }
}
