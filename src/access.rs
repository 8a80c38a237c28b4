//! Access gate: feature flags first, then the paywall.

use serde::Serialize;

use crate::category::{AccessTier, ContentCategory, Plan};
use crate::state::{ConfigDocument, UserAccessRecord};

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum Denial {
    /// The category is switched off by an administrator.
    #[serde(rename_all = "camelCase")]
    CategoryOffline { category: ContentCategory },
    /// The caller's tier is below the category's minimum.
    #[serde(rename_all = "camelCase")]
    InsufficientTier {
        category: ContentCategory,
        required_plan: Plan,
        required_level: u32,
        current_tier: AccessTier,
        current_level: u32,
    },
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::CategoryOffline { category } => write!(
                f,
                "{} is currently offline by admin",
                category.display_name()
            ),
            Denial::InsufficientTier {
                category,
                required_plan,
                current_tier,
                ..
            } => write!(
                f,
                "your current plan ({}) does not include {} access, upgrade to {} or higher",
                current_tier,
                category.display_name(),
                required_plan.as_str().to_uppercase()
            ),
        }
    }
}

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(UserAccessRecord),
    Denied(Denial),
}

/// Decide whether `caller` may run an analysis in `category`.
///
/// The flag check always runs first, so a disabled category never reveals
/// anything about the caller's tier.
pub fn check_access(
    doc: &ConfigDocument,
    category: ContentCategory,
    caller: Option<&str>,
) -> AccessDecision {
    if !doc.system_status.is_enabled(category) {
        return AccessDecision::Denied(Denial::CategoryOffline { category });
    }

    let record = doc.access_record(caller);
    if !doc.monetization_settings.paywall_enabled {
        return AccessDecision::Allowed(record);
    }

    let requirement = doc.category_requirements.get(category);
    if record.access_level >= requirement.level {
        AccessDecision::Allowed(record)
    } else {
        AccessDecision::Denied(Denial::InsufficientTier {
            category,
            required_plan: requirement.plan,
            required_level: requirement.level,
            current_tier: record.tier,
            current_level: record.access_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn paywalled() -> ConfigDocument {
        let mut doc = ConfigDocument::default();
        doc.monetization_settings.paywall_enabled = true;
        doc
    }

    #[test]
    fn test_paywall_off_allows_anonymous() {
        let doc = ConfigDocument::default();
        for category in ContentCategory::ALL {
            assert!(matches!(
                check_access(&doc, category, None),
                AccessDecision::Allowed(_)
            ));
        }
    }

    #[test]
    fn test_flag_checked_before_tier() {
        let mut doc = paywalled();
        doc.system_status.set(ContentCategory::Media, false);
        assert_eq!(
            check_access(&doc, ContentCategory::Media, None),
            AccessDecision::Denied(Denial::CategoryOffline {
                category: ContentCategory::Media
            })
        );
    }

    #[test]
    fn test_insufficient_tier() {
        let mut doc = paywalled();
        doc.user_registry.insert(
            "bo@example.org".to_string(),
            UserAccessRecord::for_plan(Plan::Starter, Utc::now()),
        );

        match check_access(&doc, ContentCategory::Media, Some("BO@example.org")) {
            AccessDecision::Denied(Denial::InsufficientTier {
                required_plan,
                current_tier,
                required_level,
                ..
            }) => {
                assert_eq!(required_plan, Plan::Pure);
                assert_eq!(current_tier, AccessTier::Starter);
                assert_eq!(required_level, 7);
            }
            other => panic!("expected tier denial, got {:?}", other),
        }

        assert!(matches!(
            check_access(&doc, ContentCategory::Tool, Some("bo@example.org")),
            AccessDecision::Allowed(_)
        ));
    }

    #[test]
    fn test_level_boundary_is_inclusive() {
        let mut doc = paywalled();
        doc.user_registry.insert(
            "cy@example.org".to_string(),
            UserAccessRecord::for_plan(Plan::Basic, Utc::now()),
        );
        // Basic carries level 1, exactly the News minimum.
        assert!(matches!(
            check_access(&doc, ContentCategory::News, Some("cy@example.org")),
            AccessDecision::Allowed(_)
        ));
        // Anonymous callers sit at 0.
        assert!(matches!(
            check_access(&doc, ContentCategory::News, None),
            AccessDecision::Denied(Denial::InsufficientTier { .. })
        ));
    }

    #[test]
    fn test_denial_serializes_with_reason() {
        let denial = Denial::CategoryOffline {
            category: ContentCategory::Audio,
        };
        let value = serde_json::to_value(&denial).unwrap();
        assert_eq!(value["reason"], "categoryOffline");
        assert_eq!(value["category"], "audio");
    }
}
