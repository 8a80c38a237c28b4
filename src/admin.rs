//! Privileged operations on the state document.
//!
//! Every operation goes through [`Admin`], which can only be built from an
//! [`AdminGrant`]. Over HTTP the grant comes from the shared-secret check;
//! the local CLI grants itself access, since it already owns the state file.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::audit::AuditTrail;
use crate::category::{AccessTier, ContentCategory, Plan};
use crate::state::{
    normalize_identity, AuditEntry, CategoryRequirement, CategoryRequirements, FeatureFlags,
    MonetizationSettings, UserAccessRecord,
};
use crate::store::{ConfigStore, StoreError};

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("admin access is not configured")]
    NotConfigured,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Proof that the caller passed the admin check.
#[derive(Debug)]
pub struct AdminGrant(());

impl AdminGrant {
    /// Check a presented key against the configured secret. With no secret
    /// configured nobody is admitted.
    pub fn verify(secret: Option<&str>, presented: Option<&str>) -> Result<Self, AdminError> {
        let secret = secret.ok_or(AdminError::NotConfigured)?;
        match presented {
            Some(key) if constant_time_eq(secret.as_bytes(), key.as_bytes()) => Ok(AdminGrant(())),
            _ => Err(AdminError::Unauthorized),
        }
    }

    /// Grant for local CLI use.
    pub fn local() -> Self {
        AdminGrant(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Target of a flag control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTarget {
    /// Flip one category.
    Toggle(ContentCategory),
    AllOn,
    AllOff,
}

impl ControlTarget {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "master_override_all_on" | "all_on" => Some(ControlTarget::AllOn),
            "master_override_all_off" | "all_off" => Some(ControlTarget::AllOff),
            other => ContentCategory::parse(other)
                .or_else(|| {
                    ContentCategory::ALL
                        .into_iter()
                        .find(|c| c.engine_name() == other)
                })
                .map(ControlTarget::Toggle),
        }
    }
}

impl std::str::FromStr for ControlTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown control target: {}", s))
    }
}

/// Partial monetization update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetizationUpdate {
    pub paywall_enabled: Option<bool>,
    pub basic_price: Option<String>,
    pub starter_price: Option<String>,
    pub pure_price: Option<String>,
    pub elite_price: Option<String>,
}

/// Handle for privileged operations.
pub struct Admin<'a> {
    store: &'a ConfigStore,
}

impl<'a> Admin<'a> {
    pub fn new(store: &'a ConfigStore, _grant: AdminGrant) -> Self {
        Self { store }
    }

    /// Apply a flag control action and return the resulting flags.
    pub fn control(&self, target: ControlTarget) -> Result<FeatureFlags, AdminError> {
        let flags = self.store.update(|doc| {
            match target {
                ControlTarget::Toggle(category) => {
                    doc.system_status.toggle(category);
                }
                ControlTarget::AllOn => doc.system_status.set_all(true),
                ControlTarget::AllOff => doc.system_status.set_all(false),
            }
            doc.system_status.clone()
        })?;
        info!(?target, "feature flags updated");
        Ok(flags)
    }

    pub fn update_monetization(
        &self,
        update: MonetizationUpdate,
    ) -> Result<MonetizationSettings, AdminError> {
        let prices = [
            &update.basic_price,
            &update.starter_price,
            &update.pure_price,
            &update.elite_price,
        ];
        if prices.iter().any(|p| p.as_deref().map_or(false, |p| p.trim().is_empty())) {
            return Err(AdminError::InvalidInput("prices must not be empty".to_string()));
        }

        let settings = self.store.update(|doc| {
            let m = &mut doc.monetization_settings;
            if let Some(enabled) = update.paywall_enabled {
                m.paywall_enabled = enabled;
            }
            if let Some(price) = update.basic_price {
                m.basic_price = price.trim().to_string();
            }
            if let Some(price) = update.starter_price {
                m.starter_price = price.trim().to_string();
            }
            if let Some(price) = update.pure_price {
                m.pure_price = price.trim().to_string();
            }
            if let Some(price) = update.elite_price {
                m.elite_price = price.trim().to_string();
            }
            m.clone()
        })?;
        info!(paywall = settings.paywall_enabled, "monetization updated");
        Ok(settings)
    }

    pub fn set_requirement(
        &self,
        category: ContentCategory,
        requirement: CategoryRequirement,
    ) -> Result<CategoryRequirements, AdminError> {
        let max = AccessTier::Elite.access_level();
        if requirement.level > max {
            return Err(AdminError::InvalidInput(format!(
                "level {} exceeds the highest tier level {}",
                requirement.level, max
            )));
        }
        let requirements = self.store.update(|doc| {
            doc.category_requirements.set(category, requirement);
            doc.category_requirements.clone()
        })?;
        info!(category = %category, level = requirement.level, plan = %requirement.plan, "requirement set");
        Ok(requirements)
    }

    /// Switch the audit trail; `None` flips the current value.
    pub fn set_audit_sync(&self, enabled: Option<bool>) -> Result<bool, AdminError> {
        let now = self.store.update(|doc| {
            doc.audit_sync_enabled = enabled.unwrap_or(!doc.audit_sync_enabled);
            doc.audit_sync_enabled
        })?;
        info!(enabled = now, "audit trail switched");
        Ok(now)
    }

    pub fn history(&self) -> Result<Vec<AuditEntry>, AdminError> {
        Ok(AuditTrail::read(self.store)?)
    }

    /// Grant `plan` to `email`. Unrecognised plan names resolve to starter.
    pub fn upgrade_user(&self, email: &str, plan: &str) -> Result<UserAccessRecord, AdminError> {
        let key = validate_email(email)?;
        let plan = Plan::parse_lenient(plan);
        let record = UserAccessRecord::for_plan(plan, Utc::now());
        let stored = record.clone();
        self.store.update(|doc| {
            doc.user_registry.insert(key.clone(), stored);
        })?;
        info!(user = %key, plan = %plan, "user upgraded");
        Ok(record)
    }

    pub fn remove_user(&self, email: &str) -> Result<UserAccessRecord, AdminError> {
        let key = normalize_identity(email);
        let removed = self.store.try_update(|doc| {
            doc.user_registry
                .remove(&key)
                .ok_or_else(|| AdminError::UserNotFound(key.clone()))
        })?;
        info!(user = %key, "user removed");
        Ok(removed)
    }

    pub fn list_users(&self) -> Result<BTreeMap<String, UserAccessRecord>, AdminError> {
        Ok(self.store.read(|doc| doc.user_registry.clone())?)
    }
}

fn validate_email(email: &str) -> Result<String, AdminError> {
    let key = normalize_identity(email);
    if key.is_empty() || !key.contains('@') || key.chars().any(char::is_whitespace) {
        return Err(AdminError::InvalidInput(format!("invalid email: {:?}", email)));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConfigDocument;

    fn store() -> ConfigStore {
        ConfigStore::in_memory(ConfigDocument::default())
    }

    #[test]
    fn test_grant_verification() {
        assert!(AdminGrant::verify(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(matches!(
            AdminGrant::verify(Some("s3cret"), Some("wrong!")),
            Err(AdminError::Unauthorized)
        ));
        assert!(matches!(
            AdminGrant::verify(Some("s3cret"), None),
            Err(AdminError::Unauthorized)
        ));
        assert!(matches!(
            AdminGrant::verify(None, Some("anything")),
            Err(AdminError::NotConfigured)
        ));
    }

    #[test]
    fn test_control_target_parse() {
        assert_eq!(
            ControlTarget::parse("media"),
            Some(ControlTarget::Toggle(ContentCategory::Media))
        );
        assert_eq!(
            ControlTarget::parse("audio_intelligence"),
            Some(ControlTarget::Toggle(ContentCategory::Audio))
        );
        assert_eq!(ControlTarget::parse("master_override_all_off"), Some(ControlTarget::AllOff));
        assert_eq!(ControlTarget::parse("everything"), None);
    }

    #[test]
    fn test_control_toggle_and_master() {
        let store = store();
        let admin = Admin::new(&store, AdminGrant::local());

        let flags = admin.control(ControlTarget::Toggle(ContentCategory::News)).unwrap();
        assert!(!flags.news_engine);
        assert!(flags.tool_auditor);

        let flags = admin.control(ControlTarget::AllOff).unwrap();
        assert!(ContentCategory::ALL.iter().all(|c| !flags.is_enabled(*c)));
        let flags = admin.control(ControlTarget::AllOn).unwrap();
        assert!(ContentCategory::ALL.iter().all(|c| flags.is_enabled(*c)));
    }

    #[test]
    fn test_monetization_partial_update() {
        let store = store();
        let admin = Admin::new(&store, AdminGrant::local());
        let m = admin
            .update_monetization(MonetizationUpdate {
                paywall_enabled: Some(true),
                pure_price: Some(" 30 ".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(m.paywall_enabled);
        assert_eq!(m.pure_price, "30");
        assert_eq!(m.starter_price, "10");

        assert!(admin
            .update_monetization(MonetizationUpdate {
                elite_price: Some("".to_string()),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn test_requirement_bounds() {
        let store = store();
        let admin = Admin::new(&store, AdminGrant::local());
        let reqs = admin
            .set_requirement(ContentCategory::Audio, CategoryRequirement::new(7, Plan::Pure))
            .unwrap();
        assert_eq!(reqs.audio, CategoryRequirement::new(7, Plan::Pure));
        assert!(admin
            .set_requirement(ContentCategory::Audio, CategoryRequirement::new(11, Plan::Elite))
            .is_err());
    }

    #[test]
    fn test_upgrade_and_remove_user() {
        let store = store();
        let admin = Admin::new(&store, AdminGrant::local());

        let rec = admin.upgrade_user("Dee@Example.org", "platinum").unwrap();
        assert_eq!(rec.plan, Plan::Starter);
        assert_eq!(rec.tier, AccessTier::Starter);
        assert_eq!(rec.access_level, 3);
        assert_eq!(rec.status, "PAID");

        let users = admin.list_users().unwrap();
        assert!(users.contains_key("dee@example.org"));

        assert!(matches!(admin.upgrade_user("not-an-email", "pure"), Err(AdminError::InvalidInput(_))));

        admin.remove_user("DEE@example.org").unwrap();
        assert!(matches!(
            admin.remove_user("dee@example.org"),
            Err(AdminError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_audit_sync_toggle() {
        let store = store();
        let admin = Admin::new(&store, AdminGrant::local());
        assert!(admin.set_audit_sync(None).unwrap());
        assert!(!admin.set_audit_sync(None).unwrap());
        assert!(admin.set_audit_sync(Some(true)).unwrap());
        assert!(admin.history().unwrap().is_empty());
    }
}
