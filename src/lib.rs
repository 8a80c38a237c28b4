//! Truthgate - content intelligence dispatcher.
//!
//! Truthgate takes free-form content (a news claim, a tool URL, an image or
//! video link, an audio source), decides which analysis it needs, checks
//! that the category is switched on and that the caller's tier covers it,
//! asks an external engine for a structured report, and records the outcome
//! in a bounded audit trail.
//!
//! # Architecture
//!
//! - `classify`: maps content to a [`ContentCategory`]
//! - `access`: feature-flag and paywall gate
//! - `engine`: the [`AnalysisEngine`] trait and its implementations
//! - `normalize`: validates engine replies, substitutes fallbacks
//! - `audit`: ring-buffer history of completed analyses
//! - `store`: the persisted [`ConfigDocument`] behind a lock
//! - `dispatcher`: runs the pipeline end to end
//! - `admin`: privileged operations on the state
//! - `server`: HTTP surface (axum)
//! - `cli` / `report`: command-line surface and output formatting
//!
//! The engine is untrusted. Whatever it returns, callers get a result that
//! matches its category's schema, and a failed analysis never reads as a
//! favorable one.

pub mod access;
pub mod admin;
pub mod audit;
pub mod category;
pub mod classify;
pub mod cli;
pub mod dispatcher;
pub mod engine;
pub mod normalize;
pub mod report;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;

pub use access::{check_access, AccessDecision, Denial};
pub use admin::{Admin, AdminError, AdminGrant, ControlTarget};
pub use audit::AuditTrail;
pub use category::{AccessTier, AnalysisRequest, ContentCategory, MediaKind, Plan};
pub use classify::classify;
pub use dispatcher::{DispatchError, Dispatcher};
pub use engine::{AnalysisEngine, EngineError, EngineRequest, OpenAiEngine, ScriptedEngine};
pub use normalize::{normalize, AnalysisResult, ResultOrigin};
pub use server::{build_router, AppState};
pub use settings::Settings;
pub use state::{ConfigDocument, FeatureFlags, UserAccessRecord};
pub use store::{ConfigStore, StoreError};
