//! Scripted engine with canned per-category replies.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{AnalysisEngine, EngineError, EngineRequest};
use crate::category::ContentCategory;

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(String),
}

/// Deterministic in-process engine.
///
/// Categories without a script fail, which drives the fallback path. Every
/// call is counted, including failed ones.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    scripts: HashMap<ContentCategory, Script>,
    call_count: AtomicU32,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `raw` for every request in `category`.
    pub fn with_reply(mut self, category: ContentCategory, raw: impl Into<String>) -> Self {
        self.scripts.insert(category, Script::Reply(raw.into()));
        self
    }

    /// Fail every request in `category`.
    pub fn with_failure(mut self, category: ContentCategory, reason: impl Into<String>) -> Self {
        self.scripts.insert(category, Script::Fail(reason.into()));
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, request: &EngineRequest) -> Result<String, EngineError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(&request.category) {
            Some(Script::Reply(raw)) => Ok(raw.clone()),
            Some(Script::Fail(reason)) => Err(EngineError::Unavailable(reason.clone())),
            None => Err(EngineError::Unavailable(format!(
                "no script for {}",
                request.category
            ))),
        }
    }
}
