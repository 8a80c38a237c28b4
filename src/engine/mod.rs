//! Analysis engines.
//!
//! An engine receives the content of one request and returns its raw reply.
//! The reply is untrusted; validation happens in [`crate::normalize`].
//!
//! - [`OpenAiEngine`]: any OpenAI-compatible chat completions API
//! - [`ScriptedEngine`]: canned replies for tests and offline runs

mod openai;
mod prompts;
mod scripted;

pub use openai::OpenAiEngine;
pub use scripted::ScriptedEngine;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::{ContentCategory, MediaKind};

/// Errors that can occur while calling an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("engine call timed out")]
    Timeout,
    #[error("rate limited by engine")]
    RateLimited,
    #[error("engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("engine returned an empty completion")]
    EmptyCompletion,
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// What an engine is asked to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub category: ContentCategory,
    /// Trimmed content
    pub content: String,
    /// Media only
    pub media_kind: Option<MediaKind>,
    /// Audio only: source platform label
    pub platform: Option<String>,
}

impl EngineRequest {
    pub fn new(category: ContentCategory, content: impl Into<String>) -> Self {
        Self {
            category,
            content: content.into(),
            media_kind: None,
            platform: None,
        }
    }

    /// The wire hint forwarded with media requests.
    pub fn hint(&self) -> Option<&'static str> {
        self.media_kind.map(|k| k.as_str())
    }

    /// The first `max_chars` characters of the content.
    pub fn title(&self, max_chars: usize) -> String {
        self.content.chars().take(max_chars).collect()
    }
}

/// An external analysis collaborator.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Analyze one request and return the raw reply text.
    async fn analyze(&self, request: &EngineRequest) -> Result<String, EngineError>;
}

/// Call `engine`, bounding the call by `timeout`.
pub async fn dispatch(
    engine: &dyn AnalysisEngine,
    request: &EngineRequest,
    timeout: Duration,
) -> Result<String, EngineError> {
    debug!(engine = engine.name(), category = %request.category, "dispatching");
    let result = match tokio::time::timeout(timeout, engine.analyze(request)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout),
    };
    if let Err(e) = &result {
        warn!(engine = engine.name(), category = %request.category, error = %e, "engine call failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowEngine;

    #[async_trait]
    impl AnalysisEngine for SlowEngine {
        fn name(&self) -> &str {
            "slow"
        }

        async fn analyze(&self, _request: &EngineRequest) -> Result<String, EngineError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    #[tokio::test]
    async fn test_dispatch_times_out() {
        let req = EngineRequest::new(ContentCategory::News, "claim");
        let result = dispatch(&SlowEngine, &req, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(EngineError::Timeout)));
    }

    #[test]
    fn test_request_helpers() {
        let mut req = EngineRequest::new(ContentCategory::Media, "héllo wörld");
        assert_eq!(req.hint(), None);
        req.media_kind = Some(MediaKind::Video);
        assert_eq!(req.hint(), Some("video"));
        assert_eq!(req.title(4), "héll");
    }
}
