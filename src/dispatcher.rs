//! The analysis pipeline: classify, gate, dispatch, normalize, audit.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::access::{check_access, AccessDecision, Denial};
use crate::audit::AuditTrail;
use crate::category::{AnalysisRequest, ContentCategory};
use crate::classify::{classify, detect_platform, infer_media_kind};
use crate::engine::{self, AnalysisEngine, EngineRequest};
use crate::normalize::{normalize, AnalysisResult};
use crate::settings::Settings;
use crate::store::{ConfigStore, StoreError};

/// Default bound on a single engine call.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest accepted content, in characters after trimming.
pub const MIN_CONTENT_CHARS: usize = 3;

/// Why a request produced no result.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Denied(Denial),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// The denial, if the request was turned away by the gate.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            DispatchError::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

/// Runs analysis requests against a shared store and engine.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<ConfigStore>,
    engine: Arc<dyn AnalysisEngine>,
    audit: AuditTrail,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<ConfigStore>, engine: Arc<dyn AnalysisEngine>) -> Self {
        Self {
            store,
            engine,
            audit: AuditTrail::default(),
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<ConfigStore>,
        engine: Arc<dyn AnalysisEngine>,
    ) -> Self {
        Self::new(store, engine)
            .with_audit(AuditTrail::from_settings(&settings.audit))
            .with_timeout(settings.engine.timeout())
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Analyze one request.
    ///
    /// Denials are decided before the engine is contacted. Engine failures
    /// never surface here; they come back as fallback results.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, DispatchError> {
        let content = request.content();
        if content.chars().count() < MIN_CONTENT_CHARS {
            return Err(DispatchError::InvalidRequest(format!(
                "content must be at least {} characters",
                MIN_CONTENT_CHARS
            )));
        }

        let category = classify(request);
        let span = info_span!(
            "analyze",
            category = %category,
            caller = request.caller_identity.as_deref().unwrap_or("anonymous")
        );

        async move {
            let decision = self.store.read(|doc| {
                check_access(doc, category, request.caller_identity.as_deref())
            })?;
            if let AccessDecision::Denied(denial) = decision {
                info!(%denial, "request denied");
                return Err(DispatchError::Denied(denial));
            }

            let engine_request = engine_request(category, content, request);
            let output = engine::dispatch(self.engine.as_ref(), &engine_request, self.timeout).await;
            let result = normalize(&engine_request, output);

            self.record_audit(engine_request, &result).await;

            info!(origin = %result.result_origin, "analysis complete");
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

impl Dispatcher {
    /// Persisting the trail rewrites the state file, so it runs on the
    /// blocking pool instead of a runtime worker.
    async fn record_audit(&self, engine_request: EngineRequest, result: &AnalysisResult) {
        let store = Arc::clone(&self.store);
        let audit = self.audit;
        let result = result.clone();
        let outcome =
            tokio::task::spawn_blocking(move || audit.record(&store, &engine_request, &result)).await;
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to record audit entry"),
            Err(e) => warn!(error = %e, "audit task failed"),
        }
    }
}

fn engine_request(category: ContentCategory, content: &str, request: &AnalysisRequest) -> EngineRequest {
    let mut engine_request = EngineRequest::new(category, content);
    match category {
        ContentCategory::Media => engine_request.media_kind = Some(infer_media_kind(request)),
        ContentCategory::Audio => engine_request.platform = Some(detect_platform(content).to_string()),
        ContentCategory::News | ContentCategory::Tool => {}
    }
    engine_request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::MediaKind;
    use crate::engine::ScriptedEngine;
    use crate::state::ConfigDocument;

    fn dispatcher(doc: ConfigDocument, engine: Arc<ScriptedEngine>) -> Dispatcher {
        Dispatcher::new(Arc::new(ConfigStore::in_memory(doc)), engine)
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let engine = Arc::new(ScriptedEngine::new());
        let d = dispatcher(ConfigDocument::default(), engine.clone());
        let err = d.analyze(&AnalysisRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_content_rejected() {
        let engine = Arc::new(ScriptedEngine::new());
        let d = dispatcher(ConfigDocument::default(), engine.clone());

        let err = d.analyze(&AnalysisRequest::new("  ok  ")).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
        assert_eq!(engine.call_count(), 0);

        // Counted in characters, not bytes.
        assert!(d.analyze(&AnalysisRequest::new("é")).await.is_err());
        assert!(d.analyze(&AnalysisRequest::new("déjà")).await.is_ok());
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_engine_reply_flows_through() {
        let engine = Arc::new(
            ScriptedEngine::new().with_reply(
                ContentCategory::Tool,
                r#"{"toolName":"rustup","safetyRating":"AAA+++","riskLevel":"Minimal"}"#,
            ),
        );
        let d = dispatcher(ConfigDocument::default(), engine.clone());
        let result = d
            .analyze(&AnalysisRequest::new("https://rustup.rs"))
            .await
            .unwrap();
        assert_eq!(result.category, ContentCategory::Tool);
        assert!(!result.is_fallback());
        assert_eq!(result.verdict(), Some("AAA+++"));
        assert_eq!(engine.call_count(), 1);
    }

    #[test]
    fn test_engine_request_context() {
        let req = AnalysisRequest::new("https://example.org/clip.mov");
        let er = engine_request(ContentCategory::Media, req.content(), &req);
        assert_eq!(er.media_kind, Some(MediaKind::Video));
        assert_eq!(er.platform, None);

        let req = AnalysisRequest::new("https://www.youtube.com/watch?v=1");
        let er = engine_request(ContentCategory::Audio, req.content(), &req);
        assert_eq!(er.platform.as_deref(), Some("YouTube"));
        assert_eq!(er.media_kind, None);
    }
}
