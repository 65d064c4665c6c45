//! One retry on a second model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ServiceError;
use crate::service::{ExtractionRequest, ExtractionService, ServiceResponse};

/// Wraps a primary service and retries eligible failures once on a fallback.
///
/// Applies to every call kind: single documents, bundles, category analyses
/// and synthesis all go through the same `extract`.
pub struct FallbackService {
    primary: Arc<dyn ExtractionService>,
    fallback: Arc<dyn ExtractionService>,
}

impl FallbackService {
    pub fn new(primary: Arc<dyn ExtractionService>, fallback: Arc<dyn ExtractionService>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ExtractionService for FallbackService {
    fn model(&self) -> &str {
        self.primary.model()
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ServiceResponse, ServiceError> {
        match self.primary.extract(request).await {
            Err(e) if e.is_fallback_eligible() => {
                warn!(
                    primary = self.primary.model(),
                    fallback = self.fallback.model(),
                    error = %e,
                    "primary model failed, retrying on fallback"
                );
                self.fallback.extract(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scripted::ScriptedService;

    fn request() -> ExtractionRequest {
        ExtractionRequest::new("system", "user")
    }

    #[tokio::test]
    async fn success_does_not_touch_fallback() {
        let primary = Arc::new(ScriptedService::new("big", |_| Ok(json!({"ok": true}))));
        let fallback = Arc::new(ScriptedService::new("small", |_| Ok(json!({"ok": false}))));
        let service = FallbackService::new(primary.clone(), fallback.clone());

        let resp = service.extract(&request()).await.unwrap();
        assert_eq!(resp.model, "big");
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn unavailable_model_retries_once_on_fallback() {
        let primary = Arc::new(ScriptedService::new("big", |_| {
            Err(ServiceError::ModelUnavailable { model: "big".into() })
        }));
        let fallback = Arc::new(ScriptedService::new("small", |_| Ok(json!({"ok": true}))));
        let service = FallbackService::new(primary.clone(), fallback.clone());

        let resp = service.extract(&request()).await.unwrap();
        assert_eq!(resp.model, "small");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn ineligible_errors_are_returned_as_is() {
        let primary = Arc::new(ScriptedService::new("big", |_| {
            Err(ServiceError::Status {
                status: 401,
                body: "bad key".into(),
            })
        }));
        let fallback = Arc::new(ScriptedService::new("small", |_| Ok(json!({}))));
        let service = FallbackService::new(primary, fallback.clone());

        let err = service.extract(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 401, .. }));
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_failure_surfaces() {
        let primary = Arc::new(ScriptedService::new("big", |_| Err(ServiceError::Timeout)));
        let fallback = Arc::new(ScriptedService::new("small", |_| Err(ServiceError::Timeout)));
        let service = FallbackService::new(primary, fallback);
        assert!(matches!(
            service.extract(&request()).await,
            Err(ServiceError::Timeout)
        ));
    }
}
