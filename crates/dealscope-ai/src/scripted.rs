//! An in-process service that answers from a closure.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;
use crate::service::{ExtractionRequest, ExtractionService, ServiceResponse};

type Responder = Box<dyn Fn(&ExtractionRequest) -> Result<Value, ServiceError> + Send + Sync>;
type Delay = Box<dyn Fn(&ExtractionRequest) -> Duration + Send + Sync>;

/// Scripted extraction service for tests and offline runs.
pub struct ScriptedService {
    model: String,
    responder: Responder,
    delay: Option<Delay>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl ScriptedService {
    pub fn new<F>(model: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&ExtractionRequest) -> Result<Value, ServiceError> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, per request.
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&ExtractionRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExtractionService for ScriptedService {
    fn model(&self) -> &str {
        &self.model
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ServiceResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(request)).await;
        }
        let value = (self.responder)(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let value = value?;
        Ok(ServiceResponse {
            value,
            model: self.model.clone(),
        })
    }
}
