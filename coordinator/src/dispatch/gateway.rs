//! Agent gateway transport client.
//!
//! The gateway is an external collaborator exposing one conceptual
//! method, `chat.send(session_key, message, idempotency_key)`. The
//! trait keeps the dispatch engine testable with an in-memory double.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway connect failed: {0}")]
    Connect(String),

    #[error("gateway call failed: {0}")]
    Call(String),
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Establish the connection. Called lazily, once per dispatch, only
    /// when not already connected.
    async fn connect(&self) -> Result<(), GatewayError>;

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError>;
}

/// HTTP-backed gateway client.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    connected: AtomicBool,
}

impl HttpGateway {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
            connected: AtomicBool::new(false),
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGateway {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), GatewayError> {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Connect(format!(
                "gateway health returned {}",
                response.status()
            )));
        }

        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let url = format!("{}/rpc", self.base_url.trim_end_matches('/'));
        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| GatewayError::Call(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Call(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Call(e.to_string()))
    }
}

/// In-memory gateway double used by the integration tests: records every
/// call and fails on demand.
#[derive(Default)]
pub struct RecordingGateway {
    pub fail_connect: AtomicBool,
    pub fail_call: AtomicBool,
    connected: AtomicBool,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingGateway {
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl GatewayClient for RecordingGateway {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), GatewayError> {
        if self.fail_connect.load(Ordering::Acquire) {
            return Err(GatewayError::Connect("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        if self.fail_call.load(Ordering::Acquire) {
            return Err(GatewayError::Call("remote call failed".to_string()));
        }
        self.calls.lock().await.push((method.to_string(), params));
        Ok(json!({ "ok": true }))
    }
}
