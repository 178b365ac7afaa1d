use crate::config::Config;
use crate::metrics_defs::BACKEND_REQUESTS;
use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde_json::Value;
use shared::counter;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to {0} failed: {1}")]
    RequestFailed(Backend, String),

    #[error("request to {0} timed out")]
    Timeout(Backend),

    #[error("{0} answered with status {1}")]
    UnexpectedStatus(Backend, StatusCode),

    #[error("{0} URL cannot carry a resource path")]
    InvalidUrl(Backend),
}

/// One of the two control-plane profile services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Pgw,
    Sgw,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Pgw => "pgw",
            Backend::Sgw => "sgw",
        }
    }

    fn resource_path(&self) -> [&'static str; 3] {
        match self {
            Backend::Pgw => ["api", "v1", "pgwprofile"],
            Backend::Sgw => ["api", "v1", "sgwprofile"],
        }
    }

    fn entity_type(&self) -> &'static str {
        match self {
            Backend::Pgw => "pgw-dpf",
            Backend::Sgw => "sgw-dpf",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call against a profile service
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: Method,
    pub list: bool,
    pub id: Option<String>,
    pub body: Option<Value>,
}

impl BackendRequest {
    pub fn create(body: Value) -> Self {
        Self {
            method: Method::POST,
            list: false,
            id: None,
            body: Some(body),
        }
    }

    pub fn list() -> Self {
        Self {
            method: Method::GET,
            list: true,
            id: None,
            body: None,
        }
    }

    /// Filtered list query returning at most the profile with `id`
    pub fn find(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::list()
        }
    }

    pub fn update(id: &str, body: Value) -> Self {
        Self {
            method: Method::PUT,
            list: false,
            id: Some(id.to_string()),
            body: Some(body),
        }
    }

    pub fn remove(id: &str) -> Self {
        Self {
            method: Method::DELETE,
            list: false,
            id: Some(id.to_string()),
            body: None,
        }
    }

    fn query(&self, backend: Backend) -> Vec<(&'static str, &str)> {
        let mut params = vec![("entity-type", backend.entity_type())];
        if self.list {
            params.push(("action", "list"));
        }
        if let Some(id) = &self.id {
            params.push(("id", id.as_str()));
        }
        params
    }
}

/// Reply of one profile service call
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQueryResult {
    pub success: bool,
    pub http_status: StatusCode,
    pub id: Option<String>,
    pub tac: Option<String>,
    pub raw_body: Value,
}

impl BackendQueryResult {
    pub fn new(http_status: StatusCode, raw_body: Value) -> Self {
        let success = raw_body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let id = raw_body.get("id").and_then(scalar_to_string);
        let tac = raw_body
            .get("tac")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            success,
            http_status,
            id,
            tac,
            raw_body,
        }
    }

    /// A body that is not JSON is kept as `null` and reads as unsuccessful.
    pub fn from_bytes(http_status: StatusCode, bytes: &[u8]) -> Self {
        let raw_body = serde_json::from_slice(bytes).unwrap_or(Value::Null);
        Self::new(http_status, raw_body)
    }

    /// `totalCount` of a list reply, when present as an integer
    pub fn total_count(&self) -> Option<i64> {
        self.raw_body.get("totalCount").and_then(Value::as_i64)
    }

    pub fn item(&self, index: usize) -> Option<&Value> {
        self.raw_body.get("items")?.get(index)
    }

    pub fn item_id(&self, index: usize) -> Option<&str> {
        self.item(index)?.get("id")?.as_str()
    }

    pub fn item_tac(&self, index: usize) -> Option<&str> {
        self.item(index)?.get("tac")?.as_str()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Access to the PGW and SGW profile services
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn execute(
        &self,
        backend: Backend,
        request: BackendRequest,
    ) -> Result<BackendQueryResult, BackendError>;
}

/// [`ControlPlane`] speaking HTTP to the configured profile services
pub struct HttpControlPlane {
    client: reqwest::Client,
    pgw_url: Url,
    sgw_url: Url,
}

impl HttpControlPlane {
    pub fn new(pgw_url: Url, sgw_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            pgw_url,
            sgw_url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.pgw.url.clone(),
            config.sgw.url.clone(),
            Duration::from_secs(config.timeouts.http_timeout_secs),
        )
    }

    fn endpoint(&self, backend: Backend) -> Result<Url, BackendError> {
        let mut url = match backend {
            Backend::Pgw => self.pgw_url.clone(),
            Backend::Sgw => self.sgw_url.clone(),
        };
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(backend))?
            .pop_if_empty()
            .extend(backend.resource_path());
        Ok(url)
    }

    async fn send(
        &self,
        backend: Backend,
        request: &BackendRequest,
    ) -> Result<BackendQueryResult, BackendError> {
        let url = self.endpoint(backend)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .query(&request.query(backend));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(backend)
            } else {
                BackendError::RequestFailed(backend, e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BackendError::UnexpectedStatus(backend, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::RequestFailed(backend, e.to_string()))?;

        Ok(BackendQueryResult::from_bytes(status, &bytes))
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn execute(
        &self,
        backend: Backend,
        request: BackendRequest,
    ) -> Result<BackendQueryResult, BackendError> {
        let result = self.send(backend, &request).await;

        match &result {
            Ok(reply) => {
                tracing::debug!(
                    backend = %backend,
                    method = %request.method,
                    id = ?request.id,
                    success = reply.success,
                    "Backend call completed"
                );
                counter!(BACKEND_REQUESTS,
                    "backend" => backend.as_str(),
                    "method" => request.method.to_string(),
                    "result" => if reply.success { "success" } else { "rejected" })
                .increment(1);
            }
            Err(e) => {
                tracing::warn!(
                    backend = %backend,
                    method = %request.method,
                    error = %e,
                    "Backend call failed"
                );
                counter!(BACKEND_REQUESTS,
                    "backend" => backend.as_str(),
                    "method" => request.method.to_string(),
                    "result" => "error")
                .increment(1);
            }
        }

        result
    }
}
