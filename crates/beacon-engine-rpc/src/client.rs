use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_engine_core::Shutdown;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::auth::JwtSecret;
use crate::error::RpcError;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP against one endpoint.
///
/// Each call is bounded by a caller-supplied deadline and aborted as soon
/// as the lifecycle [`Shutdown`] fires. Authenticated clients attach a
/// freshly minted bearer token to every request.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    auth: Option<Arc<JwtSecret>>,
    shutdown: Shutdown,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Unauthenticated client for informational chain queries
    pub fn plain(url: impl Into<String>, shutdown: Shutdown) -> Self {
        RpcClient {
            http: reqwest::Client::new(),
            url: url.into(),
            auth: None,
            shutdown,
            next_id: AtomicU64::new(1),
        }
    }

    /// Engine API client
    pub fn authenticated(url: impl Into<String>, secret: Arc<JwtSecret>, shutdown: Shutdown) -> Self {
        RpcClient {
            auth: Some(secret),
            ..Self::plain(url, shutdown)
        }
    }

    /// Issue `method` and decode its result into `T`
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<T, RpcError> {
        if self.shutdown.is_triggered() {
            return Err(RpcError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = self.shutdown.wait() => Err(RpcError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.send(method, &params)) => {
                outcome.unwrap_or(Err(RpcError::Timeout(timeout)))
            }
        }?;

        serde_json::from_value(result).map_err(|e| RpcError::Data(format!("{method}: {e}")))
    }

    async fn send(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, id, url = %self.url, "sending request");

        let mut request = self.http.post(&self.url).json(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        });

        if let Some(secret) = &self.auth {
            let mut value = HeaderValue::try_from(secret.bearer_token()?)
                .map_err(|e| RpcError::Auth(e.to_string()))?;
            value.set_sensitive(true);
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?.error_for_status()?;
        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Data(format!("{method}: invalid JSON-RPC body: {e}")))?;

        if let Some(error) = body.error {
            return Err(RpcError::Protocol {
                code: error.code,
                message: error.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}
