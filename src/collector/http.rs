use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::{AuthRequest, AuthResponse, SearchResponse};
use super::{
    CallCollector, CallKeyedRequest, CollectorError, QosResponse, SearchRequest,
    TransactionResponse,
};
use crate::callrecord::RawSignalRecord;
use crate::config::CollectorConfig;

const AUTH_PATH: &str = "/api/v3/auth";
const SEARCH_PATH: &str = "/api/v3/search/call/data";
const TRANSACTION_PATH: &str = "/api/v3/call/transaction";
const QOS_PATH: &str = "/api/v3/call/report/qos";
const EXPORT_PCAP_PATH: &str = "/api/v3/export/call/messages/pcap";
const HEALTH_PATH: &str = "/api/v3/agent/check";

/// Collector client over its REST API.
///
/// Authenticates on first use and keeps the bearer token behind an async mutex, so
/// one instance can be shared between tasks.
pub struct HttpCollector {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl HttpCollector {
    pub fn new(config: &CollectorConfig) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| CollectorError::Transport {
                op: "client",
                source,
            })?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CollectorError> {
        let response = request
            .send()
            .await
            .map_err(|source| CollectorError::Transport { op, source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectorError::Status {
                op,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        op: &'static str,
        response: reqwest::Response,
    ) -> Result<T, CollectorError> {
        let body = response
            .bytes()
            .await
            .map_err(|source| CollectorError::Transport { op, source })?;
        serde_json::from_slice(&body).map_err(|source| CollectorError::Decode { op, source })
    }

    pub async fn authenticate(&self) -> Result<String, CollectorError> {
        let op = "authenticate";
        let payload = AuthRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        };
        let response = Self::send(op, self.client.post(self.url(AUTH_PATH)).json(&payload))
            .await
            .map_err(|e| match e {
                CollectorError::Status { status, body, .. } => {
                    CollectorError::Auth(format!("HTTP {}: {}", status, body))
                }
                other => other,
            })?;
        let auth: AuthResponse = Self::read_json(op, response).await?;
        if auth.token.is_empty() {
            return Err(CollectorError::Auth(if auth.message.is_empty() {
                "collector returned no token".to_string()
            } else {
                auth.message
            }));
        }
        info!(user = %self.username, scope = %auth.scope, "authenticated with collector");
        Ok(auth.token)
    }

    async fn bearer(&self) -> Result<String, CollectorError> {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }
        let fresh = self.authenticate().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        op: &'static str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, CollectorError> {
        let token = self.bearer().await?;
        debug!(op, path, "collector request");
        let result = Self::send(
            op,
            self.client
                .post(self.url(path))
                .bearer_auth(token)
                .json(body),
        )
        .await;
        if let Err(CollectorError::Status { status: 401, .. }) = result {
            // the next call authenticates again
            self.token.lock().await.take();
        }
        result
    }
}

#[async_trait]
impl CallCollector for HttpCollector {
    async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<RawSignalRecord>, CollectorError> {
        let op = "search";
        let response = self.post(op, SEARCH_PATH, request).await?;
        let result: SearchResponse = Self::read_json(op, response).await?;
        debug!(
            records = result.data.len(),
            from = request.timestamp.from,
            to = request.timestamp.to,
            "search returned"
        );
        Ok(result.data)
    }

    async fn transaction(
        &self,
        request: &CallKeyedRequest,
    ) -> Result<TransactionResponse, CollectorError> {
        let op = "transaction";
        let response = self.post(op, TRANSACTION_PATH, request).await?;
        Self::read_json(op, response).await
    }

    async fn qos(&self, request: &CallKeyedRequest) -> Result<QosResponse, CollectorError> {
        let op = "qos";
        let response = self.post(op, QOS_PATH, request).await?;
        Self::read_json(op, response).await
    }

    async fn export_pcap(&self, request: &SearchRequest) -> Result<Bytes, CollectorError> {
        let op = "export pcap";
        let response = self.post(op, EXPORT_PCAP_PATH, request).await?;
        response
            .bytes()
            .await
            .map_err(|source| CollectorError::Transport { op, source })
    }

    async fn health_check(&self) -> Result<(), CollectorError> {
        let op = "health check";
        Self::send(op, self.client.get(self.url(HEALTH_PATH))).await?;
        Ok(())
    }
}
