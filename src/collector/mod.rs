//! Boundary to the remote call-detail collector.

pub mod http;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::callrecord::RawSignalRecord;

pub use http::HttpCollector;
pub use types::{
    CallKeyedRequest, QosResponse, SearchRequest, TimeRange, TransactionMessage,
    TransactionResponse,
};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("{op}: request failed: {source}")]
    Transport {
        op: &'static str,
        source: reqwest::Error,
    },
    #[error("{op}: collector returned HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("{op}: invalid response: {source}")]
    Decode {
        op: &'static str,
        source: serde_json::Error,
    },
    #[error("authenticate: {0}")]
    Auth(String),
}

/// Operations the analytics engine needs from the collector.
///
/// Every call is a single request with no retry; a failure is returned as is.
#[async_trait]
pub trait CallCollector: Send + Sync {
    async fn search(&self, request: &SearchRequest)
        -> Result<Vec<RawSignalRecord>, CollectorError>;
    async fn transaction(
        &self,
        request: &CallKeyedRequest,
    ) -> Result<TransactionResponse, CollectorError>;
    async fn qos(&self, request: &CallKeyedRequest) -> Result<QosResponse, CollectorError>;
    async fn export_pcap(&self, request: &SearchRequest) -> Result<Bytes, CollectorError>;
    async fn health_check(&self) -> Result<(), CollectorError>;
}
