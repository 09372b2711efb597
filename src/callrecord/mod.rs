pub mod correlate;
pub mod discover;

use serde::{Deserialize, Serialize};

use crate::utils::{lenient_number, lenient_string};

pub use correlate::group_calls;
pub use discover::{discover, discover_with, DiscoveryOptions};

/// One signaling message as returned by the collector search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSignalRecord {
    pub id: u64,
    /// Capture time in epoch milliseconds.
    #[serde(rename = "create_date", deserialize_with = "lenient_number")]
    pub timestamp: i64,
    #[serde(rename = "srcIp")]
    pub src_ip: String,
    #[serde(rename = "srcPort")]
    pub src_port: u16,
    #[serde(rename = "dstIp")]
    pub dst_ip: String,
    #[serde(rename = "dstPort")]
    pub dst_port: u16,
    #[serde(rename = "sid")]
    pub call_id: String,
    /// Request method, or the response code as text.
    #[serde(deserialize_with = "lenient_string")]
    pub method: String,
    #[serde(deserialize_with = "lenient_string")]
    pub from_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub to_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub ruri_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub user_agent: String,
    #[serde(deserialize_with = "lenient_string")]
    pub cseq: String,
    #[serde(deserialize_with = "lenient_number")]
    pub status: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CallDirection {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::In => "IN",
            CallDirection::Out => "OUT",
            CallDirection::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Answered,
    Busy,
    Cancelled,
    NoAnswer,
    Failed,
    Ringing,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl CallStatus {
    /// Outcome for the highest terminal status code seen in a call.
    pub fn from_code(code: Option<u16>) -> Self {
        match code {
            Some(200..=299) => CallStatus::Answered,
            Some(486) => CallStatus::Busy,
            Some(487) => CallStatus::Cancelled,
            Some(408) | Some(480) => CallStatus::NoAnswer,
            Some(c) if c >= 400 => CallStatus::Failed,
            Some(c) if c >= 100 => CallStatus::Ringing,
            _ => CallStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Answered => "answered",
            CallStatus::Busy => "busy",
            CallStatus::Cancelled => "cancelled",
            CallStatus::NoAnswer => "no answer",
            CallStatus::Failed => "failed",
            CallStatus::Ringing => "ringing",
            CallStatus::Unknown => "",
        }
    }
}

/// Correlated view of all signaling records sharing one call identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSession {
    pub call_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub caller: String,
    pub callee: String,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub record_count: usize,
    /// Member records ordered by timestamp.
    pub records: Vec<RawSignalRecord>,
}

#[cfg(test)]
mod tests;
