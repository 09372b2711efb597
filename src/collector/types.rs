use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::callrecord::RawSignalRecord;
use crate::qos::QualityReport;

/// Millisecond epoch bounds of a collector query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// The window ending now and reaching `minutes` back.
    pub fn last_minutes(minutes: i64) -> Self {
        let to = Utc::now().timestamp_millis();
        Self {
            from: to - minutes * 60_000,
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timezone {
    pub value: i32,
    pub name: String,
}

impl Timezone {
    /// Local UTC offset in minutes, negated as the collector expects (UTC+2 => -120).
    pub fn local() -> Self {
        let offset_secs = Local::now().offset().local_minus_utc();
        Self {
            value: -(offset_secs / 60),
            name: "Local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptyObject {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterItem {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hepid: u32,
}

impl FilterItem {
    pub fn string(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            kind: "string".to_string(),
            hepid: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSpec {
    #[serde(rename = "1_call")]
    pub call: Vec<FilterItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParam {
    pub transaction: EmptyObject,
    pub limit: u32,
    pub orlogic: bool,
    pub search: SearchSpec,
    pub location: EmptyObject,
    pub timezone: Timezone,
}

/// Body of `POST /api/v3/search/call/data` and of the PCAP export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub param: SearchParam,
    pub timestamp: TimeRange,
}

impl SearchRequest {
    pub fn new(range: TimeRange, smartinput: &str, limit: u32) -> Self {
        Self {
            param: SearchParam {
                transaction: EmptyObject::default(),
                limit,
                orlogic: false,
                search: SearchSpec {
                    call: vec![
                        FilterItem::string("limit", limit.to_string()),
                        FilterItem::string("smartinput", smartinput),
                    ],
                },
                location: EmptyObject::default(),
                timezone: Timezone::local(),
            },
            timestamp: range,
        }
    }

    pub fn smartinput(&self) -> &str {
        self.param
            .search
            .call
            .iter()
            .find(|item| item.name == "smartinput")
            .map(|item| item.value.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionKinds {
    pub call: bool,
    pub registration: bool,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallKeys {
    pub id: u64,
    pub callid: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallKeyedSpec {
    #[serde(rename = "1_call")]
    pub call: CallKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallKeyedParam {
    pub transaction: TransactionKinds,
    pub limit: u32,
    pub search: CallKeyedSpec,
    pub location: EmptyObject,
    pub timezone: Timezone,
}

/// Body of the transaction and QoS endpoints, keyed by call identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallKeyedRequest {
    pub param: CallKeyedParam,
    pub timestamp: TimeRange,
}

impl CallKeyedRequest {
    pub fn new(range: TimeRange, call_ids: Vec<String>, record_id: Option<u64>) -> Self {
        Self {
            param: CallKeyedParam {
                transaction: TransactionKinds {
                    call: true,
                    registration: false,
                    rest: false,
                },
                limit: 200,
                search: CallKeyedSpec {
                    call: CallKeys {
                        id: record_id.unwrap_or_default(),
                        callid: call_ids,
                    },
                },
                location: EmptyObject::default(),
                timezone: Timezone::local(),
            },
            timestamp: range,
        }
    }

    /// Key on the distinct call identifiers of a search result, in first-seen order,
    /// using the first record as the representative.
    pub fn from_records(range: TimeRange, records: &[RawSignalRecord]) -> Self {
        let mut call_ids: Vec<String> = Vec::new();
        for record in records {
            if !call_ids.contains(&record.call_id) {
                call_ids.push(record.call_id.clone());
            }
        }
        Self::new(range, call_ids, records.first().map(|r| r.id))
    }

    pub fn call_ids(&self) -> &[String] {
        &self.param.search.call.callid
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthResponse {
    pub token: String,
    pub scope: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub data: Vec<RawSignalRecord>,
}

/// One full message of a call transaction, including its raw SIP text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionMessage {
    pub id: u64,
    pub create_date: i64,
    pub sid: String,
    #[serde(rename = "srcIp")]
    pub src_ip: String,
    #[serde(rename = "srcPort")]
    pub src_port: u16,
    #[serde(rename = "dstIp")]
    pub dst_ip: String,
    #[serde(rename = "dstPort")]
    pub dst_port: u16,
    pub method: String,
    pub raw: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionData {
    pub messages: Vec<TransactionMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionResponse {
    pub data: TransactionData,
}

impl TransactionResponse {
    pub fn messages(&self) -> &[TransactionMessage] {
        &self.data.messages
    }

    /// Message at `index` in collector order.
    pub fn message(&self, index: usize) -> crate::error::Result<&TransactionMessage> {
        self.data.messages.get(index).ok_or_else(|| {
            crate::error::Error::NotFound(format!(
                "message #{} (transaction has {} messages)",
                index,
                self.data.messages.len()
            ))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QosBucket {
    pub data: Vec<QualityReport>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QosResponse {
    pub rtcp: QosBucket,
    pub rtp: QosBucket,
}

impl QosResponse {
    /// RTCP reports followed by RTP reports.
    pub fn reports(&self) -> impl Iterator<Item = &QualityReport> {
        self.rtcp.data.iter().chain(self.rtp.data.iter())
    }
}
