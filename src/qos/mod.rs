//! RTCP/RTP quality report aggregation.

pub mod estimation;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::utils::{lenient_number, lenient_string, null_as_default};

pub use estimation::{calculate_mos, QualityLevel};

/// Clock rate assumed for narrowband audio when none is configured.
pub const DEFAULT_CLOCK_RATE_HZ: u32 = 8000;

/// One report as delivered by the collector. `raw` holds the decoded RTCP
/// packet serialized as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityReport {
    #[serde(rename = "srcIp")]
    pub src_ip: String,
    #[serde(rename = "srcPort")]
    pub src_port: u16,
    #[serde(rename = "dstIp")]
    pub dst_ip: String,
    #[serde(rename = "dstPort")]
    pub dst_port: u16,
    #[serde(rename = "sid", deserialize_with = "lenient_string")]
    pub call_id: String,
    #[serde(rename = "create_date", deserialize_with = "lenient_number")]
    pub timestamp: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub raw: String,
}

impl QualityReport {
    pub fn decode_payload(&self) -> Result<ReportPayload, serde_json::Error> {
        serde_json::from_str(&self.raw)
    }

    pub fn key(&self) -> MediaStreamKey {
        MediaStreamKey {
            src_ip: self.src_ip.clone(),
            src_port: self.src_port,
            dst_ip: self.dst_ip.clone(),
            dst_port: self.dst_port,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderInformation {
    pub ntp_timestamp_sec: u64,
    pub ntp_timestamp_usec: u64,
    pub rtp_timestamp: u64,
    pub packets: u64,
    pub octets: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportBlock {
    pub source_ssrc: u64,
    pub fraction_lost: u32,
    /// Cumulative loss; RTCP allows it to go negative on duplicates.
    pub packets_lost: i64,
    pub highest_seq_no: u64,
    /// Interarrival jitter in RTP timestamp units.
    pub ia_jitter: f64,
    pub lsr: u64,
    pub dlsr: u64,
}

/// Capture node field, sent either as a single value or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeField {
    Many(Vec<Value>),
    One(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPayload {
    pub ssrc: u64,
    #[serde(rename = "type")]
    pub kind: u32,
    pub report_count: u32,
    pub sender_information: Option<SenderInformation>,
    #[serde(deserialize_with = "null_as_default")]
    pub report_blocks: Vec<ReportBlock>,
    pub node: Option<NodeField>,
}

/// Direction-sensitive identity of a media flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MediaStreamKey {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
}

impl fmt::Display for MediaStreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMetrics {
    pub key: MediaStreamKey,
    pub call_id: String,
    pub report_count: usize,
    pub packets: u64,
    pub packets_lost: u64,
    /// Always within `[0, 100]`; zero when no packets were reported.
    pub loss_percent: f64,
    pub avg_jitter_ms: f64,
    pub max_jitter_ms: f64,
    pub mos: f64,
    pub first_report: i64,
    pub last_report: i64,
}

impl StreamMetrics {
    pub fn quality(&self) -> QualityLevel {
        QualityLevel::from_mos(self.mos)
    }
}

#[derive(Debug, Default)]
struct StreamAccumulator {
    call_id: String,
    report_count: usize,
    packets: u64,
    /// Signed sum of cumulative loss; clamped only when the stream is finished.
    packets_lost: i64,
    jitter_sum_ms: f64,
    jitter_samples: u64,
    max_jitter_ms: f64,
    first_report: i64,
    last_report: i64,
}

impl StreamAccumulator {
    fn add(&mut self, report: &QualityReport, payload: &ReportPayload, clock_rate_hz: f64) {
        if self.report_count == 0 {
            self.call_id = report.call_id.clone();
            self.first_report = report.timestamp;
            self.last_report = report.timestamp;
        } else {
            self.first_report = self.first_report.min(report.timestamp);
            self.last_report = self.last_report.max(report.timestamp);
        }
        self.report_count += 1;

        if let Some(sender) = &payload.sender_information {
            self.packets += sender.packets;
        }
        for block in &payload.report_blocks {
            self.packets_lost = self.packets_lost.saturating_add(block.packets_lost);
            let jitter_ms = block.ia_jitter.max(0.0) * 1000.0 / clock_rate_hz;
            self.jitter_sum_ms += jitter_ms;
            self.jitter_samples += 1;
            self.max_jitter_ms = self.max_jitter_ms.max(jitter_ms);
        }
    }

    fn finish(self, key: MediaStreamKey, assumed_latency_ms: f64) -> StreamMetrics {
        let packets_lost = self.packets_lost.max(0) as u64;
        let loss_percent = loss_percent(packets_lost, self.packets);
        let avg_jitter_ms = if self.jitter_samples > 0 {
            self.jitter_sum_ms / self.jitter_samples as f64
        } else {
            0.0
        };
        StreamMetrics {
            key,
            call_id: self.call_id,
            report_count: self.report_count,
            packets: self.packets,
            packets_lost,
            loss_percent,
            avg_jitter_ms,
            max_jitter_ms: self.max_jitter_ms,
            mos: calculate_mos(assumed_latency_ms, avg_jitter_ms, loss_percent),
            first_report: self.first_report,
            last_report: self.last_report,
        }
    }
}

/// Lost packets as a percentage of packets sent, clamped to `[0, 100]`.
pub fn loss_percent(packets_lost: u64, packets: u64) -> f64 {
    if packets == 0 {
        return 0.0;
    }
    (packets_lost as f64 * 100.0 / packets as f64).clamp(0.0, 100.0)
}

/// Aggregate reports into per-stream metrics, ordered by first report time.
///
/// Reports whose payload fails to decode or carries no report blocks are skipped.
/// A zero `clock_rate_hz` falls back to [`DEFAULT_CLOCK_RATE_HZ`].
pub fn aggregate<'a, I>(reports: I, clock_rate_hz: u32, assumed_latency_ms: f64) -> Vec<StreamMetrics>
where
    I: IntoIterator<Item = &'a QualityReport>,
{
    let clock_rate_hz = if clock_rate_hz == 0 {
        DEFAULT_CLOCK_RATE_HZ
    } else {
        clock_rate_hz
    } as f64;

    let mut streams: HashMap<MediaStreamKey, StreamAccumulator> = HashMap::new();
    for report in reports {
        let payload = match report.decode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                debug!(call_id = %report.call_id, "skipping undecodable report: {}", e);
                continue;
            }
        };
        if payload.report_blocks.is_empty() {
            continue;
        }
        streams
            .entry(report.key())
            .or_default()
            .add(report, &payload, clock_rate_hz);
    }

    let mut metrics: Vec<StreamMetrics> = streams
        .into_iter()
        .map(|(key, acc)| acc.finish(key, assumed_latency_ms))
        .collect();
    metrics.sort_by(|a, b| {
        a.first_report
            .cmp(&b.first_report)
            .then_with(|| a.key.cmp(&b.key))
    });
    metrics
}
