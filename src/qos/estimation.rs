use serde::Serialize;

/// Lowest MOS the estimate reports.
pub const MOS_MIN: f64 = 1.0;
/// Highest MOS the estimate reports (narrowband ceiling).
pub const MOS_MAX: f64 = 4.5;

/// Estimate a Mean Opinion Score with a simplified E-model (ITU-T G.107).
///
/// Jitter counts twice toward delay to account for the de-jitter buffer, plus a
/// fixed 10 ms of codec delay. Packet loss is given in percent. The result is
/// rounded to two decimals and always lies in `[1.0, 4.5]`.
pub fn calculate_mos(one_way_latency_ms: f64, jitter_ms: f64, loss_percent: f64) -> f64 {
    let effective_latency = one_way_latency_ms + jitter_ms * 2.0 + 10.0;
    let mut r = 93.2 - effective_latency / 40.0;
    if loss_percent > 0.0 {
        r -= 2.5 * loss_percent + 0.03 * loss_percent * loss_percent;
    }
    let r = if r.is_nan() { 0.0 } else { r.clamp(0.0, 100.0) };

    let mos = 1.0 + 0.035 * r + r * (r - 60.0) * (100.0 - r) * 7.0e-6;
    ((mos * 100.0).round() / 100.0).clamp(MOS_MIN, MOS_MAX)
}

/// Quality level categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    /// Excellent quality (MOS >= 4.3)
    Excellent,
    /// Good quality (MOS 4.0-4.3)
    Good,
    /// Fair quality (MOS 3.6-4.0)
    Fair,
    /// Poor quality (MOS 3.1-3.6)
    Poor,
    /// Bad quality (MOS < 3.1)
    Bad,
}

impl QualityLevel {
    pub fn from_mos(mos: f64) -> Self {
        if mos >= 4.3 {
            Self::Excellent
        } else if mos >= 4.0 {
            Self::Good
        } else if mos >= 3.6 {
            Self::Fair
        } else if mos >= 3.1 {
            Self::Poor
        } else {
            Self::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Bad => "bad",
        }
    }
}
