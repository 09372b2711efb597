use anyhow::Error;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::callrecord::DiscoveryOptions;
use crate::qos::DEFAULT_CLOCK_RATE_HZ;

pub const DEFAULT_CONFIG_FILE: &str = "voipscope.toml";

#[derive(Parser, Debug)]
#[command(version, about = "Call discovery and quality analytics over a SIP capture collector")]
pub struct Cli {
    /// Config file; `voipscope.toml` is used when present
    #[clap(long)]
    pub conf: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a filter query and print the collector expression
    Compile { query: String },
    /// List recent calls, newest first
    Calls {
        #[clap(long, short, default_value = "")]
        query: String,
        /// Reference number used to classify direction
        #[clap(long, short)]
        number: Option<String>,
        #[clap(long, short)]
        limit: Option<usize>,
        /// Size of the search window, ending at `--until`
        #[clap(long, default_value_t = 60)]
        since_minutes: i64,
        /// Window end in epoch milliseconds; defaults to now
        #[clap(long)]
        until: Option<i64>,
    },
    /// Show the SIP messages of one call
    Show {
        call_id: String,
        /// Print the full raw message at this position
        #[clap(long, short)]
        index: Option<usize>,
        #[clap(long, default_value_t = 1440)]
        since_minutes: i64,
    },
    /// Per-stream quality metrics for calls
    Qos {
        #[clap(required = true)]
        call_ids: Vec<String>,
        #[clap(long, default_value_t = 1440)]
        since_minutes: i64,
    },
    /// Export call messages as a PCAP capture
    Export {
        #[clap(required = true)]
        call_ids: Vec<String>,
        /// Output file; named after the first call id by default
        #[clap(long, short)]
        out: Option<String>,
        #[clap(long, default_value_t = 1440)]
        since_minutes: i64,
    },
    /// Check that the collector is reachable
    Health,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub collector: CollectorConfig,
    pub discovery: DiscoveryConfig,
    pub qos: QosConfig,
    /// Default reference number for direction classification
    pub reference_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_calls: usize,
    pub page_limit: u32,
    pub max_batches: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QosConfig {
    pub clock_rate_hz: u32,
    /// One-way network latency fed into the MOS estimate
    pub assumed_latency_ms: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9080".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let options = DiscoveryOptions::default();
        Self {
            max_calls: 50,
            page_limit: options.page_limit,
            max_batches: options.max_batches,
        }
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            page_limit: config.page_limit.max(1),
            max_batches: config.max_batches,
        }
    }
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            clock_rate_hz: DEFAULT_CLOCK_RATE_HZ,
            assumed_latency_ms: 20.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            collector: CollectorConfig::default(),
            discovery: DiscoveryConfig::default(),
            qos: QosConfig::default(),
            reference_number: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }

    /// Load the explicit `path`, or the default file when it exists, or defaults.
    pub fn resolve(path: Option<&str>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }
}
