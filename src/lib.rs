pub mod callrecord;
pub mod collector;
pub mod config;
pub mod error;
pub mod qos;
pub mod query;
pub mod sip;
pub mod utils;

pub use error::{Error, Result};

pub fn get_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
