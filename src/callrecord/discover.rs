use std::collections::HashSet;
use tracing::{debug, info};

use super::{group_calls, CallSession, RawSignalRecord};
use crate::collector::{CallCollector, SearchRequest, TimeRange};
use crate::error::Result;
use crate::query;

/// Records requested per search; stays under the collector's safe page size.
pub const PAGE_LIMIT: u32 = 200;
/// Upper bound on search requests issued by one discovery.
pub const MAX_BATCHES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub page_limit: u32,
    pub max_batches: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            page_limit: PAGE_LIMIT,
            max_batches: MAX_BATCHES,
        }
    }
}

/// Find up to `max_calls` calls in `range` matching the `filter` query.
pub async fn discover(
    collector: &dyn CallCollector,
    range: TimeRange,
    filter: &str,
    reference: Option<&str>,
    max_calls: usize,
) -> Result<Vec<CallSession>> {
    discover_with(
        collector,
        range,
        filter,
        reference,
        max_calls,
        DiscoveryOptions::default(),
    )
    .await
}

/// Walk backward through `range` one page at a time, collecting records until
/// `max_calls` distinct calls are seen, the collector runs out of data, or
/// `options.max_batches` requests have been made.
///
/// Each page's upper bound is one millisecond before the oldest record of the
/// previous page, so pages never overlap. A failed request aborts the discovery.
///
/// Once the distinct-call count reaches `max_calls` the current page is not read
/// further, so later messages of an already counted call in that page are not
/// included in its session.
pub async fn discover_with(
    collector: &dyn CallCollector,
    range: TimeRange,
    filter: &str,
    reference: Option<&str>,
    max_calls: usize,
    options: DiscoveryOptions,
) -> Result<Vec<CallSession>> {
    let smartinput = query::compile(filter)?;
    if max_calls == 0 {
        return Ok(Vec::new());
    }

    let mut upper = range.to;
    let mut call_ids: HashSet<String> = HashSet::new();
    let mut records: Vec<RawSignalRecord> = Vec::new();

    for batch_index in 0..options.max_batches {
        if upper < range.from {
            break;
        }
        let request = SearchRequest::new(
            TimeRange::new(range.from, upper),
            &smartinput,
            options.page_limit,
        );
        let batch = collector.search(&request).await?;
        let batch_len = batch.len();
        let Some(oldest) = batch.iter().map(|r| r.timestamp).min() else {
            debug!(batch_index, upper, "empty page, discovery done");
            break;
        };

        let mut limit_reached = false;
        for record in batch {
            call_ids.insert(record.call_id.clone());
            records.push(record);
            if call_ids.len() >= max_calls {
                limit_reached = true;
                break;
            }
        }
        debug!(
            batch_index,
            upper,
            batch_len,
            calls = call_ids.len(),
            "discovery page"
        );

        if limit_reached || batch_len < options.page_limit as usize {
            break;
        }
        upper = oldest.saturating_sub(1);
    }

    let mut sessions = group_calls(records, reference);
    info!(
        calls = sessions.len(),
        max_calls,
        filter = %smartinput,
        "discovered calls"
    );
    sessions.truncate(max_calls);
    Ok(sessions)
}
