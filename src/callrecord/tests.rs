use super::discover::PAGE_LIMIT;
use super::*;
use crate::collector::{
    CallCollector, CallKeyedRequest, CollectorError, QosResponse, SearchRequest, TimeRange,
    TransactionResponse,
};
use crate::error::Error;
use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

mock! {
    pub Collector {}

    #[async_trait]
    impl CallCollector for Collector {
        async fn search(&self, request: &SearchRequest) -> Result<Vec<RawSignalRecord>, CollectorError>;
        async fn transaction(&self, request: &CallKeyedRequest) -> Result<TransactionResponse, CollectorError>;
        async fn qos(&self, request: &CallKeyedRequest) -> Result<QosResponse, CollectorError>;
        async fn export_pcap(&self, request: &SearchRequest) -> Result<Bytes, CollectorError>;
        async fn health_check(&self) -> Result<(), CollectorError>;
    }
}

fn record(id: u64, call_id: &str, timestamp: i64, method: &str) -> RawSignalRecord {
    RawSignalRecord {
        id,
        timestamp,
        call_id: call_id.to_string(),
        method: method.to_string(),
        ..Default::default()
    }
}

fn invite(id: u64, call_id: &str, timestamp: i64, from: &str, to: &str) -> RawSignalRecord {
    RawSignalRecord {
        from_user: from.to_string(),
        to_user: to.to_string(),
        ..record(id, call_id, timestamp, "INVITE")
    }
}

/// Collector serving `pages` in order and recording each request's window.
fn paged_collector(pages: Vec<Vec<RawSignalRecord>>) -> (MockCollector, Arc<Mutex<Vec<TimeRange>>>) {
    let pages = Arc::new(Mutex::new(VecDeque::from(pages)));
    let windows = Arc::new(Mutex::new(Vec::new()));
    let recorded = windows.clone();
    let mut collector = MockCollector::new();
    collector.expect_search().returning(move |request| {
        recorded.lock().unwrap().push(request.timestamp);
        Ok(pages.lock().unwrap().pop_front().unwrap_or_default())
    });
    (collector, windows)
}

fn options(page_limit: u32, max_batches: usize) -> DiscoveryOptions {
    DiscoveryOptions {
        page_limit,
        max_batches,
    }
}

// correlation

#[test]
fn test_group_counts_match_distinct_call_ids() {
    let records = vec![
        record(1, "a", 100, "INVITE"),
        record(2, "b", 110, "INVITE"),
        record(3, "a", 120, "180"),
        record(4, "a", 130, "200"),
        record(5, "c", 90, "OPTIONS"),
    ];
    let sessions = group_calls(records, None);
    assert_eq!(sessions.len(), 3);
    let count = |id: &str| {
        sessions
            .iter()
            .find(|s| s.call_id == id)
            .map(|s| (s.record_count, s.records.len()))
            .unwrap()
    };
    assert_eq!(count("a"), (3, 3));
    assert_eq!(count("b"), (1, 1));
    assert_eq!(count("c"), (1, 1));
}

#[test]
fn test_session_timing_and_member_order() {
    let records = vec![
        record(3, "a", 1_500, "BYE"),
        record(1, "a", 1_000, "INVITE"),
        record(2, "a", 1_200, "200"),
    ];
    let session = group_calls(records, None).remove(0);
    assert_eq!(session.start_time, 1_000);
    assert_eq!(session.end_time, 1_500);
    assert_eq!(session.duration_ms, 500);
    let ids: Vec<u64> = session.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_sessions_sorted_most_recent_first() {
    let records = vec![
        record(1, "old", 100, "INVITE"),
        record(2, "new", 300, "INVITE"),
        record(3, "mid", 200, "INVITE"),
        record(4, "tie-b", 250, "INVITE"),
        record(5, "tie-a", 250, "INVITE"),
    ];
    let order: Vec<String> = group_calls(records, None)
        .into_iter()
        .map(|s| s.call_id)
        .collect();
    assert_eq!(order, vec!["new", "tie-a", "tie-b", "mid", "old"]);
}

#[test]
fn test_parties_come_from_invite() {
    let mut options = record(1, "a", 100, "OPTIONS");
    options.from_user = "monitor".to_string();
    let records = vec![options, invite(2, "a", 110, "999", "1234")];
    let session = group_calls(records, None).remove(0);
    assert_eq!(session.caller, "999");
    assert_eq!(session.callee, "1234");
}

#[test]
fn test_callee_falls_back_to_request_uri() {
    let mut first = invite(1, "a", 100, "999", "");
    first.ruri_user = "5551000".to_string();
    let session = group_calls(vec![first], None).remove(0);
    assert_eq!(session.callee, "5551000");
}

#[test]
fn test_parties_without_invite_use_first_record() {
    let mut later = record(2, "a", 200, "BYE");
    later.from_user = "later".to_string();
    let mut first = record(1, "a", 100, "REGISTER");
    first.from_user = "first".to_string();
    first.to_user = "target".to_string();
    let session = group_calls(vec![later, first], None).remove(0);
    assert_eq!(session.caller, "first");
    assert_eq!(session.callee, "target");
}

#[test]
fn test_direction_relative_to_reference() {
    let records = vec![
        invite(1, "out", 100, "+4930123456", "0800111"),
        invite(2, "in", 200, "0800111", "4930123456"),
        invite(3, "other", 300, "0800111", "0800222"),
    ];
    let sessions = group_calls(records, Some("+4930123456"));
    let direction = |id: &str| {
        sessions
            .iter()
            .find(|s| s.call_id == id)
            .map(|s| s.direction)
            .unwrap()
    };
    assert_eq!(direction("out"), CallDirection::Out);
    assert_eq!(direction("in"), CallDirection::In);
    assert_eq!(direction("other"), CallDirection::Unknown);
    assert_eq!(CallDirection::Out.as_str(), "OUT");
    assert_eq!(CallDirection::Unknown.as_str(), "");
}

#[test]
fn test_direction_substring_and_caller_precedence() {
    assert_eq!(correlate::direction("123", "+49123", "555"), CallDirection::Out);
    assert_eq!(correlate::direction("+49123", "555", "123"), CallDirection::In);
    assert_eq!(correlate::direction("123", "123", "123"), CallDirection::Out);
    assert_eq!(correlate::direction("", "123", "123"), CallDirection::Unknown);
    assert_eq!(correlate::direction("123", "", ""), CallDirection::Unknown);
}

#[test]
fn test_no_reference_gives_unknown_direction() {
    let session = group_calls(vec![invite(1, "a", 1, "100", "200")], None).remove(0);
    assert_eq!(session.direction, CallDirection::Unknown);
    let session = group_calls(vec![invite(1, "a", 1, "100", "200")], Some("")).remove(0);
    assert_eq!(session.direction, CallDirection::Unknown);
}

fn status_of(methods: &[&str]) -> CallStatus {
    let records = methods
        .iter()
        .enumerate()
        .map(|(i, m)| record(i as u64, "a", i as i64, m))
        .collect();
    group_calls(records, None).remove(0).status
}

#[test]
fn test_status_from_highest_code() {
    assert_eq!(status_of(&["INVITE", "100", "180", "200", "ACK"]), CallStatus::Answered);
    assert_eq!(status_of(&["INVITE", "180", "486"]), CallStatus::Busy);
    assert_eq!(status_of(&["INVITE", "180", "487", "200"]), CallStatus::Cancelled);
    assert_eq!(status_of(&["INVITE", "408"]), CallStatus::NoAnswer);
    assert_eq!(status_of(&["INVITE", "480"]), CallStatus::NoAnswer);
    assert_eq!(status_of(&["INVITE", "503"]), CallStatus::Failed);
    assert_eq!(status_of(&["INVITE", "404"]), CallStatus::Failed);
    assert_eq!(status_of(&["INVITE", "100", "183"]), CallStatus::Ringing);
    assert_eq!(status_of(&["INVITE", "302"]), CallStatus::Ringing);
    assert_eq!(status_of(&["INVITE"]), CallStatus::Unknown);
    assert_eq!(CallStatus::NoAnswer.as_str(), "no answer");
    assert_eq!(CallStatus::Unknown.as_str(), "");
}

#[test]
fn test_status_field_is_considered() {
    let mut reply = record(2, "a", 2, "INVITE");
    reply.status = 486;
    let mut internal = record(1, "a", 1, "INVITE");
    internal.status = 2;
    let session = group_calls(vec![internal, reply], None).remove(0);
    assert_eq!(session.status, CallStatus::Busy);

    let mut low = record(1, "b", 1, "INVITE");
    low.status = 3;
    assert_eq!(group_calls(vec![low], None)[0].status, CallStatus::Unknown);
}

#[test]
fn test_record_deserializes_loose_collector_fields() {
    let record: RawSignalRecord = serde_json::from_value(serde_json::json!({
        "id": 5, "create_date": 1700000000000i64, "sid": "x@y", "method": 200,
        "cseq": 12, "status": "486", "from_user": null, "srcPort": 5060
    }))
    .unwrap();
    assert_eq!(record.method, "200");
    assert_eq!(record.cseq, "12");
    assert_eq!(record.status, 486);
    assert_eq!(record.from_user, "");
    assert_eq!(record.call_id, "x@y");
}

// discovery

#[tokio::test]
async fn test_discovery_walks_backward() {
    let (collector, windows) = paged_collector(vec![
        vec![
            record(1, "a", 300, "BYE"),
            record(2, "b", 290, "INVITE"),
            record(3, "a", 280, "INVITE"),
        ],
        vec![record(4, "c", 200, "INVITE"), record(5, "d", 190, "INVITE")],
    ]);

    let sessions = discover_with(
        &collector,
        TimeRange::new(0, 1_000),
        "",
        None,
        50,
        options(3, 10),
    )
    .await
    .unwrap();

    let windows = windows.lock().unwrap().clone();
    assert_eq!(windows, vec![TimeRange::new(0, 1_000), TimeRange::new(0, 279)]);
    let ids: Vec<&str> = sessions.iter().map(|s| s.call_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c", "d"]);
    assert_eq!(sessions[1].record_count, 2);
}

#[tokio::test]
async fn test_discovery_sends_compiled_filter() {
    let mut collector = MockCollector::new();
    collector
        .expect_search()
        .withf(|request| {
            request.smartinput() == "data_header.from_user = '999%'"
                && request.param.limit == PAGE_LIMIT
        })
        .times(1)
        .returning(|_| Ok(Vec::new()));

    let sessions = discover(
        &collector,
        TimeRange::new(0, 10),
        "from_user = '999%'",
        None,
        10,
    )
    .await
    .unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_discovery_bounded_by_max_batches() {
    let requests = Arc::new(Mutex::new(0usize));
    let counter = requests.clone();
    let mut collector = MockCollector::new();
    collector.expect_search().returning(move |request| {
        *counter.lock().unwrap() += 1;
        let upper = request.timestamp.to;
        Ok(vec![
            record(1, &format!("call-{}", upper), upper, "INVITE"),
            record(2, &format!("call-{}", upper - 1), upper - 1, "INVITE"),
        ])
    });

    let sessions = discover_with(
        &collector,
        TimeRange::new(0, 10_000),
        "",
        None,
        1_000,
        options(2, 3),
    )
    .await
    .unwrap();
    assert_eq!(*requests.lock().unwrap(), 3);
    assert_eq!(sessions.len(), 6);
}

#[tokio::test]
async fn test_discovery_stops_mid_batch_at_max_calls() {
    let (collector, windows) = paged_collector(vec![vec![
        record(1, "a", 500, "BYE"),
        record(2, "b", 490, "INVITE"),
        record(3, "a", 480, "INVITE"),
        record(4, "c", 470, "INVITE"),
        record(5, "b", 460, "200"),
    ]]);

    let sessions = discover_with(
        &collector,
        TimeRange::new(0, 1_000),
        "",
        None,
        2,
        options(5, 10),
    )
    .await
    .unwrap();

    assert_eq!(windows.lock().unwrap().len(), 1);
    assert_eq!(sessions.len(), 2);
    // the rest of the page is not read once the limit is hit, so call "a"
    // loses its INVITE at 480 even though "a" was already counted
    let a = sessions.iter().find(|s| s.call_id == "a").unwrap();
    assert_eq!(a.record_count, 1);
    assert_eq!(a.records[0].id, 1);
}

#[tokio::test]
async fn test_discovery_never_exceeds_max_calls() {
    let (collector, _) = paged_collector(vec![
        (0..4)
            .map(|i| record(i, &format!("p1-{}", i), 1_000 - i as i64, "INVITE"))
            .collect(),
        (0..4)
            .map(|i| record(10 + i, &format!("p2-{}", i), 500 - i as i64, "INVITE"))
            .collect(),
    ]);
    let sessions = discover_with(
        &collector,
        TimeRange::new(0, 2_000),
        "",
        None,
        6,
        options(4, 10),
    )
    .await
    .unwrap();
    assert_eq!(sessions.len(), 6);
    let distinct: HashSet<&str> = sessions.iter().map(|s| s.call_id.as_str()).collect();
    assert_eq!(distinct.len(), 6);
}

#[tokio::test]
async fn test_discovery_empty_first_page() {
    let (collector, windows) = paged_collector(vec![]);
    let sessions = discover(&collector, TimeRange::new(0, 10), "", None, 10)
        .await
        .unwrap();
    assert!(sessions.is_empty());
    assert_eq!(windows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_discovery_stops_at_range_start() {
    let (collector, windows) = paged_collector(vec![vec![
        record(1, "a", 100, "INVITE"),
        record(2, "b", 100, "INVITE"),
    ]]);
    discover_with(
        &collector,
        TimeRange::new(100, 1_000),
        "",
        None,
        10,
        options(2, 10),
    )
    .await
    .unwrap();
    assert_eq!(windows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_discovery_aborts_on_search_failure() {
    let mut collector = MockCollector::new();
    let mut calls = 0;
    collector.expect_search().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Ok(vec![record(1, "a", 50, "INVITE"), record(2, "b", 40, "INVITE")])
        } else {
            Err(CollectorError::Status {
                op: "search",
                status: 502,
                body: "bad gateway".to_string(),
            })
        }
    });

    let err = discover_with(
        &collector,
        TimeRange::new(0, 100),
        "",
        None,
        10,
        options(2, 10),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Collector(CollectorError::Status { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_discovery_rejects_bad_query_before_searching() {
    let mut collector = MockCollector::new();
    collector.expect_search().never();
    let err = discover(&collector, TimeRange::new(0, 10), "from_user =", None, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
    assert!(err.to_string().contains("expected value"));
}

#[tokio::test]
async fn test_discovery_zero_max_calls() {
    let mut collector = MockCollector::new();
    collector.expect_search().never();
    let sessions = discover(&collector, TimeRange::new(0, 10), "", None, 0)
        .await
        .unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_discovery_applies_reference_number() {
    let (collector, _) = paged_collector(vec![vec![
        invite(1, "a", 10, "+15550100", "15550199"),
    ]]);
    let sessions = discover(
        &collector,
        TimeRange::new(0, 100),
        "",
        Some("15550199"),
        5,
    )
    .await
    .unwrap();
    assert_eq!(sessions[0].direction, CallDirection::In);
}

#[tokio::test]
async fn test_discovery_handles_minimum_timestamp() {
    let (collector, windows) = paged_collector(vec![vec![record(1, "a", i64::MIN, "INVITE")]]);
    let sessions = discover_with(
        &collector,
        TimeRange::new(0, 100),
        "",
        None,
        10,
        options(1, 10),
    )
    .await
    .unwrap();
    assert_eq!(windows.lock().unwrap().len(), 1);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].start_time, i64::MIN);
}
