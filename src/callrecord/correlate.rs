use std::collections::HashMap;

use super::{CallDirection, CallSession, CallStatus, RawSignalRecord};

/// Group signaling records into call sessions, most recent call first.
///
/// `reference` is the number the direction is judged against; with `None` (or an
/// empty number) every session gets an unknown direction.
pub fn group_calls(records: Vec<RawSignalRecord>, reference: Option<&str>) -> Vec<CallSession> {
    let mut groups: HashMap<String, Vec<RawSignalRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.call_id.clone()).or_default().push(record);
    }

    let mut sessions: Vec<CallSession> = groups
        .into_iter()
        .filter_map(|(call_id, members)| build_session(call_id, members, reference))
        .collect();

    sessions.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.call_id.cmp(&b.call_id))
    });
    sessions
}

fn build_session(
    call_id: String,
    mut records: Vec<RawSignalRecord>,
    reference: Option<&str>,
) -> Option<CallSession> {
    records.sort_by_key(|r| r.timestamp);
    let first = records.first()?;
    let last = records.last()?;

    let party_source = records
        .iter()
        .find(|r| r.method.eq_ignore_ascii_case("INVITE"))
        .unwrap_or(first);
    let caller = party_source.from_user.clone();
    let callee = if party_source.to_user.is_empty() {
        party_source.ruri_user.clone()
    } else {
        party_source.to_user.clone()
    };

    let direction = reference
        .map(|number| direction(number, &caller, &callee))
        .unwrap_or_default();
    let status = CallStatus::from_code(records.iter().filter_map(terminal_code).max());

    Some(CallSession {
        call_id,
        start_time: first.timestamp,
        end_time: last.timestamp,
        duration_ms: last.timestamp.saturating_sub(first.timestamp),
        caller,
        callee,
        direction,
        status,
        record_count: records.len(),
        records,
    })
}

/// Highest SIP status code carried by a record, from its method text or status field.
fn terminal_code(record: &RawSignalRecord) -> Option<u16> {
    let from_method = record.method.trim().parse::<u16>().ok().filter(|c| *c >= 100);
    let from_status = u16::try_from(record.status).ok().filter(|c| *c >= 100);
    from_method.max(from_status)
}

fn strip_plus(number: &str) -> &str {
    number.trim().trim_start_matches('+')
}

/// A number matches the reference when either contains the other, ignoring a leading `+`.
fn number_matches(reference: &str, number: &str) -> bool {
    let number = strip_plus(number);
    !number.is_empty() && (number.contains(reference) || reference.contains(number))
}

pub fn direction(reference: &str, caller: &str, callee: &str) -> CallDirection {
    let reference = strip_plus(reference);
    if reference.is_empty() {
        return CallDirection::Unknown;
    }
    if number_matches(reference, caller) {
        CallDirection::Out
    } else if number_matches(reference, callee) {
        CallDirection::In
    } else {
        CallDirection::Unknown
    }
}
