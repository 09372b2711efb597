use std::collections::HashMap;

/// Lines of the header block: everything before the first blank line.
fn header_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines().take_while(|line| !line.trim().is_empty())
}

/// Split a header line into name and trimmed value.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Case-insensitive lookup of a single header. Returns "" when absent.
pub fn extract_header(raw: &str, name: &str) -> String {
    for line in header_lines(raw) {
        if let Some(rest) = line
            .get(..name.len())
            .filter(|head| head.eq_ignore_ascii_case(name))
            .and_then(|_| line[name.len()..].strip_prefix(':'))
        {
            return rest.trim().to_string();
        }
    }
    String::new()
}

/// All headers whose name starts with `prefix` (case-insensitive).
/// The first occurrence of a repeated header wins.
pub fn extract_headers_by_prefix(raw: &str, prefix: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in header_lines(raw) {
        if let Some((name, value)) = split_header(line) {
            if has_prefix_ignore_case(name, prefix) {
                headers
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    headers
}

/// Every header of the message, skipping the request/status line.
pub fn extract_all_headers(raw: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in header_lines(raw).skip(1) {
        if let Some((name, value)) = split_header(line) {
            headers
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    headers
}
