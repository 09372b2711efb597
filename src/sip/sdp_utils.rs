use once_cell::sync::Lazy;
use regex::Regex;

static AUDIO_MEDIA_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^m=audio\s+(\d+)").expect("valid m= pattern"));
static RTPMAP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^a=rtpmap:\d+\s+([^/\s]+)/\d+").expect("valid rtpmap pattern"));

/// Message body after the first blank line, trimmed. Empty when there is no body separator.
pub fn extract_sdp(message: &str) -> String {
    let mut offset = 0;
    for line in message.split_inclusive('\n') {
        offset += line.len();
        if line.trim().is_empty() {
            return message[offset..].trim().to_string();
        }
    }
    String::new()
}

/// Compact audio descriptor of the SDP body: `"<codec> :<port>"`, `":<port>"` when no
/// rtpmap line is present, or "" when there is no audio media line.
pub fn extract_media_summary(message: &str) -> String {
    let sdp = extract_sdp(message);
    let Some(port) = AUDIO_MEDIA_LINE
        .captures(&sdp)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return String::new();
    };
    match RTPMAP_LINE
        .captures(&sdp)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    {
        Some(codec) => format!("{} :{}", codec, port),
        None => format!(":{}", port),
    }
}
