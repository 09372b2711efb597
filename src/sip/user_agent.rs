use once_cell::sync::Lazy;
use regex::Regex;

static ASTERISK_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)asterisk\D*?(\d+(?:\.\d+)+)").expect("valid asterisk pattern")
});
static FREEPBX_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FPBX.*?\((\d+(?:\.\d+)*)\)").expect("valid FPBX pattern"));

/// Normalize known PBX user agents to `<product> <version>`.
///
/// `Asterisk PBX 11.13.1~dfsg-2+deb8u4` becomes `Asterisk 11.13.1` and
/// `FPBX-15.0.16.75(16.13.0)` becomes `FPBX 16.13.0`; anything else is returned as is.
pub fn format_user_agent(ua: &str) -> String {
    if let Some(version) = ASTERISK_VERSION.captures(ua).and_then(|c| c.get(1)) {
        return format!("Asterisk {}", version.as_str());
    }
    if let Some(version) = FREEPBX_VERSION.captures(ua).and_then(|c| c.get(1)) {
        return format!("FPBX {}", version.as_str());
    }
    ua.to_string()
}
