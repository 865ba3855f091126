//! Utility functions with platform-specific implementations.

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};
use memchr::memmem;

/// Milliseconds since the Unix epoch.
///
/// On native platforms, uses `SystemTime::now()`.
/// On WASM, uses `js_sys::Date::now()`.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> u64 {
    js_sys::Date::now() as u64
}

/// Format epoch milliseconds as an ISO-8601 UTC timestamp.
///
/// ```ignore
/// assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
/// ```
pub fn iso_timestamp(millis: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode page bytes: UTF-8 when valid (BOM honoured), else the declared
/// charset, else Windows-1252 as browsers do for legacy pages.
pub fn decode_text<'a>(bytes: &'a [u8], declared: Option<&str>) -> Cow<'a, str> {
    if let (text, _, false) = encoding_rs::UTF_8.decode(bytes) {
        return text;
    }
    let fallback = declared
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::WINDOWS_1252);
    fallback.decode(bytes).0
}

/// Extract the declared charset from a `<meta charset=...>` (or the
/// `http-equiv` content variant) in the first kilobyte of a page.
pub fn extract_meta_charset(bytes: &[u8]) -> Option<&str> {
    let head = &bytes[..bytes.len().min(1024)];
    let at = memmem::find(&head.to_ascii_lowercase(), b"charset=")? + b"charset=".len();
    let value = head[at..].strip_prefix(b"\"").or_else(|| head[at..].strip_prefix(b"'")).unwrap_or(&head[at..]);
    let len = value
        .iter()
        .take_while(|&&b| !(matches!(b, b'"' | b'\'' | b';' | b'>' | b'/') || b.is_ascii_whitespace()))
        .count();
    (len > 0).then(|| std::str::from_utf8(&value[..len]).ok()).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_epoch() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_decode_utf8_passthrough() {
        let text = decode_text("∫ x dx".as_bytes(), None);
        assert!(matches!(text, Cow::Borrowed(_)));
        assert_eq!(text, "∫ x dx");
    }

    #[test]
    fn test_decode_falls_back_to_hint() {
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("latin1")), "caf\u{e9}");
        assert_eq!(decode_text(bytes, None), "caf\u{e9}");
    }

    #[test]
    fn test_extract_meta_charset_variants() {
        assert_eq!(extract_meta_charset(br#"<meta charset="utf-8">"#), Some("utf-8"));
        assert_eq!(extract_meta_charset(b"<META CHARSET=iso-8859-1>"), Some("iso-8859-1"));
        assert_eq!(
            extract_meta_charset(
                br#"<meta http-equiv="Content-Type" content="text/html; charset=windows-1252">"#
            ),
            Some("windows-1252")
        );
        assert_eq!(extract_meta_charset(b"<p>no charset</p>"), None);
    }
}
