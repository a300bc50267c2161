//! Encoders shared across the Aadhaar and AA pipelines
//!
//! Unpadded base64url for JWS segments, standard base64 for XML payloads and
//! AA blobs, XML attribute escaping, and the two timestamp dialects: IST
//! (+05:30) for the UIDAI envelope, UTC with a trailing `Z` everywhere else.

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// Encode to unpadded base64url (RFC 4648 §5, no `=`).
pub fn b64url_encode(data: &[u8]) -> String {
    BASE64_URL.encode(data)
}

/// Decode unpadded base64url.
pub fn b64url_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL.decode(data.as_bytes())
}

/// Encode to standard base64 with padding.
pub fn b64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode standard base64.
pub fn b64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data.trim().as_bytes())
}

/// Escape the five XML entities. Applied to every attribute value and text
/// node that reaches a PID or Auth envelope.
pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// IST offset: +05:30
fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is valid")
}

/// Format an instant as the UIDAI envelope expects: `YYYY-MM-DDTHH:MM:SS+05:30`.
pub fn ist_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&ist_offset())
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

/// Format an instant as ISO-8601 UTC with a trailing `Z`, seconds precision.
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format an instant as ISO-8601 UTC with millisecond precision, as AA
/// payload timestamps carry.
pub fn utc_timestamp_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
