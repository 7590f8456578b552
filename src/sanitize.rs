//! Redaction helpers for text that leaves the process.
//!
//! Revert reasons, service error bodies and error messages all pass through
//! here before they are logged, displayed or persisted.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length (in characters) of a persisted revert reason.
pub const MAX_REVERT_REASON_CHARS: usize = 200;

/// Maximum length (in characters) of a service response body kept in errors.
pub const MAX_ERROR_BODY_CHARS: usize = 256;

const HEX_PLACEHOLDER: &str = "[hex]";
const ELLIPSIS: char = '…';

static LONG_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:0[xX])?[0-9a-fA-F]{10,}").expect("static regex"));

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\r\n]+\s*").expect("static regex"));

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(bearer)\s+[a-z0-9._\-~+/]+=*", "$1 [REDACTED]"),
        (
            r"(?i)\b(token|api[_\-]?key|secret|password|private[_\-]?key)\b(\s*[:=]\s*)([^,\s]+)",
            "$1$2[REDACTED]",
        ),
        (r"(?i)\bsk-[a-z0-9\-]{10,}\b", "sk-[REDACTED]"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("static regex"), replacement))
    .collect()
});

/// Replace every hex run of 10+ characters with a placeholder.
pub fn strip_long_hex(raw: &str) -> String {
    LONG_HEX.replace_all(raw, HEX_PLACEHOLDER).into_owned()
}

/// Truncate to `max` characters, ending with an ellipsis when shortened.
pub fn truncate_chars(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(max.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

/// Scrub a raw revert reason for display and persistence.
pub fn scrub_revert_reason(raw: &str) -> String {
    let without_hex = strip_long_hex(raw);
    let single_line = LINE_BREAKS.replace_all(&without_hex, " ");
    truncate_chars(single_line.trim(), MAX_REVERT_REASON_CHARS)
}

/// Remove credentials and long hex blobs from free-form error text.
pub fn redact_sensitive_detail(raw: &str) -> String {
    let mut value = raw.to_string();
    for (re, replacement) in SECRET_PATTERNS.iter() {
        value = re.replace_all(&value, *replacement).into_owned();
    }
    strip_long_hex(&value)
}

/// Redact and shorten an HTTP response body before it is carried in an error.
pub fn truncate_error_body(raw: &str) -> String {
    truncate_chars(
        LINE_BREAKS.replace_all(&redact_sensitive_detail(raw), " ").trim(),
        MAX_ERROR_BODY_CHARS,
    )
}
