//! Error signature extraction and retry classification
//!
//! Jamf Pro reports failures through loosely formatted text, so the status of a
//! failed attempt is recovered by scanning diagnostic text against an ordered
//! pattern table. Order matters: status-code rules come before the phrase-only
//! rules, and the first rule that matches wins.

use std::fmt;
use tfplug::types::Diagnostics;

/// HTTP-like status and symbolic code recovered from a failed attempt.
/// The default (0, "") means nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ErrorInfo {
    pub status_code: u16,
    pub error_code: String,
}

impl ErrorInfo {
    pub fn new(status_code: u16, error_code: impl Into<String>) -> Self {
        Self {
            status_code,
            error_code: error_code.into(),
        }
    }

    pub fn is_unclassified(&self) -> bool {
        self.status_code == 0 && self.error_code.is_empty()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unclassified() {
            write!(f, "unclassified")
        } else {
            write!(f, "{} {}", self.status_code, self.error_code)
        }
    }
}

/// One row of the extraction table: any needle matching yields the result
struct ErrorPattern {
    needles: &'static [&'static str],
    status_code: u16,
    error_code: &'static str,
}

impl ErrorPattern {
    fn matches(&self, text: &str) -> bool {
        self.needles.iter().any(|needle| text.contains(needle))
    }

    fn info(&self) -> ErrorInfo {
        ErrorInfo::new(self.status_code, self.error_code)
    }
}

const fn pattern(
    needles: &'static [&'static str],
    status_code: u16,
    error_code: &'static str,
) -> ErrorPattern {
    ErrorPattern {
        needles,
        status_code,
        error_code,
    }
}

// Several phrase rows can never fire ("throttl" shadows "request throttled",
// "not found" shadows "resource not found"); they stay so the table reads the
// same as the API's documented error vocabulary.
const ERROR_PATTERNS: &[ErrorPattern] = &[
    pattern(&["404", "not found"], 404, "NotFound"),
    pattern(&["400", "bad request"], 400, "BadRequest"),
    pattern(&["401", "unauthorized"], 401, "Unauthorized"),
    pattern(&["403", "forbidden"], 403, "Forbidden"),
    pattern(&["409", "conflict"], 409, "Conflict"),
    pattern(&["423", "locked"], 423, "Locked"),
    pattern(&["429", "too many requests", "throttl"], 429, "TooManyRequests"),
    pattern(&["500", "internal server error"], 500, "InternalServerError"),
    pattern(&["502", "bad gateway"], 502, "BadGateway"),
    pattern(&["503", "service unavailable"], 503, "ServiceUnavailable"),
    pattern(&["504", "gateway timeout"], 504, "GatewayTimeout"),
    pattern(&["request throttled"], 429, "RequestThrottled"),
    pattern(&["resource not found"], 404, "ResourceNotFound"),
    pattern(&["network error"], 500, "NetworkError"),
    pattern(&["timeout"], 504, "RequestTimeout"),
];

/// Classify the first message that matches any pattern.
pub fn extract_error_info<I, S>(messages: I) -> ErrorInfo
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for message in messages {
        let text = message.as_ref().to_lowercase();
        if let Some(pattern) = ERROR_PATTERNS.iter().find(|p| p.matches(&text)) {
            return pattern.info();
        }
    }

    ErrorInfo::default()
}

/// Classify the error diagnostics of one attempt; warnings are ignored.
pub fn extract_error_from_diagnostics(diagnostics: &Diagnostics) -> ErrorInfo {
    extract_error_info(
        diagnostics
            .errors()
            .map(|d| format!("{} {}", d.summary, d.detail)),
    )
}

/// Which kind of API call failed. Reads tolerate propagation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// Retry decision for one classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDisposition {
    Retryable,
    Terminal,
    /// Nothing in either table; retried like a transient error
    Unknown,
}

const READ_RETRYABLE_STATUS: &[u16] = &[404, 409, 423, 429, 500, 502, 503, 504];

const READ_RETRYABLE_CODES: &[&str] = &[
    "ServiceUnavailable",
    "RequestThrottled",
    "RequestTimeout",
    "InternalServerError",
    "BadGateway",
    "GatewayTimeout",
    "NotFound",
    "ResourceNotFound",
    "NetworkError",
];

const WRITE_RETRYABLE_STATUS: &[u16] = &[429, 500, 502, 503, 504];

const WRITE_RETRYABLE_CODES: &[&str] = &[
    "TooManyRequests",
    "ServiceUnavailable",
    "RequestThrottled",
    "RequestTimeout",
    "InternalServerError",
    "BadGateway",
    "GatewayTimeout",
    "NetworkError",
];

const TERMINAL_STATUS: &[u16] = &[200, 204, 400, 401, 403, 405, 406, 410, 422];

const TERMINAL_CODES: &[&str] = &[
    "BadRequest",
    "Unauthorized",
    "Forbidden",
    "Gone",
    "UnprocessableEntity",
    "ValidationError",
];

// 404/409/423 mean the request itself was wrong when writing
const WRITE_TERMINAL_STATUS: &[u16] = &[404, 409, 423];

const WRITE_TERMINAL_CODES: &[&str] = &["NotFound", "ResourceNotFound", "Conflict", "Locked"];

pub fn is_non_retryable_read_error(info: &ErrorInfo) -> bool {
    TERMINAL_STATUS.contains(&info.status_code)
        || TERMINAL_CODES.contains(&info.error_code.as_str())
}

pub fn is_retryable_read_error(info: &ErrorInfo) -> bool {
    READ_RETRYABLE_STATUS.contains(&info.status_code)
        || READ_RETRYABLE_CODES.contains(&info.error_code.as_str())
}

pub fn classify(info: &ErrorInfo, kind: OperationKind) -> ReadDisposition {
    match kind {
        OperationKind::Read => {
            if is_non_retryable_read_error(info) {
                ReadDisposition::Terminal
            } else if is_retryable_read_error(info) {
                ReadDisposition::Retryable
            } else {
                ReadDisposition::Unknown
            }
        }
        OperationKind::Write => {
            if is_non_retryable_read_error(info)
                || WRITE_TERMINAL_STATUS.contains(&info.status_code)
                || WRITE_TERMINAL_CODES.contains(&info.error_code.as_str())
            {
                ReadDisposition::Terminal
            } else if WRITE_RETRYABLE_STATUS.contains(&info.status_code)
                || WRITE_RETRYABLE_CODES.contains(&info.error_code.as_str())
            {
                ReadDisposition::Retryable
            } else {
                ReadDisposition::Unknown
            }
        }
    }
}

/// Unknown failures count as retryable: an unrecognised error is assumed transient.
pub fn is_retryable(info: &ErrorInfo, kind: OperationKind) -> bool {
    classify(info, kind) != ReadDisposition::Terminal
}
