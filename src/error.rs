use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error types for the classifier runner and the Gmail API boundary
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Search query rejected by Gmail
    #[error("Malformed query '{query}': {reason}")]
    MalformedQuery { query: String, reason: String },

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Classifier could not be constructed
    #[error("Invalid classifier: {0}")]
    InvalidClassifier(String),

    /// Label-related errors
    #[error("Label error: {0}")]
    LabelError(String),

    /// A handler failed on one message
    #[error("Handler for classifier '{classifier}' failed on message {message_id}: {source}")]
    HandlerFailed {
        classifier: String,
        message_id: String,
        #[source]
        source: Box<HandlerError>,
    },

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GmailError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GmailError::RateLimitExceeded { .. }
                | GmailError::ServerError { .. }
                | GmailError::NetworkError(_)
        )
    }

    /// Authentication errors abort a whole run, everything else is isolated
    pub fn is_fatal(&self) -> bool {
        matches!(self, GmailError::AuthError(_))
    }
}

/// Failure reported by a [`crate::handlers::MessageHandler`]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A Gmail call made by the handler failed
    #[error(transparent)]
    Gmail(#[from] GmailError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outgoing message could not be built
    #[error("Email build error: {0}")]
    Email(String),

    /// Handler-specific failure
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }
}

impl From<lettre::error::Error> for HandlerError {
    fn from(error: lettre::error::Error) -> Self {
        HandlerError::Email(error.to_string())
    }
}

impl From<lettre::address::AddressError> for HandlerError {
    fn from(error: lettre::address::AddressError) -> Self {
        HandlerError::Email(format!("invalid address: {}", error))
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// The Retry-After header can be specified in two formats:
/// 1. Delay-seconds: An integer indicating seconds to wait (e.g., "120")
/// 2. HTTP-date: An HTTP date format (e.g., "Wed, 21 Oct 2015 07:28:00 GMT")
///
/// Returns the number of seconds to wait. If the header is missing or invalid,
/// returns a default of 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let Some(value) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.parse::<u64>() {
        return seconds;
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|when| when.duration_since(std::time::SystemTime::now()).ok())
        .map(|d| d.as_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Map an HTTP error status onto the error taxonomy
fn from_status(status_code: u16, message: String, retry_after: u64) -> GmailError {
    match status_code {
        429 => GmailError::RateLimitExceeded { retry_after },
        401 => GmailError::AuthError(message),
        404 => GmailError::MessageNotFound(message),
        400 => GmailError::BadRequest(message),
        403 => GmailError::Forbidden(message),
        500..=599 => GmailError::ServerError {
            status: status_code,
            message,
        },
        _ => GmailError::ApiError(message),
    }
}

/// Google error bodies look like `{"error": {"code": 429, "message": "..."}}`
fn from_error_body(body: &serde_json::Value) -> GmailError {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let error = &body["error"];
    let message = match error["message"].as_str() {
        Some(text) => text.to_string(),
        None => body.to_string(),
    };

    match error["code"].as_u64().and_then(|code| u16::try_from(code).ok()) {
        Some(status_code) => from_status(
            status_code,
            format!("HTTP {}: {}", status_code, message),
            DEFAULT_RETRY_AFTER,
        ),
        None => GmailError::BadRequest(message),
    }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );
                from_status(status_code, message, parse_retry_after_header(response))
            }
            // Non-2xx responses with a JSON body land here, whatever the status
            google_gmail1::Error::BadRequest(ref body) => from_error_body(body),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("Missing token: {}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let rate_limit = GmailError::RateLimitExceeded { retry_after: 5 };
        assert!(rate_limit.is_transient());

        let server_error = GmailError::ServerError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(server_error.is_transient());

        assert!(GmailError::NetworkError("Connection timeout".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        let malformed = GmailError::MalformedQuery {
            query: "from:(".to_string(),
            reason: "HTTP 400".to_string(),
        };
        assert!(!malformed.is_transient());
        assert!(!GmailError::MessageNotFound("msg123".to_string()).is_transient());
        assert!(!GmailError::Forbidden("Access denied".to_string()).is_transient());
    }

    #[test]
    fn test_only_auth_is_fatal() {
        assert!(GmailError::AuthError("revoked".to_string()).is_fatal());
        assert!(!GmailError::NetworkError("reset".to_string()).is_fatal());
        assert!(!GmailError::BadRequest("bad".to_string()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let error = GmailError::RateLimitExceeded { retry_after: 10 };
        let display = format!("{}", error);
        assert!(display.contains("Rate limit exceeded"));
        assert!(display.contains("10 seconds"));

        let handler = GmailError::HandlerFailed {
            classifier: "Uber".to_string(),
            message_id: "m1".to_string(),
            source: Box::new(HandlerError::failed("disk full")),
        };
        let display = handler.to_string();
        assert!(display.contains("Uber"));
        assert!(display.contains("m1"));
        assert!(display.contains("disk full"));
    }

    #[test]
    fn test_handler_error_wraps_gmail_error() {
        let err: HandlerError = GmailError::LabelError("gone".to_string()).into();
        assert_eq!(err.to_string(), "Label error: gone");
    }

    fn json_error(code: u16) -> google_gmail1::Error {
        google_gmail1::Error::BadRequest(serde_json::json!({
            "error": {
                "code": code,
                "message": "Request failed",
                "status": "FAILED"
            }
        }))
    }

    #[test]
    fn test_json_error_bodies_map_by_status_code() {
        assert!(matches!(
            GmailError::from(json_error(400)),
            GmailError::BadRequest(ref msg) if msg.contains("Request failed")
        ));
        assert!(GmailError::from(json_error(401)).is_fatal());
        assert!(matches!(
            GmailError::from(json_error(404)),
            GmailError::MessageNotFound(_)
        ));
        assert!(matches!(
            GmailError::from(json_error(403)),
            GmailError::Forbidden(_)
        ));

        let rate_limited = GmailError::from(json_error(429));
        assert!(matches!(
            rate_limited,
            GmailError::RateLimitExceeded { retry_after: 5 }
        ));
        assert!(rate_limited.is_transient());

        let unavailable = GmailError::from(json_error(503));
        assert!(matches!(
            unavailable,
            GmailError::ServerError { status: 503, .. }
        ));
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_json_error_body_without_code_is_bad_request() {
        let err = GmailError::from(google_gmail1::Error::BadRequest(serde_json::json!({
            "error": "invalid_grant"
        })));
        assert!(matches!(err, GmailError::BadRequest(ref msg) if msg.contains("invalid_grant")));
    }

    #[test]
    fn test_parse_retry_after_header_integer() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("120"),
        );

        assert_eq!(parse_retry_after_header(&response), 120);
    }

    #[test]
    fn test_parse_retry_after_header_missing_or_invalid() {
        let response = hyper::Response::builder().status(429).body(()).unwrap();
        assert_eq!(parse_retry_after_header(&response), 5);

        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("invalid"),
        );
        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        let future_time = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&httpdate::fmt_http_date(future_time)).unwrap(),
        );

        let retry_after = parse_retry_after_header(&response);
        assert!((58..=61).contains(&retry_after), "Expected ~60, got {}", retry_after);
    }

    #[test]
    fn test_parse_retry_after_header_past_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        let past_time = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&httpdate::fmt_http_date(past_time)).unwrap(),
        );

        assert_eq!(parse_retry_after_header(&response), 5);
    }
}
