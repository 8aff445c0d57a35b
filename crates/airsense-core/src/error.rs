//! Error types for airsense-core.
//!
//! Two layers:
//!
//! - [`ParseError`] is what the response parser returns for a body it could
//!   not turn into readings. It knows nothing about HTTP.
//! - [`Error`] is what a refresh cycle reports. It wraps parse failures with
//!   the HTTP status and raw body so the log line carries enough to diagnose
//!   a bad location or an expired key.
//!
//! | Error | Class | Fetch issued? |
//! |-------|-------|---------------|
//! | [`ParseError::Malformed`] | malformed response | yes |
//! | [`ParseError::NoObservation`] | no observation | yes |
//! | [`ParseError::MissingField`] | missing field | yes |
//! | [`Error::Network`] | network | yes |
//! | [`Error::HttpStatus`] | network | yes |
//! | [`Error::UnknownProvider`] | unknown provider | no |
//! | [`Error::InvalidUrl`] | configuration | no |
//!
//! None of these stop a sensor's refresh loop; the controller turns each into
//! a faulted publication and waits for the next tick.

use thiserror::Error;

use airsense_types::Provider;

/// Maximum number of body bytes kept in an error for logging.
pub const MAX_BODY_EXCERPT: usize = 512;

/// Failures decoding a provider response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Body is not valid JSON, or not the shape the provider documents.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The provider returned no observation (e.g. invalid zip code or station).
    #[error("no observation available")]
    NoObservation,

    /// A required field is absent from an otherwise well-formed response.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// The parser has no decoder for this provider.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// Errors reported by a refresh cycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The response could not be decoded into readings.
    #[error("{provider} response rejected (HTTP {status}): {source}")]
    Parse {
        /// Provider that produced the body.
        provider: Provider,
        /// HTTP status of the response.
        status: u16,
        /// Leading excerpt of the raw body.
        body: String,
        #[source]
        source: ParseError,
    },

    /// The request never produced a readable response.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-200 status.
    #[error("unexpected HTTP status {status}")]
    HttpStatus {
        /// HTTP status of the response.
        status: u16,
        /// Leading excerpt of the raw body.
        body: String,
    },

    /// The configured provider is not recognized, so no URL can be built.
    #[error("unknown air quality provider: {0}")]
    UnknownProvider(String),

    /// A configured base URL cannot be used to build a request.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Create a parse error, keeping an excerpt of the body.
    pub fn parse(provider: Provider, status: u16, body: &str, source: ParseError) -> Self {
        Self::Parse {
            provider,
            status,
            body: excerpt(body),
            source,
        }
    }

    /// Create an HTTP status error, keeping an excerpt of the body.
    pub fn http_status(status: u16, body: &str) -> Self {
        Self::HttpStatus {
            status,
            body: excerpt(body),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// HTTP status attached to this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Parse { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::Network(_) | Self::UnknownProvider(_) | Self::InvalidUrl(_) => None,
        }
    }

    /// Raw body excerpt attached to this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Parse { body, .. } | Self::HttpStatus { body, .. } => Some(body),
            Self::Network(_) | Self::UnknownProvider(_) | Self::InvalidUrl(_) => None,
        }
    }

    /// Whether the cycle failed before any request was issued.
    pub fn skipped_fetch(&self) -> bool {
        matches!(self, Self::UnknownProvider(_) | Self::InvalidUrl(_))
    }
}

/// Truncate a body on a char boundary for logging.
fn excerpt(body: &str) -> String {
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Result type alias using airsense-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownProvider("purpleair".to_string());
        assert_eq!(err.to_string(), "unknown air quality provider: purpleair");

        let err = Error::http_status(401, "Invalid API key");
        assert_eq!(err.to_string(), "unexpected HTTP status 401");

        let err = Error::parse(Provider::AirNow, 200, "[]", ParseError::NoObservation);
        assert!(err.to_string().contains("airnow"));
        assert!(err.to_string().contains("no observation"));

        let err = ParseError::MissingField("AQI");
        assert_eq!(err.to_string(), "missing field `AQI`");
    }

    #[test]
    fn test_error_diagnostics() {
        let err = Error::parse(
            Provider::Aqicn,
            200,
            r#"{"status":"error"}"#,
            ParseError::NoObservation,
        );
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.body(), Some(r#"{"status":"error"}"#));

        let err = Error::network("connection refused");
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }

    #[test]
    fn test_error_source_is_parse_error() {
        use std::error::Error as _;

        let err = Error::parse(Provider::AirNow, 200, "x", ParseError::Malformed("x".into()));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("malformed"));
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let body = "é".repeat(MAX_BODY_EXCERPT);
        let err = Error::http_status(500, &body);
        let kept = err.body().unwrap();
        assert!(kept.ends_with("..."));
        assert!(kept.len() <= MAX_BODY_EXCERPT + 3);
    }
}
