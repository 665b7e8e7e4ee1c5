//! Error types for the backend client.

use thiserror::Error;
use vista_core::VistaError;

/// Backend client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, TLS)
    #[error("HTTP error on {target}: {source}")]
    Http {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("{target} returned HTTP {status}: {detail}")]
    Status {
        target: String,
        status: u16,
        detail: String,
    },

    /// Body did not match the expected shape
    #[error("Failed to decode response from {target}: {message}")]
    Decode { target: String, message: String },

    /// Client could not be built
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn http(target: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            target: target.into(),
            source,
        }
    }

    /// Classify a non-2xx response.
    ///
    /// The backend wraps messages as `{"detail": "..."}`; the raw body is kept
    /// when it does not.
    pub fn from_http_status(target: impl Into<String>, status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        Self::Status {
            target: target.into(),
            status,
            detail,
        }
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http { source, .. } if source.is_timeout())
    }
}

impl From<ClientError> for VistaError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status {
                status: 401 | 403,
                detail,
                ..
            } => VistaError::Forbidden { message: detail },
            ClientError::Status {
                status: 404,
                target,
                ..
            } => VistaError::NotFound { what: target },
            ClientError::Status {
                target,
                status,
                detail,
            } => VistaError::fetch(target, format!("HTTP {status}: {detail}")),
            ClientError::Http { target, source } => VistaError::fetch(target, source.to_string()),
            ClientError::Decode { target, message } => VistaError::Decode { target, message },
            ClientError::Config(message) => VistaError::ConfigValidation { message },
        }
    }
}

/// Result type for raw client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_extracted() {
        let err = ClientError::from_http_status("/api/views/v1", 403, r#"{"detail":"Not your view"}"#);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Not your view"));
    }

    #[test]
    fn test_status_mapping() {
        let forbidden: VistaError = ClientError::from_http_status("/x", 401, "").into();
        assert!(forbidden.is_authorization());

        let missing: VistaError = ClientError::from_http_status("/api/views/v9", 404, "{}").into();
        assert!(matches!(missing, VistaError::NotFound { ref what } if what == "/api/views/v9"));

        let server: VistaError = ClientError::from_http_status("/x", 502, "bad gateway").into();
        assert!(server.is_retryable());
        assert!(server.to_string().contains("502"));
    }

    #[test]
    fn test_decode_maps_to_decode() {
        let err: VistaError = ClientError::Decode {
            target: "/x".into(),
            message: "missing field".into(),
        }
        .into();
        assert!(matches!(err, VistaError::Decode { .. }));
    }
}
