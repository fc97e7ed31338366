//! Failure taxonomy for the render service.

use meshforge_core::StageError;
use thiserror::Error;

/// A classified render failure.
///
/// The three kinds mirror what the caller can act on: a transport problem
/// (service unreachable), a rejection or crash reported by the service
/// (carries the service's own diagnostics, including the renderer log), and
/// a success status whose body could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The render service could not be reached.
    #[error("{message}")]
    Network {
        /// What went wrong at the transport level.
        message: String,
        /// Remediation guidance for the user.
        details: String,
    },

    /// The render service answered with a failure status.
    #[error("{message}")]
    Server {
        /// The service's error summary, or `HTTP <status>` when the body
        /// carried no structured error.
        message: String,
        /// The service's detail text, or the raw body.
        details: String,
        /// The renderer log captured by the service, if any.
        log: String,
    },

    /// The service reported success but the response body was unreadable.
    #[error("{message}")]
    MalformedResponse {
        /// What went wrong while reading the body.
        message: String,
    },
}

impl RenderError {
    /// The headline message for this failure.
    pub fn message(&self) -> &str {
        match self {
            RenderError::Network { message, .. } => message,
            RenderError::Server { message, .. } => message,
            RenderError::MalformedResponse { message } => message,
        }
    }

    /// Detail or guidance text. Empty when there is none.
    pub fn details(&self) -> &str {
        match self {
            RenderError::Network { details, .. } => details,
            RenderError::Server { details, .. } => details,
            RenderError::MalformedResponse { .. } => "",
        }
    }

    /// The renderer log. Empty for everything but structured server
    /// failures.
    pub fn log(&self) -> &str {
        match self {
            RenderError::Server { log, .. } => log,
            _ => "",
        }
    }

    /// Classifies a transport-level failure.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("render request timed out: {}", err)
        } else if err.is_connect() {
            format!("could not connect to render service: {}", err)
        } else {
            format!("network error reaching render service: {}", err)
        };
        RenderError::Network {
            message,
            details: "Check that the render service is running and its base URL is correct."
                .to_string(),
        }
    }
}

impl StageError for RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::Network { .. } => "RENDER_001",
            RenderError::Server { .. } => "RENDER_002",
            RenderError::MalformedResponse { .. } => "RENDER_003",
        }
    }

    fn category(&self) -> &'static str {
        "render"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessors() {
        let err = RenderError::Server {
            message: "E".to_string(),
            details: "D".to_string(),
            log: "L".to_string(),
        };
        assert_eq!(err.message(), "E");
        assert_eq!(err.details(), "D");
        assert_eq!(err.log(), "L");
        assert_eq!(err.to_string(), "E");
    }

    #[test]
    fn test_network_log_is_empty() {
        let err = RenderError::Network {
            message: "refused".to_string(),
            details: "guidance".to_string(),
        };
        assert_eq!(err.log(), "");
        assert_eq!(err.details(), "guidance");
    }

    #[test]
    fn test_error_codes() {
        let network = RenderError::Network {
            message: String::new(),
            details: String::new(),
        };
        let server = RenderError::Server {
            message: String::new(),
            details: String::new(),
            log: String::new(),
        };
        let malformed = RenderError::MalformedResponse {
            message: String::new(),
        };
        assert_eq!(network.code(), "RENDER_001");
        assert_eq!(server.code(), "RENDER_002");
        assert_eq!(malformed.code(), "RENDER_003");
        assert_eq!(network.category(), "render");
    }
}
