use std::io;
use thiserror::Error;

/// Error types for the downloader.
///
/// The variants follow how fatal a failure is for a run:
/// - `Config` and `Auth` stop the whole command
/// - `Api` stops a listing, but only skips one video inside a batch
/// - `Permission` is always per-video
/// - `NotFound` is raised when an explicitly requested video does not exist

/// Represents all possible errors that can occur in the application.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    #[error("No downloadable rendition for '{name}' (ID: {video_id})")]
    Permission { video_id: String, name: String },

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AppError {
    /// Raw response body carried by API errors, shown in debug mode.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            AppError::Api { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }

    /// Whether this error should end the run instead of skipping one video.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_status() {
        let err = AppError::Api {
            status: 403,
            message: "forbidden".into(),
            body: r#"{"error":"forbidden"}"#.into(),
        };
        assert_eq!(err.to_string(), "API error (403): forbidden");
        assert_eq!(err.response_body(), Some(r#"{"error":"forbidden"}"#));
    }

    #[test]
    fn test_fatality() {
        assert!(AppError::Auth("expired".into()).is_fatal());
        assert!(AppError::Config("missing".into()).is_fatal());
        assert!(!AppError::Permission {
            video_id: "1".into(),
            name: "a".into()
        }
        .is_fatal());
    }
}
