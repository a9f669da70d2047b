//! Error types shared by every client component

use std::io;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The URL was empty after trimming. Never sent to the backend.
    #[error("URL must not be blank")]
    BlankUrl,

    /// The parse endpoint answered with `success: false`
    #[error("parse rejected by backend: {0}")]
    ParseRejected(String),

    /// Any other endpoint answered with `success: false`
    #[error("rejected by backend: {0}")]
    ServerRejected(String),

    // Connection errors, non-2xx statuses and undecodable bodies all land here
    #[error("backend unavailable: {0}")]
    TransportUnavailable(#[source] BoxError),

    #[error("a download task is already in progress")]
    TaskBusy,

    #[error("download task was cancelled")]
    Cancelled,

    #[error("failed to save artifact: {0}")]
    Save(#[from] io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::TransportUnavailable(Box::new(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::TransportUnavailable(Box::new(err))
    }
}

impl Error {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::TransportUnavailable(err.into())
    }

    /// Text of the single notification shown to the user for this error
    pub fn user_message(&self) -> String {
        match self {
            Error::BlankUrl => "Please enter a video URL".to_string(),
            Error::ParseRejected(msg) => format!("Parse failed: {msg}"),
            Error::ServerRejected(msg) => format!("Download failed: {msg}"),
            Error::TransportUnavailable(_) => {
                "Request failed, check that the backend service is running and the URL is valid"
                    .to_string()
            }
            Error::TaskBusy => "A download is already running".to_string(),
            Error::Cancelled => "Download cancelled".to_string(),
            Error::Save(e) => format!("Could not save the file: {e}"),
        }
    }
}

/// Trim the user supplied URL, rejecting blank input before any request is made
pub fn validate_url(url: &str) -> Result<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::BlankUrl);
    }
    Ok(trimmed)
}
