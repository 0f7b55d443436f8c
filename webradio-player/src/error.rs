//! Error types for webradio-player
//!
//! Validation errors are returned to the immediate caller. Protocol noise and
//! subscriber overflow are handled where they occur and never show up here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for webradio-player
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared library (config, channel file, state file)
    #[error(transparent)]
    Common(#[from] webradio_common::Error),

    /// Directory does not exist or lies outside the root directory
    #[error("invalid directory {}", .0.display())]
    InvalidDirectory(PathBuf),

    /// File does not exist or lies outside the root directory
    #[error("invalid filename {}", .0.display())]
    InvalidFile(PathBuf),

    /// Start file for directory play is not in the current listing
    #[error("file {0} does not exist")]
    UnknownStartFile(String),

    /// Play requested without a file and no current file is selected
    #[error("default file not set")]
    NoDefaultFile,

    /// Channel number outside 1..=N
    #[error("invalid channel {0}")]
    InvalidChannel(usize),

    /// Channel list is empty
    #[error("no channels configured")]
    NoChannels,

    /// Decoder was never started (or its output ended)
    #[error("decoder not running")]
    DecoderNotRunning,

    /// `start()` called twice
    #[error("decoder already started")]
    DecoderAlreadyStarted,

    /// Decoder output ended while a command waited for its acknowledgement
    #[error("decoder exited while waiting for acknowledgement")]
    DecoderExited,

    /// Duration probe failed for a file
    #[error("duration probe failed for {}: {reason}", .path.display())]
    Probe { path: PathBuf, reason: String },

    /// Malformed request argument
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown API operation
    #[error("API {0} not implemented")]
    NotImplemented(String),

    /// Remote API call failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is the caller's fault (rejected request) rather than
    /// a failure of the player itself
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidDirectory(_)
                | Error::InvalidFile(_)
                | Error::UnknownStartFile(_)
                | Error::NoDefaultFile
                | Error::InvalidChannel(_)
                | Error::NoChannels
                | Error::BadRequest(_)
                | Error::NotImplemented(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "msg": self.to_string() }))).into_response()
    }
}

/// Convenience Result type using webradio-player Error
pub type Result<T> = std::result::Result<T, Error>;
