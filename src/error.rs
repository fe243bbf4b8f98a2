//! Error taxonomy shared by every client component.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CslError>;

/// Failure reported by the HTTP layer.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The server answered with a non-2xx status.
    #[error("{method} {url} returned status {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    /// The request never produced a response.
    #[error("{method} {url} failed: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },
}

impl HttpError {
    /// Status code for status errors, `None` for network failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}

/// Errors produced by the client library.
#[derive(Error, Debug)]
pub enum CslError {
    /// Bad credentials, missing credentials, or missing admin privileges.
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// A server payload did not match the expected entity shape.
    #[error("Malformed {entity} response: {reason}")]
    MalformedResponse {
        entity: &'static str,
        reason: String,
        payload: Value,
    },
    /// A paged response lacked `count` or the item array.
    #[error("Unexpected query response from {endpoint}")]
    UnexpectedResponse { endpoint: String, payload: Value },
    /// Requested page size is outside `1..=max_batch_size`.
    #[error("Batch size {batch_size} is invalid, expected 1..={max_batch_size}")]
    InvalidBatchSize {
        batch_size: usize,
        max_batch_size: usize,
    },
    /// The first page reported more results than the scan ceiling allows.
    #[error("Query returns {count} results, which is larger than the max query size of {max_query_size}")]
    QueryTooLarge { count: usize, max_query_size: usize },
    /// More than one candidate matched an artist reference.
    #[error("{} artists found for {reference}: {}", .matches.len(), .matches.join(", "))]
    AmbiguousArtist {
        reference: String,
        matches: Vec<String>,
    },
    /// No candidate matched an artist reference after the direct search.
    #[error("Could not find artist {0}")]
    ArtistNotFound(String),
    /// Two distinct references resolved to the same artist.
    #[error("Names {first} and {second} both match {artist}")]
    DuplicateArtistBinding {
        first: String,
        second: String,
        artist: String,
    },
    /// The server refused to create a list, usually because the name exists.
    #[error("List could not be created: {0}")]
    ListCreateConflict(String),
    /// A list name was not present in the session's list cache.
    #[error("Unknown list: {0}")]
    UnknownList(String),
    /// Local audio file failed validation before upload.
    #[error("{}: {reason}", .path.display())]
    InvalidAudioFile { path: PathBuf, reason: String },
    /// Queue commit stopped at a failing bundle.
    #[error("Commit aborted at queued change {index} ({summary}): {source}")]
    CommitAborted {
        index: usize,
        summary: String,
        #[source]
        source: Box<CslError>,
    },
    /// OS keyring access failed.
    #[error("Keyring error: {0}")]
    Keyring(String),
    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
    /// The user chose to quit an interactive review.
    #[error("Quit requested")]
    Quit,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl CslError {
    /// Builds a decode failure carrying the offending payload.
    pub fn malformed(entity: &'static str, reason: impl Into<String>, payload: &Value) -> Self {
        Self::MalformedResponse {
            entity,
            reason: reason.into(),
            payload: payload.clone(),
        }
    }
}
