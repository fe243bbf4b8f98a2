//! Replayable units of work driven by the session.
//!
//! A bundle never touches the network itself. It hands out the requests it
//! needs through [`Step::Send`] and is resumed with the responses, so the same
//! bundle can run against a sequential or a batching transport.

pub mod album;
pub mod audio;
pub mod metadata;
pub mod track;

use std::fmt;

use serde_json::Value;

use crate::error::{CslError, Result};
use crate::transport::{ApiRequest, ApiResponse};

pub use album::AlbumAdd;
pub use audio::{audio_mime_type, AudioUpload};
pub use metadata::{MetadataAdd, MetadataRemove, MetadataTarget};
pub use track::{TrackChanges, TrackEdit};

/// What a bundle wants next.
#[derive(Debug)]
pub enum Step<R> {
    /// Send these requests and resume with their responses, in order.
    Send(Vec<ApiRequest>),
    Done(R),
}

/// Request/response state machine.
pub trait Bundle {
    type Output;

    /// (Re)starts the bundle from its first request.
    fn start(&mut self) -> Result<Step<Self::Output>>;

    /// Accepts the responses to the last [`Step::Send`].
    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<Self::Output>>;
}

/// A mutating bundle that can wait in the session queue.
pub trait EditBundle: Bundle<Output = ()> {
    /// Human-readable description used for review before commit.
    fn summary(&self) -> EditSummary;
}

/// How an editing operation should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Immediate,
    Queue,
}

/// Description of a pending change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSummary {
    pub action: &'static str,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    pub lines: Vec<String>,
}

impl EditSummary {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            target_id: None,
            target_name: None,
            lines: Vec::new(),
        }
    }

    pub fn target(mut self, id: impl Into<String>, name: Option<&str>) -> Self {
        self.target_id = Some(id.into());
        self.target_name = name.map(ToOwned::to_owned);
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Field change line, skipped when the field is untouched.
    pub fn change<V: fmt::Display>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.line(format!("{field}: {value}")),
            None => self,
        }
    }

    /// One-line form for logs and failure reports.
    pub fn headline(&self) -> String {
        match (&self.target_name, &self.target_id) {
            (Some(name), Some(id)) => format!("{} {} [{}]", self.action, name, id),
            (None, Some(id)) => format!("{} [{}]", self.action, id),
            (Some(name), None) => format!("{} {}", self.action, name),
            (None, None) => self.action.to_string(),
        }
    }
}

impl fmt::Display for EditSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())?;
        for line in &self.lines {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

/// Takes the only response of a single-request step.
pub(crate) fn single_response(responses: Vec<ApiResponse>) -> Result<ApiResponse> {
    responses
        .into_iter()
        .next()
        .ok_or_else(|| CslError::UnexpectedResponse {
            endpoint: "bundle step".to_string(),
            payload: Value::Null,
        })
}

/// Finishes a bundle whose only work is one request.
pub(crate) fn finish_single(responses: Vec<ApiResponse>) -> Result<Step<()>> {
    single_response(responses)?.error_for_status()?;
    Ok(Step::Done(()))
}
