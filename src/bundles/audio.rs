//! Two-phase audio upload: ask for a presigned target, then post the bytes.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use crate::bundles::{finish_single, single_response, Bundle, EditBundle, EditSummary, Step};
use crate::error::{CslError, Result};
use crate::models::{Entity, Track};
use crate::transport::{ApiRequest, ApiResponse};

const AUDIO_MIME_TYPES: [(&str, &str); 10] = [
    ("mp3", "audio/mpeg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("aac", "audio/aac"),
    ("m4a", "audio/mp4"),
    ("wma", "audio/x-ms-wma"),
    ("aiff", "audio/aiff"),
    ("aif", "audio/aiff"),
];

/// Content type of an uploadable audio file, if the extension names one.
pub fn audio_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    AUDIO_MIME_TYPES
        .iter()
        .find(|(known, _)| ext.eq_ignore_ascii_case(known))
        .map(|(_, mime)| *mime)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignedTarget {
    session_id: String,
    key: String,
    url: String,
}

impl Entity for PresignedTarget {
    const NAME: &'static str = "PresignedUpload";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    AwaitingTarget,
    Uploading,
}

/// Uploads a local audio file and attaches it to a track.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    track_id: String,
    track_name: Option<String>,
    path: PathBuf,
    content_type: &'static str,
    stage: Stage,
}

impl AudioUpload {
    /// Validates the file before any request is built.
    pub fn prepare(track: &Track, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let invalid = |reason: &str| CslError::InvalidAudioFile {
            path: path.clone(),
            reason: reason.to_string(),
        };
        if !path.exists() {
            return Err(invalid("file does not exist"));
        }
        if !path.is_file() {
            return Err(invalid("not a regular file"));
        }
        let Some(content_type) = audio_mime_type(&path) else {
            return Err(invalid("not a known audio file type"));
        };
        debug!("Prepared {} upload from {}", content_type, path.display());
        Ok(Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            path,
            content_type,
            stage: Stage::Idle,
        })
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    fn upload_request(&self, target: PresignedTarget) -> Result<ApiRequest> {
        let data = std::fs::read(&self.path)?;
        info!(
            "Uploading {} bytes of {} to track {}",
            data.len(),
            self.path.display(),
            self.track_id
        );
        Ok(ApiRequest::post(target.url)
            .with_query("sessionId", target.session_id)
            .with_query("key", target.key)
            .with_bytes(self.content_type, data))
    }
}

impl Bundle for AudioUpload {
    type Output = ();

    fn start(&mut self) -> Result<Step<()>> {
        self.stage = Stage::AwaitingTarget;
        let request = ApiRequest::post(format!("/api/track/{}/presigned-upload", self.track_id))
            .with_json(json!({}));
        Ok(Step::Send(vec![request]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<()>> {
        match self.stage {
            Stage::AwaitingTarget => {
                let response = single_response(responses)?.error_for_status()?;
                let target = PresignedTarget::from_json(&response.json()?)?;
                let request = self.upload_request(target)?;
                self.stage = Stage::Uploading;
                Ok(Step::Send(vec![request]))
            }
            Stage::Uploading => {
                self.stage = Stage::Idle;
                finish_single(responses)
            }
            Stage::Idle => Err(CslError::UnexpectedResponse {
                endpoint: format!("audio upload for track {}", self.track_id),
                payload: serde_json::Value::Null,
            }),
        }
    }
}

impl EditBundle for AudioUpload {
    fn summary(&self) -> EditSummary {
        EditSummary::new("Upload audio")
            .target(&self.track_id, self.track_name.as_deref())
            .line(format!("{} ({})", self.path.display(), self.content_type))
    }
}
