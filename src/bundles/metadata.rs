//! Metadata add/remove bundles.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde_json::json;

use crate::bundles::{finish_single, Bundle, EditBundle, EditSummary, Step};
use crate::error::Result;
use crate::models::{
    empty_id, ArtistCreditEdit, ExtraMetadataEntry, ExtraMetadataRecord, Metadata, MetadataEdit,
    SongArtistCredit, Track,
};
use crate::transport::{ApiRequest, ApiResponse};

/// Adds artist credits and extra metadata to a track's song.
#[derive(Debug, Clone)]
pub struct MetadataAdd {
    track_id: String,
    track_name: Option<String>,
    credits: Vec<ArtistCreditEdit>,
    extras: Vec<ExtraMetadataEntry>,
    overrides: Option<bool>,
    artist_names: HashMap<String, String>,
    request: ApiRequest,
}

impl MetadataAdd {
    /// Builds the bundle after dropping edits already present on the track.
    ///
    /// Returns `None` when nothing would change: no new entries survive
    /// deduplication and no override flag is requested.
    pub fn prepare(
        track: &Track,
        edits: impl IntoIterator<Item = MetadataEdit>,
        overrides: Option<bool>,
        existing: Option<&Metadata>,
    ) -> Option<Self> {
        let mut present: HashSet<_> = existing.map(Metadata::existing_keys).unwrap_or_default();
        let mut credits = Vec::new();
        let mut extras = Vec::new();
        let mut artist_names = HashMap::new();
        for edit in edits {
            if !present.insert(edit.key()) {
                debug!("Skipping metadata already present: {:?}", edit.key());
                continue;
            }
            match edit {
                MetadataEdit::Credit(credit) => {
                    debug!("Adding artist credit {} {}", credit.role, credit.artist.name);
                    artist_names.insert(credit.artist.id.clone(), credit.artist.name.clone());
                    credits.push(credit);
                }
                MetadataEdit::Extra(entry) => {
                    debug!("Adding extra metadata {}: {}", entry.key, entry.value);
                    extras.push(entry);
                }
            }
        }
        if credits.is_empty() && extras.is_empty() && overrides.is_none() {
            info!(
                "No metadata changes necessary for {}, skipping request",
                track.display_name()
            );
            return None;
        }

        let body = json!({
            "artistCredits": credits.iter().map(ArtistCreditEdit::to_json).collect::<Vec<_>>(),
            "extraMetadatas": extras.iter().map(ExtraMetadataEntry::to_json).collect::<Vec<_>>(),
            "id": empty_id(),
            "override": overrides,
        });
        let request = ApiRequest::post(format!("/api/track/{}/metadata", track.id)).with_json(body);
        Some(Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            credits,
            extras,
            overrides,
            artist_names,
            request,
        })
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn credits(&self) -> &[ArtistCreditEdit] {
        &self.credits
    }

    pub fn extras(&self) -> &[ExtraMetadataEntry] {
        &self.extras
    }
}

impl Bundle for MetadataAdd {
    type Output = ();

    fn start(&mut self) -> Result<Step<()>> {
        Ok(Step::Send(vec![self.request.clone()]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<()>> {
        finish_single(responses)
    }
}

impl EditBundle for MetadataAdd {
    fn summary(&self) -> EditSummary {
        let method = self.request.method;
        let mut summary = EditSummary::new("Add metadata")
            .target(&self.track_id, self.track_name.as_deref())
            .change("override", self.overrides);
        for credit in &self.credits {
            let artist = self
                .artist_names
                .get(&credit.artist.id)
                .map(String::as_str)
                .unwrap_or(&credit.artist.id);
            summary = summary.line(format!("{method} {} {artist}", credit.role));
        }
        for entry in &self.extras {
            let scope = if entry.is_artist { "Artist" } else { "Song" };
            summary = summary.line(format!(
                "{method} {scope} meta {} {}",
                entry.key, entry.value
            ));
        }
        summary
    }
}

/// Existing metadata entry selected for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataTarget {
    Credit(SongArtistCredit),
    Extra(ExtraMetadataRecord),
}

impl MetadataTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Credit(credit) => &credit.id,
            Self::Extra(record) => &record.id,
        }
    }
}

impl From<SongArtistCredit> for MetadataTarget {
    fn from(value: SongArtistCredit) -> Self {
        Self::Credit(value)
    }
}

impl From<ExtraMetadataRecord> for MetadataTarget {
    fn from(value: ExtraMetadataRecord) -> Self {
        Self::Extra(value)
    }
}

/// Removes one metadata entry from a track's song.
#[derive(Debug, Clone)]
pub struct MetadataRemove {
    track_id: String,
    track_name: Option<String>,
    target: MetadataTarget,
    request: ApiRequest,
}

impl MetadataRemove {
    pub fn new(track: &Track, target: MetadataTarget) -> Self {
        let request =
            ApiRequest::delete(format!("/api/track/{}/metadata/{}", track.id, target.id()));
        Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            target,
            request,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

impl Bundle for MetadataRemove {
    type Output = ();

    fn start(&mut self) -> Result<Step<()>> {
        Ok(Step::Send(vec![self.request.clone()]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<()>> {
        finish_single(responses)
    }
}

impl EditBundle for MetadataRemove {
    fn summary(&self) -> EditSummary {
        let method = self.request.method;
        let line = match &self.target {
            MetadataTarget::Credit(credit) => {
                format!("{method} {} {}", credit.role, credit.artist.name)
            }
            MetadataTarget::Extra(record) => {
                format!("{method} {} {} {}", record.scope, record.key, record.value)
            }
        };
        EditSummary::new("Remove metadata")
            .target(&self.track_id, self.track_name.as_deref())
            .line(line)
    }
}
