use log::info;
use serde_json::json;

use crate::bundles::{finish_single, Bundle, EditBundle, EditSummary, Step};
use crate::error::Result;
use crate::models::{empty_id, Group, SongSample, Track, TrackCreditEdit, TrackType};
use crate::transport::{ApiRequest, ApiResponse};

/// Field replacements for a track. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackChanges {
    pub artist_credits: Option<Vec<TrackCreditEdit>>,
    pub groups: Option<Vec<Group>>,
    pub name: Option<String>,
    pub original_artist: Option<String>,
    pub original_name: Option<String>,
    pub song: Option<SongSample>,
    pub track_type: Option<TrackType>,
}

impl TrackChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artist_credits(mut self, credits: Vec<TrackCreditEdit>) -> Self {
        self.artist_credits = Some(credits);
        self
    }

    pub fn groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn original_artist(mut self, original_artist: impl Into<String>) -> Self {
        self.original_artist = Some(original_artist.into());
        self
    }

    pub fn original_name(mut self, original_name: impl Into<String>) -> Self {
        self.original_name = Some(original_name.into());
        self
    }

    pub fn song(mut self, song: SongSample) -> Self {
        self.song = Some(song);
        self
    }

    pub fn track_type(mut self, track_type: TrackType) -> Self {
        self.track_type = Some(track_type);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Replaces selected fields of one track.
#[derive(Debug, Clone)]
pub struct TrackEdit {
    track_id: String,
    track_name: Option<String>,
    old_credits: String,
    changes: TrackChanges,
    request: ApiRequest,
}

impl TrackEdit {
    /// Returns `None` when no field would change.
    pub fn prepare(track: &Track, changes: TrackChanges) -> Option<Self> {
        if changes.is_empty() {
            info!("No edits for {}, skipping request", track.display_name());
            return None;
        }
        let credits = changes.artist_credits.as_ref().map(|credits| {
            credits
                .iter()
                .enumerate()
                .map(|(position, credit)| credit.to_json(position))
                .collect::<Vec<_>>()
        });
        let group_ids = changes
            .groups
            .as_ref()
            .map(|groups| groups.iter().map(|group| group.id.clone()).collect::<Vec<_>>());
        let body = json!({
            "artistCredits": credits,
            "batchSongIds": null,
            "groupIds": group_ids,
            "id": empty_id(),
            "name": changes.name,
            "newSong": null,
            "originalArtist": changes.original_artist,
            "originalName": changes.original_name,
            "songId": changes.song.as_ref().map(|song| song.id.clone()),
            "type": changes.track_type.map(TrackType::code),
        });
        Some(Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            old_credits: track.credit_string(),
            request: ApiRequest::put(format!("/api/track/{}", track.id)).with_json(body),
            changes,
        })
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

impl Bundle for TrackEdit {
    type Output = ();

    fn start(&mut self) -> Result<Step<()>> {
        Ok(Step::Send(vec![self.request.clone()]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<()>> {
        finish_single(responses)
    }
}

impl EditBundle for TrackEdit {
    fn summary(&self) -> EditSummary {
        let changes = &self.changes;
        let mut summary = EditSummary::new("Edit track")
            .target(&self.track_id, self.track_name.as_deref())
            .change("new_name", changes.name.as_deref())
            .change("new_original_name", changes.original_name.as_deref())
            .change("new_original_artist", changes.original_artist.as_deref())
            .change("new_type", changes.track_type)
            .change("new_song", changes.song.as_ref().map(|song| &song.name));
        if let Some(credits) = &changes.artist_credits {
            let rendered: String = credits
                .iter()
                .map(|credit| format!("{}{}", credit.name, credit.join_phrase))
                .collect();
            summary = summary
                .line(format!("old_credits: {}", self.old_credits))
                .line(format!("new_credits: {rendered}"));
        }
        if let Some(groups) = &changes.groups {
            let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
            summary = summary.line(format!("new_groups: {}", names.join(", ")));
        }
        summary
    }
}
