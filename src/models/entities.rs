//! Immutable records decoded from server JSON.
//!
//! Decoding is strict: every key is required (optional values must still be
//! present as `null`), types are never coerced, and unknown vocabulary codes
//! are rejected.

use std::collections::BTreeSet;

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CslError, Result};
use crate::models::vocab::{ArtistType, MetadataScope, SongRelationType, TrackType};

/// Strict decode from a JSON payload.
pub trait Entity: DeserializeOwned {
    /// Entity name used in decode failures.
    const NAME: &'static str;

    fn from_json(payload: &Value) -> Result<Self> {
        Self::deserialize(payload).map_err(|err| {
            info!("Invalid json when parsing {}: {}", Self::NAME, err);
            CslError::malformed(Self::NAME, err.to_string(), payload)
        })
    }
}

/// Requires the key to exist while allowing `null`.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

fn credits_by_position<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<TrackArtistCredit>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut credits = Vec::<TrackArtistCredit>::deserialize(deserializer)?;
    credits.sort_by_key(|credit| credit.position);
    Ok(credits)
}

/// Artist as returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSample {
    pub id: String,
    pub name: String,
    pub original_name: String,
    #[serde(deserialize_with = "nullable")]
    pub disambiguation: Option<String>,
    #[serde(rename = "type")]
    pub artist_type: ArtistType,
}

impl ArtistSample {
    /// `name (disambiguation)` label.
    pub fn label(&self) -> String {
        match &self.disambiguation {
            Some(disambiguation) => format!("{} ({})", self.name, disambiguation),
            None => self.name.clone(),
        }
    }
}

impl Entity for ArtistSample {
    const NAME: &'static str = "ArtistSample";
}

/// Relation from one artist to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct SongRelation {
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: SongRelationType,
    pub artist: ArtistSample,
}

/// One credited artist on a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackArtistCredit {
    pub artist: ArtistSample,
    pub name: String,
    pub join_phrase: String,
    pub position: i64,
}

/// Track reference embedded in an artist detail view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct TrackLink {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: Option<String>,
    pub artists: Vec<TrackArtistCredit>,
}

/// Artist with relations and linked tracks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(flatten)]
    pub sample: ArtistSample,
    pub forward_relations: Vec<SongRelation>,
    pub reverse_relations: Vec<SongRelation>,
    #[serde(rename = "linkedAMQSongs")]
    pub linked_amq_songs: Vec<TrackLink>,
    pub linked_tracks: Vec<TrackLink>,
}

impl Entity for Artist {
    const NAME: &'static str = "Artist";
}

/// Song as returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSample {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub disambiguation: Option<String>,
    pub created_at: String,
}

impl Entity for SongSample {
    const NAME: &'static str = "SongSample";
}

/// Artist credit attached to a song's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct SongArtistCredit {
    pub id: String,
    /// Free-form credit role such as `Composer`.
    #[serde(rename = "type")]
    pub role: String,
    pub artist: ArtistSample,
}

/// Extra key/value metadata stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ExtraMetadataRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub scope: MetadataScope,
    pub key: String,
    pub value: String,
}

/// Song with credits and extra metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(flatten)]
    pub sample: SongSample,
    pub artist_credits: Vec<SongArtistCredit>,
    pub extra_metas: Vec<ExtraMetadataRecord>,
}

impl Entity for Song {
    const NAME: &'static str = "Song";
}

/// User-owned track list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct CatalogList {
    pub id: String,
    pub name: String,
    pub count: u64,
}

impl Entity for CatalogList {
    const NAME: &'static str = "List";
}

/// Catalog group, usually a franchise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Entity for Group {
    const NAME: &'static str = "Group";
}

/// One rendition of a song.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    /// Tracks may be nameless until data entry catches up.
    #[serde(deserialize_with = "nullable")]
    pub name: Option<String>,
    pub original_name: String,
    #[serde(rename = "originalSimpleArtist")]
    pub original_artist: String,
    #[serde(deserialize_with = "nullable")]
    pub original_album: Option<String>,
    pub album: String,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: u32,
    pub disc_total: u32,
    #[serde(deserialize_with = "nullable")]
    pub year: Option<i32>,
    #[serde(deserialize_with = "nullable")]
    pub song: Option<SongSample>,
    /// Sorted ascending by position.
    #[serde(deserialize_with = "credits_by_position")]
    pub artist_credits: Vec<TrackArtistCredit>,
    pub groups: Vec<Group>,
    #[serde(deserialize_with = "nullable")]
    pub audio_id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub audio_name: Option<String>,
    pub disabled: bool,
    #[serde(rename = "type")]
    pub track_type: TrackType,
    pub created_at: String,
    pub updated_at: String,
    pub in_list: bool,
}

impl Track {
    /// Name for log lines and summaries.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.original_name)
    }

    /// Credits rendered left to right with their join phrases.
    pub fn credit_string(&self) -> String {
        self.artist_credits
            .iter()
            .map(|credit| format!("{}{}", credit.name, credit.join_phrase))
            .collect()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_id.is_some()
    }
}

impl Entity for Track {
    const NAME: &'static str = "Track";
}

/// Metadata attached to a track's song.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "override")]
    pub overrides: bool,
    pub artist_credits: Vec<SongArtistCredit>,
    pub extra_metas: Vec<ExtraMetadataRecord>,
    pub total_count: u64,
    /// Names of the fields present; authoritative for field queries.
    pub fields: BTreeSet<String>,
}

impl Metadata {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Extra metadata entries with the given key.
    pub fn extra_with_key<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a ExtraMetadataRecord> + 'a {
        self.extra_metas.iter().filter(move |meta| meta.key == key)
    }

    /// True when the record carries no credits, entries, or fields.
    pub fn is_empty(&self) -> bool {
        self.artist_credits.is_empty() && self.extra_metas.is_empty() && self.fields.is_empty()
    }
}

impl Entity for Metadata {
    const NAME: &'static str = "Metadata";
}
