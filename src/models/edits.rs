//! Proposed edits and their structural comparison keys.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::models::entities::{
    ArtistSample, ExtraMetadataRecord, Metadata, SongArtistCredit, TrackArtistCredit,
};
use crate::models::vocab::MetadataScope;

/// Primitive projection used to compare proposed metadata with existing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    Credit {
        artist_id: String,
        role: String,
        credit: Option<String>,
    },
    Extra {
        is_artist: bool,
        key: String,
        value: String,
    },
}

/// Proposed artist credit on a song's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtistCreditEdit {
    pub artist: ArtistSample,
    pub role: String,
    pub credit: Option<String>,
}

impl ArtistCreditEdit {
    pub fn new(artist: ArtistSample, role: impl Into<String>) -> Self {
        Self {
            artist,
            role: role.into(),
            credit: None,
        }
    }

    /// Sets the free-text credit shown instead of the artist name.
    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.credit = Some(credit.into());
        self
    }

    /// Projects an existing credit onto the proposed form, dropping ids.
    pub fn simplify(existing: &SongArtistCredit) -> Self {
        Self {
            artist: existing.artist.clone(),
            role: existing.role.clone(),
            credit: None,
        }
    }

    pub fn key(&self) -> MetadataKey {
        MetadataKey::Credit {
            artist_id: self.artist.id.clone(),
            role: self.role.clone(),
            credit: self.credit.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "artistId": self.artist.id,
            "credit": self.credit,
            "type": self.role,
        })
    }
}

/// Proposed extra metadata entry, such as `(Character, "Chika Takami")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtraMetadataEntry {
    pub is_artist: bool,
    pub key: String,
    pub value: String,
}

impl ExtraMetadataEntry {
    pub fn new(is_artist: bool, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            is_artist,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Artist-scoped entry.
    pub fn artist(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(true, key, value)
    }

    /// Song-scoped entry.
    pub fn song(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(false, key, value)
    }

    pub fn simplify(existing: &ExtraMetadataRecord) -> Self {
        Self {
            is_artist: existing.scope == MetadataScope::Artist,
            key: existing.key.clone(),
            value: existing.value.clone(),
        }
    }

    pub fn key(&self) -> MetadataKey {
        MetadataKey::Extra {
            is_artist: self.is_artist,
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "isArtist": self.is_artist,
            "type": self.key,
            "value": self.value,
        })
    }
}

/// Any proposed metadata addition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataEdit {
    Credit(ArtistCreditEdit),
    Extra(ExtraMetadataEntry),
}

impl MetadataEdit {
    pub fn key(&self) -> MetadataKey {
        match self {
            Self::Credit(credit) => credit.key(),
            Self::Extra(entry) => entry.key(),
        }
    }
}

impl From<ArtistCreditEdit> for MetadataEdit {
    fn from(value: ArtistCreditEdit) -> Self {
        Self::Credit(value)
    }
}

impl From<ExtraMetadataEntry> for MetadataEdit {
    fn from(value: ExtraMetadataEntry) -> Self {
        Self::Extra(value)
    }
}

impl Metadata {
    /// Structural keys of everything already present.
    pub fn existing_keys(&self) -> HashSet<MetadataKey> {
        self.artist_credits
            .iter()
            .map(|credit| ArtistCreditEdit::simplify(credit).key())
            .chain(
                self.extra_metas
                    .iter()
                    .map(|meta| ExtraMetadataEntry::simplify(meta).key()),
            )
            .collect()
    }
}

/// Replacement credit used by track edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackCreditEdit {
    pub artist: ArtistSample,
    pub join_phrase: String,
    pub name: String,
}

impl TrackCreditEdit {
    /// Credit displayed under the artist's own name.
    pub fn new(artist: ArtistSample, join_phrase: impl Into<String>) -> Self {
        let name = artist.name.clone();
        Self {
            artist,
            join_phrase: join_phrase.into(),
            name,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = name;
        }
        self
    }

    pub fn simplify(existing: &TrackArtistCredit) -> Self {
        Self {
            artist: existing.artist.clone(),
            join_phrase: existing.join_phrase.clone(),
            name: existing.name.clone(),
        }
    }

    pub fn to_json(&self, position: usize) -> Value {
        json!({
            "artistId": self.artist.id,
            "joinPhrase": self.join_phrase,
            "name": self.name,
            "position": position,
        })
    }
}

/// One track of an album being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumTrack {
    pub name: String,
    pub original_name: String,
    pub original_artist: String,
}

impl AlbumTrack {
    pub fn new(
        name: impl Into<String>,
        original_name: impl Into<String>,
        original_artist: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            original_name: original_name.into(),
            original_artist: original_artist.into(),
        }
    }

    pub fn to_json(&self, disc_number: usize, track_number: usize, track_total: usize) -> Value {
        json!({
            "name": self.name,
            "originalName": self.original_name,
            "originalArtist": self.original_artist,
            "discNumber": disc_number,
            "trackNumber": track_number,
            "trackTotal": track_total,
        })
    }
}
