//! Typed records parsed from the database and proposed edits against them.

pub mod edits;
pub mod entities;
pub mod vocab;

pub use edits::{
    AlbumTrack, ArtistCreditEdit, ExtraMetadataEntry, MetadataEdit, MetadataKey, TrackCreditEdit,
};
pub use entities::{
    Artist, ArtistSample, CatalogList, Entity, ExtraMetadataRecord, Group, Metadata, Song,
    SongArtistCredit, SongRelation, SongSample, Track, TrackArtistCredit, TrackLink,
};
pub use vocab::{ArtistType, MetadataScope, SongRelationType, TrackType, UnknownCode};

/// Nil id sent in request bodies that create or edit without a client-side id.
pub fn empty_id() -> String {
    uuid::Uuid::nil().to_string()
}
