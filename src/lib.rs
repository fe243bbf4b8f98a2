//! Typed client for the AMQ song list database.
//!
//! [`Session`] authenticates and exposes lookups, paged searches and edits.
//! Edits can run immediately or wait in the session queue until
//! [`Session::commit`]. [`matcher`] resolves loosely described artists and
//! [`workflow`] holds the interactive review helpers.

pub mod bundles;
pub mod config;
pub mod credentials;
pub mod error;
pub mod matcher;
pub mod models;
pub mod pagination;
pub mod session;
pub mod transport;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use bundles::{EditBundle, EditSummary, RunMode, TrackChanges};
pub use config::ClientConfig;
pub use error::{CslError, HttpError, Result};
pub use matcher::{resolve_artists, ArtistBindings, ArtistRef, FieldMatch};
pub use pagination::{TextSearch, TrackSearch};
pub use session::{BundleFailure, CommitReport, Session};
pub use transport::{ApiRequest, ApiResponse, Transport, UreqTransport};
