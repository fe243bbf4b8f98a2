//! Resolution of loosely specified artist references to database artists.
//!
//! Candidates are gathered with a few broad search phrases first. References
//! that stay unmatched are grouped by name and searched directly. A reference
//! that is still unmatched, matches several candidates, or lands on an artist
//! already bound to another reference is an error.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info, warn};

use crate::error::{CslError, Result};
use crate::models::ArtistSample;
use crate::session::Session;
use crate::transport::Transport;

/// Constraint on one artist field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldMatch<T> {
    #[default]
    Any,
    Exact(T),
}

impl<T: PartialEq> FieldMatch<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
        }
    }
}

/// Artist described by name plus optional original name and disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtistRef {
    pub name: String,
    pub original_name: FieldMatch<String>,
    /// `Exact(None)` only matches artists without a disambiguation.
    pub disambiguation: FieldMatch<Option<String>>,
}

impl ArtistRef {
    /// Matches any artist with this name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_name: FieldMatch::Any,
            disambiguation: FieldMatch::Any,
        }
    }

    /// Matches the name with exactly this disambiguation.
    pub fn disambiguated(name: impl Into<String>, disambiguation: Option<&str>) -> Self {
        Self {
            disambiguation: FieldMatch::Exact(disambiguation.map(ToOwned::to_owned)),
            ..Self::named(name)
        }
    }

    pub fn with_original_name(mut self, original_name: impl Into<String>) -> Self {
        self.original_name = FieldMatch::Exact(original_name.into());
        self
    }

    pub fn matches(&self, artist: &ArtistSample) -> bool {
        self.name == artist.name
            && self.original_name.matches(&artist.original_name)
            && self.disambiguation.matches(&artist.disambiguation)
    }
}

impl From<&str> for ArtistRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for ArtistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let FieldMatch::Exact(original) = &self.original_name {
            write!(f, " [{original}]")?;
        }
        match &self.disambiguation {
            FieldMatch::Exact(Some(disambiguation)) => write!(f, " ({disambiguation})"),
            FieldMatch::Exact(None) => f.write_str(" (no disambiguation)"),
            FieldMatch::Any => Ok(()),
        }
    }
}

/// Finds the single candidate matching `reference`.
pub fn match_artist<'a>(
    reference: &ArtistRef,
    candidates: impl IntoIterator<Item = &'a ArtistSample>,
) -> Result<Option<&'a ArtistSample>> {
    let found: Vec<&ArtistSample> = candidates
        .into_iter()
        .filter(|artist| reference.matches(artist))
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [artist] => Ok(Some(*artist)),
        _ => Err(CslError::AmbiguousArtist {
            reference: reference.to_string(),
            matches: found.iter().map(|artist| artist.label()).collect(),
        }),
    }
}

/// Source of artist search results.
pub trait ArtistSearch {
    fn search_artists(&mut self, phrase: &str) -> Result<Vec<ArtistSample>>;
}

impl<T: Transport> ArtistSearch for Session<T> {
    fn search_artists(&mut self, phrase: &str) -> Result<Vec<ArtistSample>> {
        let batch_size = self.default_batch_size();
        self.iter_artists(phrase, batch_size)?.collect()
    }
}

/// Resolved references in input order.
#[derive(Debug, Clone, Default)]
pub struct ArtistBindings {
    bindings: Vec<(ArtistRef, ArtistSample)>,
}

impl ArtistBindings {
    pub fn get(&self, reference: &ArtistRef) -> Option<&ArtistSample> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == reference)
            .map(|(_, artist)| artist)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtistRef, &ArtistSample)> {
        self.bindings.iter().map(|(reference, artist)| (reference, artist))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Candidates keyed by id, in first-seen order.
#[derive(Default)]
struct CandidatePool {
    artists: Vec<ArtistSample>,
    seen: HashSet<String>,
}

impl CandidatePool {
    fn gather<S: ArtistSearch>(search: &mut S, phrases: &[&str]) -> Result<Self> {
        let mut pool = Self::default();
        for phrase in phrases {
            debug!("Searching artists for {phrase:?}");
            for artist in search.search_artists(phrase)? {
                if pool.seen.insert(artist.id.clone()) {
                    pool.artists.push(artist);
                }
            }
        }
        Ok(pool)
    }
}

struct Binder {
    slots: Vec<Option<ArtistSample>>,
    owners: HashMap<String, usize>,
}

impl Binder {
    fn bind(&mut self, references: &[ArtistRef], index: usize, artist: &ArtistSample) -> Result<()> {
        if let Some(&owner) = self.owners.get(&artist.id) {
            if owner != index {
                return Err(CslError::DuplicateArtistBinding {
                    first: references[owner].to_string(),
                    second: references[index].to_string(),
                    artist: artist.label(),
                });
            }
        }
        self.owners.insert(artist.id.clone(), index);
        self.slots[index] = Some(artist.clone());
        Ok(())
    }
}

/// Binds every reference to exactly one artist.
///
/// `phrases` seed the first pass; an empty slice skips straight to per-name
/// searches.
pub fn resolve_artists<S: ArtistSearch>(
    search: &mut S,
    references: &[ArtistRef],
    phrases: &[&str],
) -> Result<ArtistBindings> {
    let mut unique: Vec<ArtistRef> = Vec::with_capacity(references.len());
    for reference in references {
        if !unique.contains(reference) {
            unique.push(reference.clone());
        }
    }
    let mut binder = Binder {
        slots: vec![None; unique.len()],
        owners: HashMap::new(),
    };

    let pool = CandidatePool::gather(search, phrases)?;
    info!(
        "First pass: {} candidates for {} references",
        pool.artists.len(),
        unique.len()
    );
    for (index, reference) in unique.iter().enumerate() {
        if let Some(artist) = match_artist(reference, &pool.artists)? {
            binder.bind(&unique, index, artist)?;
        }
    }

    let mut by_name: Vec<(&str, Vec<usize>)> = Vec::new();
    for (index, reference) in unique.iter().enumerate() {
        if binder.slots[index].is_some() {
            continue;
        }
        match by_name.iter_mut().find(|(name, _)| *name == reference.name) {
            Some((_, indices)) => indices.push(index),
            None => by_name.push((reference.name.as_str(), vec![index])),
        }
    }
    if !by_name.is_empty() {
        info!("Second pass: searching {} names directly", by_name.len());
    }
    for (name, indices) in by_name {
        let pool = CandidatePool::gather(search, &[name])?;
        for index in indices {
            let reference = &unique[index];
            let Some(artist) = match_artist(reference, &pool.artists)? else {
                warn!("Could not find artist {reference}");
                return Err(CslError::ArtistNotFound(reference.to_string()));
            };
            binder.bind(&unique, index, artist)?;
        }
    }

    let bindings = unique
        .into_iter()
        .zip(binder.slots)
        .filter_map(|(reference, artist)| artist.map(|artist| (reference, artist)))
        .collect();
    Ok(ArtistBindings { bindings })
}
