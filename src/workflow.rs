//! Interactive editing helpers built on the session queue.

use std::collections::{BTreeSet, HashMap};
use std::io::{BufRead, Write};

use log::{debug, info};

use crate::bundles::RunMode;
use crate::error::{CslError, Result};
use crate::matcher::{ArtistBindings, ArtistRef};
use crate::models::{ArtistSample, ExtraMetadataEntry, MetadataEdit, Metadata, Track};
use crate::session::{CommitReport, Session};
use crate::transport::Transport;

pub const CHARACTER_KEY: &str = "Character";

/// Character metadata wanted for each resolved artist, keyed by artist id.
pub type ArtistMetadata = HashMap<String, Vec<ExtraMetadataEntry>>;

/// Maps resolved artists to the `Character` entries of the characters they voice.
///
/// References missing from `bindings` are skipped.
pub fn artist_to_metadata(
    bindings: &ArtistBindings,
    characters: &[(ArtistRef, Vec<String>)],
) -> ArtistMetadata {
    let mut mapping = ArtistMetadata::new();
    for (reference, names) in characters {
        let Some(artist) = bindings.get(reference) else {
            debug!("No binding for {reference}, skipping its characters");
            continue;
        };
        mapping.entry(artist.id.clone()).or_default().extend(
            names
                .iter()
                .map(|name| ExtraMetadataEntry::artist(CHARACTER_KEY, name.as_str())),
        );
    }
    mapping
}

/// Queues the `Character` entries implied by the track's credits and the
/// removal of every other existing `Character` entry.
///
/// Returns the first credited artist without a mapping; nothing is queued in
/// that case.
pub fn queue_character_metadata<T: Transport>(
    session: &mut Session<T>,
    track: &Track,
    mapping: &ArtistMetadata,
    existing: Option<&Metadata>,
) -> Result<Option<ArtistSample>> {
    let mut wanted = BTreeSet::new();
    for credit in &track.artist_credits {
        match mapping.get(&credit.artist.id) {
            Some(entries) => wanted.extend(entries.iter().cloned()),
            None => {
                info!(
                    "No character mapping for {} on {}",
                    credit.artist.label(),
                    track.display_name()
                );
                return Ok(Some(credit.artist.clone()));
            }
        }
    }
    let additions: Vec<MetadataEdit> = wanted.iter().cloned().map(MetadataEdit::from).collect();
    session.track_add_metadata(track, additions, None, existing, RunMode::Queue)?;
    if let Some(existing) = existing {
        for record in existing.extra_with_key(CHARACTER_KEY) {
            if !wanted.contains(&ExtraMetadataEntry::simplify(record)) {
                session.track_remove_metadata(track, record.clone(), RunMode::Queue)?;
            }
        }
    }
    Ok(None)
}

/// Asks a yes/no question. `q`/`quit` and end of input abort with
/// [`CslError::Quit`].
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, message: &str) -> Result<bool> {
    loop {
        write!(output, "{message} [y/n/q] ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(CslError::Quit);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "q" | "quit" => return Err(CslError::Quit),
            _ => writeln!(output, "Please answer y, n or q")?,
        }
    }
}

/// Shows each queued edit, drops the rejected ones, and commits the rest
/// without stopping on failures.
pub fn review_and_commit<T: Transport, R: BufRead, W: Write>(
    session: &mut Session<T>,
    input: &mut R,
    output: &mut W,
) -> Result<CommitReport> {
    let summaries: Vec<_> = session.queue().iter().map(|bundle| bundle.summary()).collect();
    let mut rejected = Vec::new();
    for (index, summary) in summaries.iter().enumerate() {
        writeln!(output, "{summary}")?;
        if !prompt(input, output, "Apply this change?")? {
            rejected.push(index);
        }
    }
    for index in rejected.into_iter().rev() {
        session.discard(index);
    }
    let report = session.commit(false)?;
    for failure in &report.failures {
        writeln!(
            output,
            "FAILED {}: {}",
            failure.summary.headline(),
            failure.error
        )?;
    }
    writeln!(
        output,
        "{} applied, {} failed",
        report.applied,
        report.failures.len()
    )?;
    Ok(report)
}
