//! Authenticated client session.
//!
//! A session owns the transport, the cached lists and groups, and the queue of
//! pending edits. It is not meant to be shared between threads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::bundles::{
    AlbumAdd, AudioUpload, Bundle, EditBundle, EditSummary, MetadataAdd, MetadataRemove,
    MetadataTarget, RunMode, Step, TrackChanges, TrackEdit,
};
use crate::config::ClientConfig;
use crate::error::{CslError, Result};
use crate::models::{
    empty_id, AlbumTrack, Artist, ArtistSample, CatalogList, Entity, Group, Metadata,
    MetadataEdit, Song, SongSample, Track,
};
use crate::pagination::{PageCollector, PageLimits, Pages, TextSearch, TrackSearch};
use crate::transport::{ApiRequest, ApiResponse, Transport, UreqTransport, SESSION_COOKIE};

const NO_METADATA: &str = "Song does not have metadata";

/// Payload of `GET /api/auth/me`.
#[derive(Debug, Deserialize)]
struct AuthUser {
    name: String,
    roles: Vec<String>,
}

impl Entity for AuthUser {
    const NAME: &'static str = "AuthUser";
}

/// Outcome of a non-aborting commit.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub applied: usize,
    pub failures: Vec<BundleFailure>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A queued edit that failed during commit.
#[derive(Debug)]
pub struct BundleFailure {
    /// Position in the queue at commit time.
    pub index: usize,
    pub summary: EditSummary,
    pub error: CslError,
}

pub struct Session<T: Transport = UreqTransport> {
    transport: T,
    username: Option<String>,
    password: Option<String>,
    session_path: PathBuf,
    limits: PageLimits,
    default_batch_size: usize,
    session_cookie: Option<String>,
    user_name: String,
    lists: Option<HashMap<String, CatalogList>>,
    groups: Option<HashMap<String, Group>>,
    queue: Vec<Box<dyn EditBundle>>,
}

impl Session<UreqTransport> {
    /// Opens a session against `config.base_url` over HTTP.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = UreqTransport::new(
            &config.base_url,
            config.connect_timeout(),
            config.read_timeout(),
        );
        Self::open(config, transport)
    }
}

impl<T: Transport> Session<T> {
    /// Authenticates, reusing the stored session cookie when it is still valid.
    pub fn open(config: &ClientConfig, transport: T) -> Result<Self> {
        info!("Creating session for {}", config.base_url);
        let session_cookie = read_session_cookie(&config.session_path)?;
        debug!(
            "Session cookie {}",
            if session_cookie.is_some() { "found" } else { "missing" }
        );
        let mut session = Self {
            transport,
            username: config.username.clone(),
            password: config.password.clone(),
            session_path: config.session_path.clone(),
            limits: config.limits(),
            default_batch_size: config.default_batch_size,
            session_cookie,
            user_name: String::new(),
            lists: None,
            groups: None,
            queue: Vec::new(),
        };
        if let Err(err) = session.authenticate() {
            error!("Failed to authenticate: {err}");
            return Err(err);
        }
        Ok(session)
    }

    /// Display name of the authenticated user.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub fn default_batch_size(&self) -> usize {
        self.default_batch_size
    }

    fn authenticate(&mut self) -> Result<()> {
        let mut me_response = None;
        if self.session_cookie.is_some() {
            info!("Trying stored session cookie");
            let response = self.send(&ApiRequest::get("/api/auth/me"))?;
            if response.status != 401 {
                me_response = Some(response);
            }
        }
        let me_response = match me_response {
            Some(me_response) => me_response,
            None => {
                info!("No valid session cookie, logging in");
                self.session_cookie = None;
                self.login()?;
                self.send(&ApiRequest::get("/api/auth/me"))?
            }
        };
        let user = AuthUser::from_json(&me_response.error_for_status()?.json()?)?;
        let name = user.name;
        if !user.roles.iter().any(|role| role == "ADMIN") {
            return Err(CslError::Authentication(format!(
                "user {name} does not have admin privileges"
            )));
        }
        info!("Authenticated as {name}");
        self.user_name = name;
        Ok(())
    }

    fn login(&mut self) -> Result<()> {
        let (Some(username), Some(password)) = (
            self.username.clone().filter(|u| !u.is_empty()),
            self.password.clone().filter(|p| !p.is_empty()),
        ) else {
            return Err(CslError::Authentication(
                "username and password are required to log in".to_string(),
            ));
        };
        let request = ApiRequest::post("/api/login").with_json(json!({
            "username": username,
            "password": password,
        }));
        info!("Logging in as {username}");
        let response = self.send(&request)?;
        if response.status == 403 {
            return Err(CslError::Authentication("invalid login credentials".to_string()));
        }
        let response = response.error_for_status()?;
        let cookie = response.cookie(SESSION_COOKIE).ok_or_else(|| {
            CslError::Authentication("login response did not set a session cookie".to_string())
        })?;
        std::fs::write(&self.session_path, &cookie)?;
        debug!("Saved session cookie to {}", self.session_path.display());
        self.session_cookie = Some(cookie);
        Ok(())
    }

    /// Ends the server session and truncates the cookie file.
    pub fn logout(&mut self) -> Result<()> {
        info!("Logging out");
        self.send(&ApiRequest::post("/api/logout"))?.error_for_status()?;
        self.session_cookie = None;
        std::fs::write(&self.session_path, "")?;
        Ok(())
    }

    /// Sends one request with the session cookie attached.
    pub(crate) fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse> {
        let request = self.authorize(request);
        debug!("{request}");
        Ok(self.transport.send(&request)?)
    }

    fn send_batch(&mut self, requests: &[ApiRequest]) -> Result<Vec<ApiResponse>> {
        if let [request] = requests {
            return Ok(vec![self.send(request)?]);
        }
        let authorized: Vec<_> = requests.iter().map(|r| self.authorize(r)).collect();
        debug!("Sending {} requests", authorized.len());
        self.transport
            .send_all(&authorized)
            .into_iter()
            .map(|result| result.map_err(CslError::from))
            .collect()
    }

    /// Presigned upload targets are foreign hosts and never get the cookie.
    fn authorize(&self, request: &ApiRequest) -> ApiRequest {
        match &self.session_cookie {
            Some(cookie) if !request.is_absolute() => request
                .clone()
                .with_header("Cookie", format!("{SESSION_COOKIE}={cookie}")),
            _ => request.clone(),
        }
    }

    /// Drives a bundle to completion.
    pub fn run_bundle<B: Bundle + ?Sized>(&mut self, bundle: &mut B) -> Result<B::Output> {
        let mut step = bundle.start()?;
        loop {
            match step {
                Step::Done(output) => return Ok(output),
                Step::Send(requests) => {
                    let responses = self.send_batch(&requests)?;
                    step = bundle.resume(responses)?;
                }
            }
        }
    }

    fn fetch_array<E: Entity>(&mut self, path: &str) -> Result<Vec<E>> {
        let response = self.send(&ApiRequest::get(path))?.error_for_status()?;
        let payload = response.json()?;
        let Some(items) = payload.as_array() else {
            return Err(CslError::UnexpectedResponse {
                endpoint: response.origin,
                payload,
            });
        };
        items.iter().map(E::from_json).collect()
    }

    fn fetch_one<E: Entity>(&mut self, path: &str) -> Result<E> {
        let response = self.send(&ApiRequest::get(path))?.error_for_status()?;
        E::from_json(&response.json()?)
    }

    /// Lists keyed by name, fetched once per session.
    pub fn lists(&mut self) -> Result<&HashMap<String, CatalogList>> {
        if self.lists.is_none() {
            info!("Fetching lists");
            let lists = self.fetch_array::<CatalogList>("/api/lists")?;
            self.lists = Some(lists.into_iter().map(|l| (l.name.clone(), l)).collect());
        }
        Ok(self.lists.get_or_insert_with(HashMap::new))
    }

    /// Groups keyed by name, fetched once per session.
    pub fn groups(&mut self) -> Result<&HashMap<String, Group>> {
        if self.groups.is_none() {
            info!("Fetching groups");
            let groups = self.fetch_array::<Group>("/api/groups")?;
            self.groups = Some(groups.into_iter().map(|g| (g.name.clone(), g)).collect());
        }
        Ok(self.groups.get_or_insert_with(HashMap::new))
    }

    pub fn list(&mut self, name: &str) -> Result<CatalogList> {
        self.lists()?
            .get(name)
            .cloned()
            .ok_or_else(|| CslError::UnknownList(name.to_string()))
    }

    /// Creates a list, optionally importing tracks from existing lists.
    pub fn create_list(&mut self, name: &str, import: &[CatalogList]) -> Result<CatalogList> {
        info!("Creating list {name}");
        let request = ApiRequest::post("/api/list").with_json(json!({
            "importListIds": import.iter().map(|list| list.id.as_str()).collect::<Vec<_>>(),
            "name": name,
        }));
        let response = self.send(&request)?;
        if response.status == 400 {
            let reason = response
                .general_error()
                .unwrap_or_else(|| response.body.clone());
            error!("Could not create list {name}: {reason}");
            return Err(CslError::ListCreateConflict(reason));
        }
        response.error_for_status()?;
        self.lists = None;
        self.list(name)
    }

    /// Renames a list and changes its membership in one request.
    pub fn list_edit(
        &mut self,
        list: &CatalogList,
        name: Option<&str>,
        add: &[Track],
        remove: &[Track],
    ) -> Result<()> {
        let ids = |tracks: &[Track]| -> Option<Vec<String>> {
            (!tracks.is_empty()).then(|| tracks.iter().map(|t| t.id.clone()).collect())
        };
        let request = ApiRequest::put(format!("/api/list/{}", list.id)).with_json(json!({
            "addSongIds": ids(add),
            "id": empty_id(),
            "name": name.unwrap_or(&list.name),
            "removeSongIds": ids(remove),
        }));
        info!(
            "Editing list {}: +{} -{}",
            list.name,
            add.len(),
            remove.len()
        );
        self.send(&request)?.error_for_status()?;
        self.lists = None;
        Ok(())
    }

    pub fn list_add(&mut self, list: &CatalogList, tracks: &[Track]) -> Result<()> {
        self.list_edit(list, None, tracks, &[])
    }

    pub fn list_remove(&mut self, list: &CatalogList, tracks: &[Track]) -> Result<()> {
        self.list_edit(list, None, &[], tracks)
    }

    pub fn add_group(&mut self, name: &str) -> Result<Group> {
        info!("Creating group {name}");
        let request = ApiRequest::post("/api/group").with_json(json!({ "name": name }));
        let response = self.send(&request)?.error_for_status()?;
        let group = Group::from_json(&response.json()?)?;
        self.groups = None;
        Ok(group)
    }

    pub fn get_song(&mut self, song: &SongSample) -> Result<Song> {
        self.fetch_one(&format!("/api/song/{}", song.id))
    }

    pub fn get_artist(&mut self, artist: &ArtistSample) -> Result<Artist> {
        self.fetch_one(&format!("/api/artist/{}", artist.id))
    }

    /// Metadata of a track's song, `None` when the song has none.
    pub fn get_metadata(&mut self, track: &Track) -> Result<Option<Metadata>> {
        let response = self.send(&ApiRequest::get(format!("/api/track/{}/metadata", track.id)))?;
        if response.status == 404 && response.general_error().as_deref() == Some(NO_METADATA) {
            debug!("{} has no metadata", track.display_name());
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Metadata::from_json(&response.json()?).map(Some)
    }

    /// Lazily pages through matching tracks.
    pub fn iter_tracks(&mut self, search: TrackSearch) -> Result<Pages<'_, T, TrackSearch>> {
        let limits = self.limits;
        Pages::new(self, search, limits)
    }

    pub fn iter_songs(
        &mut self,
        search_term: &str,
        batch_size: usize,
    ) -> Result<Pages<'_, T, TextSearch<SongSample>>> {
        let limits = self.limits;
        Pages::new(self, TextSearch::songs(search_term, batch_size), limits)
    }

    pub fn iter_artists(
        &mut self,
        search_term: &str,
        batch_size: usize,
    ) -> Result<Pages<'_, T, TextSearch<ArtistSample>>> {
        let limits = self.limits;
        Pages::new(self, TextSearch::artists(search_term, batch_size), limits)
    }

    /// Fetches every page, sending all pages after the first in one batch.
    pub fn collect_tracks_batched(&mut self, search: TrackSearch) -> Result<Vec<Track>> {
        let mut collector = PageCollector::new(search, self.limits)?;
        self.run_bundle(&mut collector)
    }

    fn run_edit<B: EditBundle + 'static>(&mut self, mut bundle: B, mode: RunMode) -> Result<()> {
        match mode {
            RunMode::Queue => {
                info!("Queued: {}", bundle.summary().headline());
                self.queue.push(Box::new(bundle));
                Ok(())
            }
            RunMode::Immediate => {
                info!("Applying: {}", bundle.summary().headline());
                self.run_bundle(&mut bundle)
            }
        }
    }

    /// Adds credits and extra metadata. Returns false when nothing needed sending.
    pub fn track_add_metadata(
        &mut self,
        track: &Track,
        edits: Vec<MetadataEdit>,
        overrides: Option<bool>,
        existing: Option<&Metadata>,
        mode: RunMode,
    ) -> Result<bool> {
        match MetadataAdd::prepare(track, edits, overrides, existing) {
            Some(bundle) => self.run_edit(bundle, mode).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn track_remove_metadata(
        &mut self,
        track: &Track,
        target: impl Into<MetadataTarget>,
        mode: RunMode,
    ) -> Result<()> {
        self.run_edit(MetadataRemove::new(track, target.into()), mode)
    }

    /// Replaces track fields. Returns false when no field changes.
    pub fn track_edit(
        &mut self,
        track: &Track,
        changes: TrackChanges,
        mode: RunMode,
    ) -> Result<bool> {
        match TrackEdit::prepare(track, changes) {
            Some(bundle) => self.run_edit(bundle, mode).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn add_album(
        &mut self,
        name: &str,
        original_name: &str,
        year: Option<i32>,
        groups: &[Group],
        discs: &[Vec<AlbumTrack>],
        mode: RunMode,
    ) -> Result<()> {
        self.run_edit(AlbumAdd::new(name, original_name, year, groups, discs), mode)
    }

    /// Uploads audio for a track. The file is validated before any request.
    pub fn add_audio(&mut self, track: &Track, path: &Path, mode: RunMode) -> Result<()> {
        let bundle = AudioUpload::prepare(track, path)?;
        self.run_edit(bundle, mode)
    }

    /// Queues an already prepared bundle.
    pub fn enqueue(&mut self, bundle: Box<dyn EditBundle>) {
        info!("Queued: {}", bundle.summary().headline());
        self.queue.push(bundle);
    }

    pub fn queue(&self) -> &[Box<dyn EditBundle>] {
        &self.queue
    }

    /// Drops one pending edit without sending it.
    pub fn discard(&mut self, index: usize) -> Option<Box<dyn EditBundle>> {
        if index >= self.queue.len() {
            return None;
        }
        let bundle = self.queue.remove(index);
        info!("Discarded: {}", bundle.summary().headline());
        Some(bundle)
    }

    pub fn clear_queue(&mut self) {
        if !self.queue.is_empty() {
            warn!("Discarding {} queued changes", self.queue.len());
        }
        self.queue.clear();
    }

    /// Applies queued edits in order.
    ///
    /// With `stop_on_error`, the first failure aborts the commit and the failed
    /// edit stays queued along with everything after it. Otherwise every edit
    /// is attempted, the queue is emptied, and failures are reported.
    pub fn commit(&mut self, stop_on_error: bool) -> Result<CommitReport> {
        info!("Committing {} changes", self.queue.len());
        let mut pending = std::mem::take(&mut self.queue).into_iter().enumerate();
        let mut report = CommitReport::default();
        while let Some((index, mut bundle)) = pending.next() {
            match self.run_bundle(bundle.as_mut()) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    let summary = bundle.summary();
                    error!("Change {index} failed ({}): {err}", summary.headline());
                    if stop_on_error {
                        self.queue.push(bundle);
                        self.queue.extend(pending.map(|(_, bundle)| bundle));
                        return Err(CslError::CommitAborted {
                            index,
                            summary: summary.headline(),
                            source: Box::new(err),
                        });
                    }
                    report.failures.push(BundleFailure {
                        index,
                        summary,
                        error: err,
                    });
                }
            }
        }
        info!(
            "Commit finished: {} applied, {} failed",
            report.applied,
            report.failures.len()
        );
        Ok(report)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            warn!("Closing session with {} uncommitted changes", self.queue.len());
        }
        debug!("Closing client");
        self.transport.close();
    }
}

fn read_session_cookie(path: &Path) -> Result<Option<String>> {
    if path.is_dir() {
        return Err(CslError::Config(format!(
            "session_path {} is a directory",
            path.display()
        )));
    }
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let cookie = text.trim();
            Ok((!cookie.is_empty()).then(|| cookie.to_string()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests;
