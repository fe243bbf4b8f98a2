//! Paged search over tracks, songs and artists.
//!
//! The first page fixes the result bound. Later pages may report a different
//! count while the database changes underneath; that is logged and otherwise
//! ignored so iteration always terminates.

use std::collections::VecDeque;
use std::marker::PhantomData;

use log::{debug, error, info, warn};
use serde_json::{json, Value};

use crate::bundles::{Bundle, Step};
use crate::error::{CslError, Result};
use crate::models::{ArtistSample, CatalogList, Entity, Group, SongSample, Track};
use crate::session::Session;
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_QUERY_SIZE: usize = 1500;
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Guardrails applied to every paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub max_batch_size: usize,
    pub max_query_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_query_size: DEFAULT_MAX_QUERY_SIZE,
        }
    }
}

impl PageLimits {
    pub fn validate_batch_size(&self, batch_size: usize) -> Result<()> {
        if batch_size == 0 || batch_size > self.max_batch_size {
            return Err(CslError::InvalidBatchSize {
                batch_size,
                max_batch_size: self.max_batch_size,
            });
        }
        Ok(())
    }

    fn check_query_size(&self, count: usize) -> Result<()> {
        if count > self.max_query_size {
            error!(
                "Query returned {count} results, above the limit of {}",
                self.max_query_size
            );
            return Err(CslError::QueryTooLarge {
                count,
                max_query_size: self.max_query_size,
            });
        }
        Ok(())
    }
}

/// One paged endpoint and its parameters.
pub trait PageQuery {
    type Item: Entity;

    /// Key of the item array in each page.
    fn item_key(&self) -> &'static str;

    fn batch_size(&self) -> usize;

    fn page_request(&self, skip: usize, take: usize) -> ApiRequest;
}

/// Track search with the server's quick filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSearch {
    pub search_term: String,
    pub groups: Vec<Group>,
    pub active_list: Option<CatalogList>,
    pub missing_audio: bool,
    pub missing_info: bool,
    pub batch_size: usize,
}

impl Default for TrackSearch {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            groups: Vec::new(),
            active_list: None,
            missing_audio: false,
            missing_info: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl TrackSearch {
    pub fn new(search_term: impl Into<String>) -> Self {
        Self {
            search_term: search_term.into(),
            ..Self::default()
        }
    }

    pub fn in_groups(mut self, groups: impl IntoIterator<Item = Group>) -> Self {
        self.groups.extend(groups);
        self
    }

    /// Restricts results to tracks in `list`.
    pub fn in_list(mut self, list: CatalogList) -> Self {
        self.active_list = Some(list);
        self
    }

    pub fn missing_audio(mut self) -> Self {
        self.missing_audio = true;
        self
    }

    pub fn missing_info(mut self) -> Self {
        self.missing_info = true;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Server codes of the enabled quick filters.
    pub fn quick_filters(&self) -> Vec<u8> {
        [
            self.missing_audio,
            self.missing_info,
            self.active_list.is_some(),
        ]
        .into_iter()
        .zip(1u8..)
        .filter_map(|(enabled, code)| enabled.then_some(code))
        .collect()
    }
}

impl PageQuery for TrackSearch {
    type Item = Track;

    fn item_key(&self) -> &'static str {
        "tracks"
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn page_request(&self, skip: usize, take: usize) -> ApiRequest {
        let body = json!({
            "activeListId": self.active_list.as_ref().map(|list| list.id.as_str()),
            "filter": "",
            "groupFilters": self.groups.iter().map(|group| group.id.as_str()).collect::<Vec<_>>(),
            "orderBy": "",
            "quickFilters": self.quick_filters(),
            "searchTerm": self.search_term,
            "skip": skip,
            "take": take,
        });
        ApiRequest::post("/api/tracks").with_json(body)
    }
}

/// Plain text search over songs or artists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearch<T> {
    path: &'static str,
    key: &'static str,
    pub search_term: String,
    pub batch_size: usize,
    item: PhantomData<fn() -> T>,
}

impl<T> TextSearch<T> {
    fn new(path: &'static str, key: &'static str, search_term: &str, batch_size: usize) -> Self {
        Self {
            path,
            key,
            search_term: search_term.to_string(),
            batch_size,
            item: PhantomData,
        }
    }
}

impl TextSearch<SongSample> {
    pub fn songs(search_term: &str, batch_size: usize) -> Self {
        Self::new("/api/songs", "songs", search_term, batch_size)
    }
}

impl TextSearch<ArtistSample> {
    pub fn artists(search_term: &str, batch_size: usize) -> Self {
        Self::new("/api/artists", "artists", search_term, batch_size)
    }
}

impl<T: Entity> PageQuery for TextSearch<T> {
    type Item = T;

    fn item_key(&self) -> &'static str {
        self.key
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn page_request(&self, skip: usize, take: usize) -> ApiRequest {
        ApiRequest::get(self.path)
            .with_query("searchTerm", self.search_term.as_str())
            .with_query("skip", skip.to_string())
            .with_query("take", take.to_string())
            .with_query("orderBy", "")
            .with_query("filter", "")
    }
}

/// Splits one page into its reported count and raw items.
fn parse_page(key: &str, response: ApiResponse) -> Result<(usize, Vec<Value>)> {
    let response = response.error_for_status()?;
    let mut payload = response.json()?;
    let count = payload.get("count").and_then(Value::as_u64);
    let items = payload.get_mut(key).map(Value::take);
    match (count, items) {
        (Some(count), Some(Value::Array(items))) => Ok((count as usize, items)),
        _ => {
            error!("Page from {} lacks count or {}", response.origin, key);
            Err(CslError::UnexpectedResponse {
                endpoint: response.origin,
                payload,
            })
        }
    }
}

fn decode_items<T: Entity>(items: &[Value]) -> Result<Vec<T>> {
    items.iter().map(T::from_json).collect()
}

/// Lazy sequential pagination. Each page is fetched when the previous one is
/// used up; errors end the sequence.
pub struct Pages<'s, T: Transport, Q: PageQuery> {
    session: &'s mut Session<T>,
    query: Q,
    limits: PageLimits,
    skip: usize,
    read: usize,
    bound: Option<usize>,
    buffer: VecDeque<Value>,
    finished: bool,
}

impl<'s, T: Transport, Q: PageQuery> Pages<'s, T, Q> {
    pub(crate) fn new(session: &'s mut Session<T>, query: Q, limits: PageLimits) -> Result<Self> {
        limits.validate_batch_size(query.batch_size())?;
        Ok(Self {
            session,
            query,
            limits,
            skip: 0,
            read: 0,
            bound: None,
            buffer: VecDeque::new(),
            finished: false,
        })
    }

    /// Total reported by the first page, once fetched.
    pub fn bound(&self) -> Option<usize> {
        self.bound
    }

    fn fetch_next_page(&mut self) -> Result<()> {
        let key = self.query.item_key();
        let request = self.query.page_request(self.skip, self.query.batch_size());
        info!("Querying {key}, skip {}", self.skip);
        let response = self.session.send(&request)?;
        let (count, items) = parse_page(key, response)?;
        let bound = match self.bound {
            None => {
                self.limits.check_query_size(count)?;
                info!("Query has {count} {key}");
                self.bound = Some(count);
                count
            }
            Some(bound) => {
                if bound != count {
                    warn!("Count of {key} changed from {bound} to {count} during iteration");
                }
                bound
            }
        };
        self.skip += self.query.batch_size();
        self.read += items.len();
        debug!("Page exhausted, {} of {bound} {key} read", self.read);
        if items.is_empty() || self.read >= bound {
            info!("Finished querying {key}");
            self.finished = true;
        }
        self.buffer.extend(items);
        Ok(())
    }
}

impl<T: Transport, Q: PageQuery> Iterator for Pages<'_, T, Q> {
    type Item = Result<Q::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(raw) = self.buffer.pop_front() {
                let item = Q::Item::from_json(&raw);
                if item.is_err() {
                    self.buffer.clear();
                    self.finished = true;
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.fetch_next_page() {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectStage {
    Idle,
    FirstPage,
    RemainingPages { bound: usize },
}

/// Fetches the first page, then every remaining page in one batch.
pub struct PageCollector<Q: PageQuery> {
    query: Q,
    limits: PageLimits,
    stage: CollectStage,
    items: Vec<Value>,
}

impl<Q: PageQuery> PageCollector<Q> {
    pub fn new(query: Q, limits: PageLimits) -> Result<Self> {
        limits.validate_batch_size(query.batch_size())?;
        Ok(Self {
            query,
            limits,
            stage: CollectStage::Idle,
            items: Vec::new(),
        })
    }

    fn finish(&mut self) -> Result<Step<Vec<Q::Item>>> {
        self.stage = CollectStage::Idle;
        let items = std::mem::take(&mut self.items);
        info!("Finished querying {}", self.query.item_key());
        Ok(Step::Done(decode_items(&items)?))
    }
}

impl<Q: PageQuery> Bundle for PageCollector<Q> {
    type Output = Vec<Q::Item>;

    fn start(&mut self) -> Result<Step<Self::Output>> {
        self.stage = CollectStage::FirstPage;
        self.items.clear();
        let take = self.query.batch_size();
        Ok(Step::Send(vec![self.query.page_request(0, take)]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<Self::Output>> {
        let key = self.query.item_key();
        let take = self.query.batch_size();
        match self.stage {
            CollectStage::FirstPage => {
                let first = crate::bundles::single_response(responses)?;
                let (count, items) = parse_page(key, first)?;
                self.limits.check_query_size(count)?;
                info!("Query has {count} {key}");
                let exhausted = items.is_empty() || items.len() >= count;
                self.items = items;
                if exhausted {
                    return self.finish();
                }
                let requests = (take..count)
                    .step_by(take)
                    .map(|skip| self.query.page_request(skip, take))
                    .collect();
                self.stage = CollectStage::RemainingPages { bound: count };
                Ok(Step::Send(requests))
            }
            CollectStage::RemainingPages { bound } => {
                for response in responses {
                    let (count, items) = parse_page(key, response)?;
                    if count != bound {
                        warn!("Count of {key} changed from {bound} to {count} during collection");
                    }
                    self.items.extend(items);
                }
                self.finish()
            }
            CollectStage::Idle => Err(CslError::UnexpectedResponse {
                endpoint: format!("page collector for {key}"),
                payload: Value::Null,
            }),
        }
    }
}
