use serde_json::json;

use crate::bundles::{finish_single, Bundle, EditBundle, EditSummary, Step};
use crate::error::Result;
use crate::models::{AlbumTrack, Group};
use crate::transport::{ApiRequest, ApiResponse};

/// Creates an album with its tracks, one vector per disc.
#[derive(Debug, Clone)]
pub struct AlbumAdd {
    name: String,
    original_name: String,
    year: Option<i32>,
    group_names: Vec<String>,
    track_count: usize,
    disc_count: usize,
    request: ApiRequest,
}

impl AlbumAdd {
    pub fn new(
        name: &str,
        original_name: &str,
        year: Option<i32>,
        groups: &[Group],
        discs: &[Vec<AlbumTrack>],
    ) -> Self {
        let tracks: Vec<_> = discs
            .iter()
            .enumerate()
            .flat_map(|(disc_index, disc)| {
                disc.iter().enumerate().map(move |(track_index, track)| {
                    track.to_json(disc_index + 1, track_index + 1, disc.len())
                })
            })
            .collect();
        let track_count = tracks.len();
        let body = json!({
            "album": name,
            "discTotal": discs.len(),
            "groupIds": groups.iter().map(|group| group.id.as_str()).collect::<Vec<_>>(),
            "originalAlbum": original_name,
            "year": year,
            "tracks": tracks,
        });
        Self {
            name: name.to_string(),
            original_name: original_name.to_string(),
            year,
            group_names: groups.iter().map(|group| group.name.clone()).collect(),
            track_count,
            disc_count: discs.len(),
            request: ApiRequest::post("/api/album").with_json(body),
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

impl Bundle for AlbumAdd {
    type Output = ();

    fn start(&mut self) -> Result<Step<()>> {
        Ok(Step::Send(vec![self.request.clone()]))
    }

    fn resume(&mut self, responses: Vec<ApiResponse>) -> Result<Step<()>> {
        finish_single(responses)
    }
}

impl EditBundle for AlbumAdd {
    fn summary(&self) -> EditSummary {
        EditSummary {
            target_name: Some(self.name.clone()),
            ..EditSummary::new("Add album")
        }
        .line(format!("original name {}", self.original_name))
        .line(match self.year {
            Some(year) => format!("year {year}"),
            None => "year unknown".to_string(),
        })
        .line(format!("groups {}", self.group_names.join(", ")))
        .line(format!(
            "{} tracks on {} discs",
            self.track_count, self.disc_count
        ))
    }
}
