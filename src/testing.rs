//! Test fixtures and a scripted in-memory transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::HttpError;
use crate::session::Session;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport, SESSION_COOKIE};

pub fn ok_json(value: Value) -> ApiResponse {
    json_response(200, value)
}

pub fn json_response(status: u16, value: Value) -> ApiResponse {
    ApiResponse::new(status, value.to_string())
}

pub mod fixtures {
    use serde_json::{json, Value};

    pub fn artist_json(id: &str, name: &str, disambiguation: Option<&str>) -> Value {
        json!({
            "id": id,
            "name": name,
            "originalName": name,
            "disambiguation": disambiguation,
            "type": 1,
        })
    }

    pub fn song_json(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "disambiguation": null,
            "createdAt": "2024-06-01T00:00:00Z",
        })
    }

    /// Track with `(artist_id, name, position)` credits joined by `", "`.
    pub fn track_json(id: &str, name: &str, credits: &[(&str, &str, i64)]) -> Value {
        let artist_credits: Vec<Value> = credits
            .iter()
            .map(|(artist_id, artist_name, position)| {
                json!({
                    "artist": artist_json(artist_id, artist_name, None),
                    "name": artist_name,
                    "joinPhrase": ", ",
                    "position": position,
                })
            })
            .collect();
        json!({
            "id": id,
            "name": name,
            "originalName": name,
            "originalSimpleArtist": "Aqours",
            "originalAlbum": null,
            "album": "Single",
            "trackNumber": 1,
            "trackTotal": 1,
            "discNumber": 1,
            "discTotal": 1,
            "year": 2017,
            "song": null,
            "artistCredits": artist_credits,
            "groups": [],
            "audioId": null,
            "audioName": null,
            "disabled": false,
            "type": 0,
            "createdAt": "2024-06-01T00:00:00Z",
            "updatedAt": "2024-06-01T00:00:00Z",
            "inList": false,
        })
    }

    /// Metadata from `(id, role, artist_id, artist_name)` credits and
    /// `(id, scope_code, key, value)` extra entries.
    pub fn metadata_json(
        credits: &[(&str, &str, &str, &str)],
        extras: &[(&str, i64, &str, &str)],
        fields: &[&str],
    ) -> Value {
        let artist_credits: Vec<Value> = credits
            .iter()
            .map(|(id, role, artist_id, artist_name)| {
                json!({
                    "id": id,
                    "type": role,
                    "artist": artist_json(artist_id, artist_name, None),
                })
            })
            .collect();
        let extra_metas: Vec<Value> = extras
            .iter()
            .map(|(id, scope, key, value)| {
                json!({"id": id, "type": scope, "key": key, "value": value})
            })
            .collect();
        json!({
            "override": false,
            "artistCredits": artist_credits,
            "extraMetas": extra_metas,
            "totalCount": credits.len() + extras.len(),
            "fields": fields,
        })
    }

    pub fn song_detail_json(id: &str, name: &str) -> Value {
        let mut song = song_json(id, name);
        song["artistCredits"] = json!([{
            "id": "sc1",
            "type": "Vocals",
            "artist": artist_json("a1", "Shuka Saitou", None),
        }]);
        song["extraMetas"] = json!([]);
        song
    }

    pub fn artist_detail_json(id: &str, name: &str) -> Value {
        let mut artist = artist_json(id, name, None);
        artist["forwardRelations"] = json!([{
            "id": "r1",
            "type": 2,
            "artist": artist_json("a2", "You Watanabe", None),
        }]);
        artist["reverseRelations"] = json!([]);
        artist["linkedAMQSongs"] = json!([]);
        artist["linkedTracks"] = json!([{
            "id": "t1",
            "name": "Blue sky summer",
            "artists": [],
        }]);
        artist
    }

    pub fn list_json(id: &str, name: &str, count: u64) -> Value {
        json!({"id": id, "name": name, "count": count})
    }

    pub fn group_json(id: &str, name: &str) -> Value {
        json!({"id": id, "name": name})
    }

    pub fn page_json(key: &str, items: Vec<Value>, count: usize) -> Value {
        json!({ key: items, "count": count })
    }
}

type Predicate = Box<dyn Fn(&ApiRequest) -> bool>;

enum Reply {
    Response(ApiResponse),
    NetworkFailure,
}

struct Route {
    method: Method,
    target: String,
    predicate: Option<Predicate>,
    replies: VecDeque<Reply>,
    hits: usize,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    calls: Vec<ApiRequest>,
    closed: bool,
}

/// Handle to a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteId(usize);

/// Scripted server. Routes are matched newest first; a route's last reply
/// repeats once earlier ones are used.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Rc<RefCell<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport {
            state: Rc::clone(&self.state),
        }
    }

    fn add(
        &self,
        method: Method,
        target: &str,
        predicate: Option<Predicate>,
        replies: Vec<Reply>,
    ) -> RouteId {
        let mut state = self.state.borrow_mut();
        state.routes.push(Route {
            method,
            target: target.to_string(),
            predicate,
            replies: replies.into(),
            hits: 0,
        });
        RouteId(state.routes.len() - 1)
    }

    pub fn mock(&self, method: Method, target: &str, response: ApiResponse) -> RouteId {
        self.add(method, target, None, vec![Reply::Response(response)])
    }

    pub fn mock_when(
        &self,
        method: Method,
        target: &str,
        predicate: impl Fn(&ApiRequest) -> bool + 'static,
        response: ApiResponse,
    ) -> RouteId {
        self.add(
            method,
            target,
            Some(Box::new(predicate)),
            vec![Reply::Response(response)],
        )
    }

    pub fn mock_sequence(
        &self,
        method: Method,
        target: &str,
        responses: Vec<ApiResponse>,
    ) -> RouteId {
        let replies = responses.into_iter().map(Reply::Response).collect();
        self.add(method, target, None, replies)
    }

    pub fn fail_network(&self, method: Method, target: &str) -> RouteId {
        self.add(method, target, None, vec![Reply::NetworkFailure])
    }

    pub fn hits(&self, route: RouteId) -> usize {
        self.state.borrow().routes[route.0].hits
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.state.borrow().calls.clone()
    }

    /// Calls whose `METHOD target` starts with `prefix`.
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.target.starts_with(prefix))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Accepts `session-id=valid` as an admin named `You`.
    pub fn mock_admin(&self) {
        self.mock(
            Method::Get,
            "/api/auth/me",
            json_response(401, json!({})),
        );
        self.mock_when(
            Method::Get,
            "/api/auth/me",
            |request| {
                request
                    .headers
                    .iter()
                    .any(|(key, value)| key == "Cookie" && value == "session-id=valid")
            },
            ok_json(json!({"name": "You", "roles": ["ADMIN"]})),
        );
    }
}

pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl Transport for MockTransport {
    fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(request.clone());
        let origin = request.to_string();
        let route = state.routes.iter_mut().rev().find(|route| {
            route.method == request.method
                && route.target == request.target
                && route.predicate.as_ref().map_or(true, |matches| matches(request))
        });
        let Some(route) = route else {
            return Err(HttpError::Transport {
                method: request.method.to_string(),
                url: request.target.clone(),
                reason: format!("no mock route for {origin}"),
            });
        };
        route.hits += 1;
        let reply = if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().map(|reply| match reply {
                Reply::Response(response) => Reply::Response(response.clone()),
                Reply::NetworkFailure => Reply::NetworkFailure,
            })
        };
        match reply {
            Some(Reply::Response(mut response)) => {
                response.origin = origin;
                Ok(response)
            }
            Some(Reply::NetworkFailure) | None => Err(HttpError::Transport {
                method: request.method.to_string(),
                url: request.target.clone(),
                reason: "connection reset".to_string(),
            }),
        }
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

/// Session authenticated through a stored cookie, with its temp dir.
pub fn admin_session(server: &MockServer) -> (Session<MockTransport>, tempfile::TempDir) {
    server.mock_admin();
    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.txt");
    std::fs::write(&session_path, "valid").expect("write cookie");
    let config = ClientConfig {
        session_path,
        ..ClientConfig::default()
    };
    let session = Session::open(&config, server.transport()).expect("admin session");
    (session, dir)
}

/// Cookie header value the mock accepts.
pub fn valid_cookie() -> String {
    format!("{SESSION_COOKIE}=valid")
}
