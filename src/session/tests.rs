use serde_json::{json, Value};

use super::Session;
use crate::bundles::{RunMode, TrackChanges};
use crate::config::ClientConfig;
use crate::error::{CslError, HttpError};
use crate::models::{Entity, ExtraMetadataEntry, Metadata, SongSample, Track, TrackType};
use crate::pagination::TrackSearch;
use crate::testing::{admin_session, fixtures, json_response, ok_json, valid_cookie, MockServer};
use crate::transport::{ApiResponse, Method};

fn track(id: &str) -> Track {
    Track::from_json(&fixtures::track_json(id, "Blue sky summer", &[])).expect("track fixture")
}

fn track_page(ids: std::ops::Range<usize>, count: usize) -> ApiResponse {
    let items: Vec<Value> = ids
        .map(|n| fixtures::track_json(&format!("t{n}"), "Track", &[]))
        .collect();
    ok_json(fixtures::page_json("tracks", items, count))
}

fn body_skip(request: &crate::transport::ApiRequest) -> Option<u64> {
    request.json_body().and_then(|body| body["skip"].as_u64())
}

#[test]
fn test_stored_cookie_skips_login() {
    let server = MockServer::new();
    let (session, _dir) = admin_session(&server);
    assert_eq!(session.user_name(), "You");
    assert!(server.calls_to(Method::Post, "/api/login").is_empty());
    let first_call = &server.calls()[0];
    assert!(first_call
        .headers
        .iter()
        .any(|(key, value)| key == "Cookie" && *value == valid_cookie()));
}

#[test]
fn test_stale_cookie_logs_in_and_persists_new_cookie() {
    let server = MockServer::new();
    server.mock_admin();
    let mut login = ok_json(json!({}));
    login.set_cookies = vec!["session-id=valid; Path=/; HttpOnly".to_string()];
    let login_route = server.mock(Method::Post, "/api/login", login);

    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.txt");
    std::fs::write(&session_path, "expired").expect("write");
    let config = ClientConfig {
        username: Some("you".to_string()),
        password: Some("secret".to_string()),
        session_path: session_path.clone(),
        ..ClientConfig::default()
    };
    let session = Session::open(&config, server.transport()).expect("login succeeds");
    assert_eq!(session.user_name(), "You");
    assert_eq!(server.hits(login_route), 1);
    let body = server.calls_to(Method::Post, "/api/login")[0]
        .json_body()
        .cloned();
    assert_eq!(body, Some(json!({"username": "you", "password": "secret"})));
    assert_eq!(
        std::fs::read_to_string(&session_path).expect("cookie file"),
        "valid"
    );
}

#[test]
fn test_rejected_credentials_fail_authentication() {
    let server = MockServer::new();
    server.mock_admin();
    server.mock(Method::Post, "/api/login", json_response(403, json!({})));
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig {
        username: Some("you".to_string()),
        password: Some("wrong".to_string()),
        session_path: dir.path().join("session.txt"),
        ..ClientConfig::default()
    };
    let error = Session::open(&config, server.transport()).err().expect("must fail");
    assert!(matches!(error, CslError::Authentication(_)), "{error}");
    assert!(server.closed());
}

#[test]
fn test_missing_credentials_never_reach_server() {
    let server = MockServer::new();
    server.mock_admin();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig {
        username: Some(String::new()),
        session_path: dir.path().join("session.txt"),
        ..ClientConfig::default()
    };
    let error = Session::open(&config, server.transport()).err().expect("must fail");
    assert!(matches!(error, CslError::Authentication(_)));
    assert_eq!(server.call_count(), 0);
}

#[test]
fn test_non_admin_is_rejected() {
    let server = MockServer::new();
    server.mock(
        Method::Get,
        "/api/auth/me",
        ok_json(json!({"name": "Guest", "roles": ["USER"]})),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.txt");
    std::fs::write(&session_path, "guest-cookie").expect("write");
    let config = ClientConfig {
        session_path,
        ..ClientConfig::default()
    };
    let error = Session::open(&config, server.transport()).err().expect("must fail");
    assert!(error.to_string().contains("admin"), "{error}");
}

#[test]
fn test_auth_payload_without_name_is_malformed() {
    let server = MockServer::new();
    server.mock(
        Method::Get,
        "/api/auth/me",
        ok_json(json!({"roles": ["ADMIN"]})),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.txt");
    std::fs::write(&session_path, "nameless-cookie").expect("write");
    let config = ClientConfig {
        session_path,
        ..ClientConfig::default()
    };
    let error = Session::open(&config, server.transport()).err().expect("must fail");
    assert!(
        matches!(error, CslError::MalformedResponse { entity: "AuthUser", .. }),
        "{error}"
    );
}

#[test]
fn test_session_path_directory_is_rejected() {
    let server = MockServer::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig {
        session_path: dir.path().to_path_buf(),
        ..ClientConfig::default()
    };
    assert!(matches!(
        Session::open(&config, server.transport()),
        Err(CslError::Config(_))
    ));
}

#[test]
fn test_drop_closes_transport() {
    let server = MockServer::new();
    let (session, _dir) = admin_session(&server);
    assert!(!server.closed());
    drop(session);
    assert!(server.closed());
}

#[test]
fn test_logout_truncates_cookie_file() {
    let server = MockServer::new();
    let (mut session, dir) = admin_session(&server);
    server.mock(Method::Post, "/api/logout", ApiResponse::new(200, ""));
    session.logout().expect("logout");
    let cookie = std::fs::read_to_string(dir.path().join("session.txt")).expect("cookie file");
    assert!(cookie.is_empty());
}

#[test]
fn test_lists_are_cached_and_conflicts_reported() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let lists_route = server.mock(
        Method::Get,
        "/api/lists",
        ok_json(json!([fixtures::list_json("l1", "todo", 4)])),
    );
    assert_eq!(session.lists().expect("lists").len(), 1);
    assert_eq!(session.list("todo").expect("list").id, "l1");
    assert_eq!(server.hits(lists_route), 1);
    assert!(matches!(
        session.list("missing"),
        Err(CslError::UnknownList(name)) if name == "missing"
    ));

    server.mock(
        Method::Post,
        "/api/list",
        json_response(
            400,
            json!({"errors": {"generalErrors": ["List with that name already exists"]}}),
        ),
    );
    let error = session.create_list("todo", &[]).expect_err("conflict");
    assert!(matches!(
        error,
        CslError::ListCreateConflict(reason) if reason == "List with that name already exists"
    ));
}

#[test]
fn test_create_list_refreshes_cache() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let lists_route = server.mock_sequence(
        Method::Get,
        "/api/lists",
        vec![
            ok_json(json!([])),
            ok_json(json!([fixtures::list_json("l2", "fresh", 0)])),
        ],
    );
    assert!(session.lists().expect("lists").is_empty());
    server.mock(Method::Post, "/api/list", ApiResponse::new(200, ""));
    let created = session.create_list("fresh", &[]).expect("created");
    assert_eq!(created.id, "l2");
    assert_eq!(server.hits(lists_route), 2);
}

#[test]
fn test_list_edit_body() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(Method::Put, "/api/list/l1", ApiResponse::new(200, ""));
    let list = crate::models::CatalogList {
        id: "l1".to_string(),
        name: "todo".to_string(),
        count: 0,
    };
    session.list_add(&list, &[track("t1"), track("t2")]).expect("edit");
    let body = server.calls_to(Method::Put, "/api/list/l1")[0]
        .json_body()
        .cloned()
        .expect("json body");
    assert_eq!(body["addSongIds"], json!(["t1", "t2"]));
    assert_eq!(body["removeSongIds"], Value::Null);
    assert_eq!(body["name"], json!("todo"));
}

#[test]
fn test_add_group_returns_created_group() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Post,
        "/api/group",
        ok_json(fixtures::group_json("g9", "Hasunosora")),
    );
    let group = session.add_group("Hasunosora").expect("group");
    assert_eq!(group.id, "g9");
}

#[test]
fn test_song_and_artist_details() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Get,
        "/api/song/s1",
        ok_json(fixtures::song_detail_json("s1", "Blue sky summer")),
    );
    let sample =
        SongSample::from_json(&fixtures::song_json("s1", "Blue sky summer")).expect("sample");
    let song = session.get_song(&sample).expect("song");
    assert_eq!(song.artist_credits[0].role, "Vocals");
}

#[test]
fn test_missing_metadata_is_none() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Get,
        "/api/track/t1/metadata",
        json_response(
            404,
            json!({"errors": {"generalErrors": ["Song does not have metadata"]}}),
        ),
    );
    server.mock(
        Method::Get,
        "/api/track/t2/metadata",
        json_response(404, json!({"errors": {"generalErrors": ["Track not found"]}})),
    );
    assert_eq!(session.get_metadata(&track("t1")).expect("no metadata"), None);
    let error = session.get_metadata(&track("t2")).expect_err("other 404");
    assert!(matches!(
        error,
        CslError::Http(HttpError::Status { status: 404, .. })
    ));
}

#[test]
fn test_blue_sky_search_then_missing_metadata() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Post,
        "/api/tracks",
        ok_json(fixtures::page_json(
            "tracks",
            vec![fixtures::track_json("t1", "Blue sky summer", &[])],
            1,
        )),
    );
    server.mock(
        Method::Get,
        "/api/track/t1/metadata",
        json_response(
            404,
            json!({"errors": {"generalErrors": ["Song does not have metadata"]}}),
        ),
    );

    let tracks: Vec<Track> = session
        .iter_tracks(TrackSearch::new("Blue sky"))
        .expect("valid search")
        .collect::<Result<_, _>>()
        .expect("one page");
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].id, "t1");
    let body = server.calls_to(Method::Post, "/api/tracks")[0]
        .json_body()
        .cloned()
        .expect("json body");
    assert_eq!(body["searchTerm"], json!("Blue sky"));
    assert_eq!(session.get_metadata(&tracks[0]).expect("lookup"), None);
}

#[test]
fn test_pagination_requests_each_page_once() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock_sequence(
        Method::Post,
        "/api/tracks",
        vec![
            track_page(0..50, 120),
            track_page(50..100, 120),
            track_page(100..120, 120),
        ],
    );
    let tracks: Vec<Track> = session
        .iter_tracks(TrackSearch::new("").batch_size(50))
        .expect("valid search")
        .collect::<Result<_, _>>()
        .expect("all pages");
    assert_eq!(tracks.len(), 120);
    assert_eq!(tracks[119].id, "t119");
    let skips: Vec<_> = server
        .calls_to(Method::Post, "/api/tracks")
        .iter()
        .map(body_skip)
        .collect();
    assert_eq!(skips, vec![Some(0), Some(50), Some(100)]);
}

#[test]
fn test_pagination_is_lazy() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock_sequence(
        Method::Post,
        "/api/tracks",
        vec![track_page(0..2, 4), track_page(2..4, 4)],
    );
    let mut pages = session
        .iter_tracks(TrackSearch::new("").batch_size(2))
        .expect("valid search");
    assert!(pages.next().is_some());
    assert_eq!(pages.bound(), Some(4));
    drop(pages);
    assert_eq!(server.calls_to(Method::Post, "/api/tracks").len(), 1);
}

#[test]
fn test_empty_result_is_one_request() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(Method::Post, "/api/tracks", track_page(0..0, 0));
    let count = session
        .iter_tracks(TrackSearch::new("nothing"))
        .expect("valid search")
        .count();
    assert_eq!(count, 0);
    assert_eq!(server.calls_to(Method::Post, "/api/tracks").len(), 1);
}

#[test]
fn test_query_guardrail_stops_on_first_page() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(Method::Post, "/api/tracks", track_page(0..50, 1501));
    let mut pages = session
        .iter_tracks(TrackSearch::new(""))
        .expect("valid search");
    assert!(matches!(
        pages.next(),
        Some(Err(CslError::QueryTooLarge {
            count: 1501,
            max_query_size: 1500
        }))
    ));
    assert!(pages.next().is_none());
    drop(pages);
    assert_eq!(server.calls_to(Method::Post, "/api/tracks").len(), 1);
}

#[test]
fn test_invalid_batch_size_sends_nothing() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let before = server.call_count();
    assert!(matches!(
        session.iter_tracks(TrackSearch::new("").batch_size(101)),
        Err(CslError::InvalidBatchSize { .. })
    ));
    assert!(matches!(
        session.iter_songs("", 0),
        Err(CslError::InvalidBatchSize { .. })
    ));
    assert_eq!(server.call_count(), before);
}

#[test]
fn test_count_drift_keeps_first_bound() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock_sequence(
        Method::Post,
        "/api/tracks",
        vec![track_page(0..50, 100), track_page(50..100, 130)],
    );
    let tracks: Vec<Track> = session
        .iter_tracks(TrackSearch::new(""))
        .expect("valid search")
        .collect::<Result<_, _>>()
        .expect("drift is tolerated");
    assert_eq!(tracks.len(), 100);
    assert_eq!(server.calls_to(Method::Post, "/api/tracks").len(), 2);
}

#[test]
fn test_malformed_page_is_unexpected_response() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Get,
        "/api/artists",
        ok_json(json!({"artists": [], "total": 3})),
    );
    let results: Vec<_> = session.iter_artists("Aina", 50).expect("valid").collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(CslError::UnexpectedResponse { .. })));
}

#[test]
fn test_batched_collection_matches_sequential() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock_sequence(
        Method::Post,
        "/api/tracks",
        vec![
            track_page(0..50, 120),
            track_page(50..100, 120),
            track_page(100..120, 120),
        ],
    );
    let tracks = session
        .collect_tracks_batched(TrackSearch::new(""))
        .expect("collected");
    assert_eq!(tracks.len(), 120);
    let skips: Vec<_> = server
        .calls_to(Method::Post, "/api/tracks")
        .iter()
        .map(body_skip)
        .collect();
    assert_eq!(skips, vec![Some(0), Some(50), Some(100)]);
}

#[test]
fn test_blue_sky_character_edit_sends_only_missing_entry() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let target = track("t1");
    server.mock(
        Method::Get,
        "/api/track/t1/metadata",
        ok_json(fixtures::metadata_json(
            &[],
            &[("m1", 2, "Character", "Chika Takami")],
            &["Character"],
        )),
    );
    let post = server.mock(
        Method::Post,
        "/api/track/t1/metadata",
        ApiResponse::new(200, ""),
    );

    let existing = session.get_metadata(&target).expect("metadata");
    let queued = session
        .track_add_metadata(
            &target,
            vec![
                ExtraMetadataEntry::artist("Character", "Chika Takami").into(),
                ExtraMetadataEntry::artist("Character", "You Watanabe").into(),
            ],
            None,
            existing.as_ref(),
            RunMode::Queue,
        )
        .expect("queued");
    assert!(queued);
    assert_eq!(server.hits(post), 0);

    let report = session.commit(true).expect("commit");
    assert_eq!(report.applied, 1);
    assert!(report.is_clean());
    assert!(session.queue().is_empty());
    let body = server.calls_to(Method::Post, "/api/track/t1/metadata")[0]
        .json_body()
        .cloned()
        .expect("json body");
    assert_eq!(
        body["extraMetadatas"],
        json!([{"isArtist": true, "type": "Character", "value": "You Watanabe"}])
    );
}

#[test]
fn test_no_op_edit_is_never_queued() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let existing = Metadata::from_json(&fixtures::metadata_json(
        &[],
        &[("m1", 2, "Character", "Chika Takami")],
        &["Character"],
    ))
    .expect("metadata");
    let sent = session
        .track_add_metadata(
            &track("t1"),
            vec![ExtraMetadataEntry::artist("Character", "Chika Takami").into()],
            None,
            Some(&existing),
            RunMode::Queue,
        )
        .expect("no-op");
    assert!(!sent);
    assert!(session.queue().is_empty());
    assert!(!session
        .track_edit(&track("t1"), TrackChanges::new(), RunMode::Immediate)
        .expect("no-op"));
}

fn queue_three(session: &mut Session<crate::testing::MockTransport>) {
    session
        .track_add_metadata(
            &track("t1"),
            vec![ExtraMetadataEntry::song("Game", "Sunshine").into()],
            None,
            None,
            RunMode::Queue,
        )
        .expect("queue add");
    session
        .track_edit(
            &track("t2"),
            TrackChanges::new().track_type(TrackType::OffVocal),
            RunMode::Queue,
        )
        .expect("queue edit");
    let extra = Metadata::from_json(&fixtures::metadata_json(
        &[],
        &[("m3", 1, "Game", "Old")],
        &["Game"],
    ))
    .expect("metadata")
    .extra_metas
    .remove(0);
    session
        .track_remove_metadata(&track("t3"), extra, RunMode::Queue)
        .expect("queue remove");
}

#[test]
fn test_commit_stops_and_keeps_failed_tail() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Post,
        "/api/track/t1/metadata",
        ApiResponse::new(200, ""),
    );
    server.mock(Method::Put, "/api/track/t2", ApiResponse::new(500, "boom"));
    let delete = server.mock(
        Method::Delete,
        "/api/track/t3/metadata/m3",
        ApiResponse::new(200, ""),
    );
    queue_three(&mut session);

    let error = session.commit(true).expect_err("second change fails");
    let CslError::CommitAborted { index, source, .. } = error else {
        panic!("expected aborted commit");
    };
    assert_eq!(index, 1);
    assert!(matches!(
        *source,
        CslError::Http(HttpError::Status { status: 500, .. })
    ));
    assert_eq!(session.queue().len(), 2);
    assert_eq!(server.hits(delete), 0);

    server.mock(Method::Put, "/api/track/t2", ApiResponse::new(200, ""));
    let report = session.commit(true).expect("retry succeeds");
    assert_eq!(report.applied, 2);
    assert_eq!(server.hits(delete), 1);
}

#[test]
fn test_commit_without_stop_attempts_everything() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.fail_network(Method::Post, "/api/track/t1/metadata");
    server.mock(Method::Put, "/api/track/t2", ApiResponse::new(200, ""));
    server.mock(
        Method::Delete,
        "/api/track/t3/metadata/m3",
        ApiResponse::new(500, ""),
    );
    queue_three(&mut session);

    let report = session.commit(false).expect("report");
    assert_eq!(report.applied, 1);
    let failed: Vec<_> = report.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![0, 2]);
    assert!(matches!(
        report.failures[0].error,
        CslError::Http(HttpError::Transport { .. })
    ));
    assert!(session.queue().is_empty());
}

#[test]
fn test_middle_failure_still_applies_neighbours() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let add = server.mock(
        Method::Post,
        "/api/track/t1/metadata",
        ApiResponse::new(200, ""),
    );
    server.mock(Method::Put, "/api/track/t2", ApiResponse::new(500, "boom"));
    let delete = server.mock(
        Method::Delete,
        "/api/track/t3/metadata/m3",
        ApiResponse::new(200, ""),
    );
    queue_three(&mut session);

    let report = session.commit(false).expect("report");
    assert_eq!(report.applied, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(server.hits(add), 1);
    assert_eq!(server.hits(delete), 1);
}

#[test]
fn test_discard_and_clear_queue() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    queue_three(&mut session);
    let discarded = session.discard(1).expect("exists");
    assert_eq!(discarded.summary().action, "Edit track");
    assert!(session.discard(5).is_none());
    assert_eq!(session.queue().len(), 2);
    session.clear_queue();
    assert!(session.queue().is_empty());
    let before = server.call_count();
    let report = session.commit(true).expect("empty commit");
    assert_eq!(report.applied, 0);
    assert_eq!(server.call_count(), before);
}

#[test]
fn test_audio_upload_keeps_cookie_off_presigned_host() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Post,
        "/api/track/t1/presigned-upload",
        ok_json(json!({"sessionId": "s-1", "key": "k-1", "url": "https://upload.example/put"})),
    );
    server.mock(
        Method::Post,
        "https://upload.example/put",
        ApiResponse::new(200, ""),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("song.flac");
    std::fs::write(&path, [7u8; 4]).expect("write");

    session
        .add_audio(&track("t1"), &path, RunMode::Immediate)
        .expect("uploaded");
    let presign = &server.calls_to(Method::Post, "/api/track/t1/presigned-upload")[0];
    assert!(presign.headers.iter().any(|(key, _)| key == "Cookie"));
    let upload = &server.calls_to(Method::Post, "https://upload.example/put")[0];
    assert!(upload.headers.iter().all(|(key, _)| key != "Cookie"));
}

#[test]
fn test_immediate_edit_propagates_status_error() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(Method::Put, "/api/track/t2", ApiResponse::new(500, "boom"));
    let error = session
        .track_edit(
            &track("t2"),
            TrackChanges::new().track_type(TrackType::OffVocal),
            RunMode::Immediate,
        )
        .expect_err("server error reaches the caller");
    assert!(matches!(
        error,
        CslError::Http(HttpError::Status { status: 500, .. })
    ));
    assert!(session.queue().is_empty());
}

#[test]
fn test_failed_presign_never_uploads() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    server.mock(
        Method::Post,
        "/api/track/t1/presigned-upload",
        ApiResponse::new(500, "storage offline"),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("song.mp3");
    std::fs::write(&path, [1u8; 4]).expect("write");

    let error = session
        .add_audio(&track("t1"), &path, RunMode::Immediate)
        .expect_err("presign fails");
    assert!(matches!(
        error,
        CslError::Http(HttpError::Status { status: 500, .. })
    ));
    assert_eq!(
        server
            .calls_to(Method::Post, "/api/track/t1/presigned-upload")
            .len(),
        1
    );
    assert!(server.calls_to(Method::Post, "https://").is_empty());
}

#[test]
fn test_invalid_audio_sends_nothing() {
    let server = MockServer::new();
    let (mut session, _dir) = admin_session(&server);
    let before = server.call_count();
    let error = session
        .add_audio(
            &track("t1"),
            std::path::Path::new("/definitely/missing.mp3"),
            RunMode::Queue,
        )
        .expect_err("missing file");
    assert!(matches!(error, CslError::InvalidAudioFile { .. }));
    assert!(session.queue().is_empty());
    assert_eq!(server.call_count(), before);
}
