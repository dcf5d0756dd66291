//! Download client integration tests against fake qBittorrent, Transmission
//! and SABnzbd servers.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{hash_of, serve, CallLog};
use mediarr_core::config::{QBittorrentConfig, SabnzbdConfig, TransmissionConfig};
use mediarr_core::download_client::{
    DownloadClient, DownloadClientError, QBittorrentClient, SabnzbdClient, TransmissionClient,
};
use mediarr_core::hash::HashResolver;
use mediarr_core::library::DownloadStatus;
use mediarr_core::CandidateRelease;

fn resolver(dir: &TempDir) -> Arc<HashResolver> {
    Arc::new(HashResolver::new(dir.path(), Duration::from_secs(5)))
}

fn magnet_candidate(title: &str, hash: char) -> CandidateRelease {
    CandidateRelease::torrent(title, format!("magnet:?xt=urn:btih:{}", hash_of(hash)), 10)
}

// =============================================================================
// qBittorrent
// =============================================================================

type SharedState = Arc<Mutex<String>>;

fn fake_qbittorrent(log: CallLog, state: SharedState, login_answer: &'static str) -> Router {
    let l = log.clone();
    let login = post(move || {
        let log = l.clone();
        async move {
            log.record("login");
            login_answer
        }
    });

    let l = log.clone();
    let logout = post(move || {
        let log = l.clone();
        async move {
            log.record("logout");
            StatusCode::OK
        }
    });

    let l = log.clone();
    let create_category = post(move || {
        let log = l.clone();
        async move {
            log.record("createCategory");
            StatusCode::CONFLICT
        }
    });

    let l = log.clone();
    let edit_category = post(move || {
        let log = l.clone();
        async move {
            log.record("editCategory");
            StatusCode::OK
        }
    });

    let l = log.clone();
    let add = post(move |Form(form): Form<HashMap<String, String>>| {
        let log = l.clone();
        async move {
            log.record(format!(
                "add category={} savepath={}",
                form.get("category").cloned().unwrap_or_default(),
                form.get("savepath").cloned().unwrap_or_default(),
            ));
            "Ok."
        }
    });

    let info = get(move || {
        let state = state.lock().unwrap().clone();
        async move { Json(json!([{ "hash": hash_of('a'), "state": state }])) }
    });

    let l = log.clone();
    let stop = post(move || {
        let log = l.clone();
        async move {
            log.record("stop");
            StatusCode::OK
        }
    });

    let l = log.clone();
    let resume = post(move || {
        let log = l.clone();
        async move {
            log.record("resume");
            StatusCode::OK
        }
    });

    let l = log;
    let delete = post(move |Form(form): Form<HashMap<String, String>>| {
        let log = l.clone();
        async move {
            log.record(format!(
                "delete deleteFiles={}",
                form.get("deleteFiles").cloned().unwrap_or_default()
            ));
            StatusCode::OK
        }
    });

    // No /pause route: the client has to fall back to /stop.
    Router::new()
        .route("/api/v2/auth/login", login)
        .route("/api/v2/auth/logout", logout)
        .route("/api/v2/torrents/createCategory", create_category)
        .route("/api/v2/torrents/editCategory", edit_category)
        .route("/api/v2/torrents/add", add)
        .route("/api/v2/torrents/info", info)
        .route("/api/v2/torrents/stop", stop)
        .route("/api/v2/torrents/resume", resume)
        .route("/api/v2/torrents/delete", delete)
}

fn qbittorrent_config(url: String) -> QBittorrentConfig {
    QBittorrentConfig {
        enabled: true,
        url,
        username: "admin".to_string(),
        password: "adminadmin".to_string(),
        category_name: "mediarr".to_string(),
        category_save_path: String::new(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_qbittorrent_lifecycle() {
    let staging = TempDir::new().unwrap();
    let log = CallLog::default();
    let state: SharedState = Arc::new(Mutex::new("downloading".to_string()));
    let base = serve(fake_qbittorrent(log.clone(), Arc::clone(&state), "Ok.")).await;
    let client = QBittorrentClient::new(qbittorrent_config(base), resolver(&staging));

    client.check_connection().await.unwrap();
    assert_eq!(
        log.calls(),
        vec!["login", "createCategory", "editCategory", "logout"]
    );

    let download = client
        .submit(&magnet_candidate("Heat.1995.1080p", 'a'))
        .await
        .unwrap();
    assert_eq!(download.hash, hash_of('a'));
    assert_eq!(download.status, DownloadStatus::Downloading);
    assert!(!download.usenet);
    assert_eq!(log.count("createCategory"), 1, "category is created once");
    assert!(log
        .calls()
        .contains(&"add category=mediarr savepath=Heat.1995.1080p".to_string()));
    assert_eq!(log.count("login"), log.count("logout"));

    client.pause(&download).await.unwrap();
    assert_eq!(log.count("stop"), 1);

    client.resume(&download).await.unwrap();
    assert_eq!(log.count("resume"), 1);

    *state.lock().unwrap() = "stalledUP".to_string();
    assert_eq!(
        client.status(&download).await.unwrap(),
        DownloadStatus::Finished
    );

    client.remove(&download, true).await.unwrap();
    assert_eq!(log.count("delete deleteFiles=true"), 1);
    assert_eq!(log.count("login"), log.count("logout"));
}

#[tokio::test]
async fn test_qbittorrent_bad_credentials() {
    let staging = TempDir::new().unwrap();
    let log = CallLog::default();
    let state: SharedState = Arc::new(Mutex::new("downloading".to_string()));
    let base = serve(fake_qbittorrent(log.clone(), state, "Fails.")).await;
    let client = QBittorrentClient::new(qbittorrent_config(base), resolver(&staging));

    let err = client
        .submit(&magnet_candidate("Heat.1995.1080p", 'a'))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadClientError::AuthenticationFailed(_)));
    assert!(!log.calls().iter().any(|c| c.starts_with("add")));
}

#[tokio::test]
async fn test_qbittorrent_invalid_magnet_is_hash_error() {
    let staging = TempDir::new().unwrap();
    let log = CallLog::default();
    let state: SharedState = Arc::new(Mutex::new("downloading".to_string()));
    let base = serve(fake_qbittorrent(log.clone(), state, "Ok.")).await;
    let client = QBittorrentClient::new(qbittorrent_config(base), resolver(&staging));

    let candidate = CandidateRelease::torrent("Broken", "magnet:?dn=nohash", 10);
    let err = client.submit(&candidate).await.unwrap_err();

    assert!(matches!(err, DownloadClientError::HashResolution(_)));
    assert!(log.calls().is_empty());
}

// =============================================================================
// Transmission
// =============================================================================

const SESSION_ID: &str = "session-123";

fn fake_transmission(log: CallLog) -> Router {
    Router::new().route(
        "/transmission/rpc",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let log = log.clone();
            async move {
                let session = headers
                    .get("X-Transmission-Session-Id")
                    .and_then(|v| v.to_str().ok());
                if session != Some(SESSION_ID) {
                    return (StatusCode::CONFLICT, [("X-Transmission-Session-Id", SESSION_ID)])
                        .into_response();
                }

                let method = body["method"].as_str().unwrap_or_default().to_string();
                let arguments = &body["arguments"];
                let reply = match method.as_str() {
                    "torrent-add" => {
                        log.record(format!(
                            "torrent-add dir={}",
                            arguments["download-dir"].as_str().unwrap_or_default()
                        ));
                        json!({ "torrent-added": { "hashString": hash_of('c') } })
                    }
                    "torrent-get" => {
                        log.record("torrent-get");
                        json!({ "torrents": [
                            { "hashString": hash_of('c'), "status": 6, "error": 0, "errorString": "" }
                        ] })
                    }
                    "torrent-remove" => {
                        log.record(format!(
                            "torrent-remove delete={}",
                            arguments["delete-local-data"]
                        ));
                        json!({})
                    }
                    other => {
                        log.record(other.to_string());
                        json!({})
                    }
                };
                Json(json!({ "result": "success", "arguments": reply })).into_response()
            }
        }),
    )
}

#[tokio::test]
async fn test_transmission_negotiates_session_and_submits() {
    let staging = TempDir::new().unwrap();
    let downloads = TempDir::new().unwrap();
    let log = CallLog::default();
    let base = serve(fake_transmission(log.clone())).await;
    let client = TransmissionClient::new(
        TransmissionConfig {
            enabled: true,
            url: format!("{}/transmission/rpc", base),
            username: String::new(),
            password: String::new(),
            timeout_secs: 5,
        },
        downloads.path(),
        resolver(&staging),
    );

    client.check_connection().await.unwrap();
    let download = client
        .submit(&magnet_candidate("Some.Show.S01.720p", 'c'))
        .await
        .unwrap();

    assert_eq!(download.hash, hash_of('c'));
    assert_eq!(download.status, DownloadStatus::Finished);

    let expected_dir = downloads.path().join("Some.Show.S01.720p");
    assert_eq!(
        log.calls(),
        vec![
            "session-stats".to_string(),
            format!("torrent-add dir={}", expected_dir.display()),
            "torrent-get".to_string(),
        ]
    );

    client.pause(&download).await.unwrap();
    client.resume(&download).await.unwrap();
    client.remove(&download, true).await.unwrap();
    assert_eq!(
        &log.calls()[3..],
        &["torrent-stop", "torrent-start", "torrent-remove delete=true"]
    );
}

// =============================================================================
// SABnzbd
// =============================================================================

const NZO_ID: &str = "SABnzbd_nzo_1";

fn fake_sabnzbd(log: CallLog, completed: Arc<Mutex<bool>>) -> Router {
    Router::new().route(
        "/api",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let log = log.clone();
            let completed = *completed.lock().unwrap();
            async move {
                if params.get("apikey").map(String::as_str) != Some("secret")
                    || params.get("output").map(String::as_str) != Some("json")
                {
                    return StatusCode::FORBIDDEN.into_response();
                }
                let param = |key: &str| params.get(key).cloned().unwrap_or_default();

                let reply = match param("mode").as_str() {
                    "version" => json!({ "version": "4.3.0" }),
                    "addurl" if param("nzbname").contains("Broken") => {
                        json!({ "status": false, "error": "bad nzb" })
                    }
                    "addurl" => {
                        log.record(format!("addurl {}", param("nzbname")));
                        json!({ "status": true, "nzo_ids": [NZO_ID] })
                    }
                    "queue" if params.contains_key("name") => {
                        log.record(format!(
                            "queue {} {} {}",
                            param("name"),
                            param("value"),
                            param("del_files")
                        ));
                        json!({ "status": true })
                    }
                    "queue" if completed => json!({ "queue": { "slots": [] } }),
                    "queue" => json!({ "queue": { "slots": [
                        { "nzo_id": NZO_ID, "status": "Downloading" }
                    ] } }),
                    "history" => json!({ "history": { "slots": [
                        { "nzo_id": NZO_ID, "status": "Completed" }
                    ] } }),
                    _ => return StatusCode::BAD_REQUEST.into_response(),
                };
                Json(reply).into_response()
            }
        }),
    )
}

fn sabnzbd(url: String) -> SabnzbdClient {
    SabnzbdClient::new(SabnzbdConfig {
        enabled: true,
        url,
        api_key: "secret".to_string(),
        timeout_secs: 5,
    })
}

#[tokio::test]
async fn test_sabnzbd_lifecycle() {
    let log = CallLog::default();
    let completed = Arc::new(Mutex::new(false));
    let base = serve(fake_sabnzbd(log.clone(), Arc::clone(&completed))).await;
    let client = sabnzbd(base);

    client.check_connection().await.unwrap();

    let candidate = CandidateRelease::usenet("Heat.1995.1080p", "http://nzb.example/heat", 3600);
    let download = client.submit(&candidate).await.unwrap();
    assert_eq!(download.hash, NZO_ID);
    assert!(download.usenet);
    assert_eq!(download.status, DownloadStatus::Downloading);

    client.pause(&download).await.unwrap();
    *completed.lock().unwrap() = true;
    assert_eq!(
        client.status(&download).await.unwrap(),
        DownloadStatus::Finished
    );
    client.remove(&download, false).await.unwrap();

    assert_eq!(
        log.calls(),
        vec![
            "addurl Heat.1995.1080p".to_string(),
            format!("queue pause {} ", NZO_ID),
            format!("queue delete {} 0", NZO_ID),
        ]
    );
}

#[tokio::test]
async fn test_sabnzbd_rejected_nzb() {
    let base = serve(fake_sabnzbd(CallLog::default(), Arc::new(Mutex::new(false)))).await;

    let candidate = CandidateRelease::usenet("Broken.Release", "http://nzb.example/broken", 60);
    let err = sabnzbd(base).submit(&candidate).await.unwrap_err();

    assert!(matches!(err, DownloadClientError::Rejected(_)));
}

#[tokio::test]
async fn test_sabnzbd_wrong_api_key() {
    let base = serve(fake_sabnzbd(CallLog::default(), Arc::new(Mutex::new(false)))).await;
    let client = SabnzbdClient::new(SabnzbdConfig {
        enabled: true,
        url: base,
        api_key: "wrong".to_string(),
        timeout_secs: 5,
    });

    let err = client.check_connection().await.unwrap_err();
    assert!(matches!(err, DownloadClientError::ApiError(_)));
}
