// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tally_client::HttpPlayerService;
use tally_dry_tests::{sid, RecordingSink};
use tally_sync::{
    lock, refresh_once, shared, CreateAck, MutationManager, MutationOutcome, RemoteError, RemotePlayerService,
    SnapshotStore, StatField, TempIdAllocator,
};

const TOKEN: &str = "hunter2";

#[derive(Default)]
struct ApiState {
    players: Vec<Value>,
    requests: Vec<(&'static str, Value)>,
    created: u64,
    echo_created: bool,
    fail_list: bool,
    garbage_list: bool,
}

#[derive(Clone, Default)]
struct Api(Arc<Mutex<ApiState>>);

impl Api {
    fn with_players(players: Vec<Value>) -> Self {
        let api = Self::default();
        api.state().players = players;
        api
    }

    fn state(&self) -> MutexGuard<'_, ApiState> {
        self.0.lock().unwrap()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn roster(state: &ApiState) -> Response {
    Json(Value::Array(state.players.clone())).into_response()
}

fn find<'a>(state: &'a mut ApiState, id: &str) -> Option<&'a mut Value> {
    state.players.iter_mut().find(|p| p["_id"] == id)
}

async fn list(State(api): State<Api>) -> Response {
    let state = api.state();
    if state.fail_list {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch leaderboard data");
    }
    if state.garbage_list {
        return Json(json!({ "unexpected": true })).into_response();
    }
    roster(&state)
}

async fn update(State(api): State<Api>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let mut state = api.state();
    state.requests.push(("POST", body.clone()));
    let id = body["playerId"].as_str().unwrap_or_default();
    if let Some(p) = find(&mut state, id) {
        p["balance"] = body["newBalance"].clone();
    }
    roster(&state)
}

async fn create(State(api): State<Api>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    if name.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Missing player name");
    }
    let mut state = api.state();
    state.requests.push(("PUT", body));
    state.created += 1;
    let record = json!({
        "_id": format!("srv-{}", state.created),
        "name": name,
        "balance": 10,
        "wins": 0,
        "losses": 0,
    });
    state.players.push(record.clone());
    if state.echo_created {
        Json(record).into_response()
    } else {
        roster(&state)
    }
}

async fn adjust(State(api): State<Api>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let key = match body["type"].as_str() {
        Some("win") => "wins",
        Some("loss") => "losses",
        _ => return error(StatusCode::BAD_REQUEST, "Invalid type"),
    };
    let mut state = api.state();
    state.requests.push(("PATCH", body.clone()));
    let id = body["playerId"].as_str().unwrap_or_default();
    if let Some(p) = find(&mut state, id) {
        let next = p[key].as_i64().unwrap_or(0) + body["delta"].as_i64().unwrap_or(0);
        p[key] = json!(next);
    }
    roster(&state)
}

async fn remove(State(api): State<Api>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let Some(id) = q.get("id") else {
        return error(StatusCode::BAD_REQUEST, "Missing player id");
    };
    let mut state = api.state();
    state.requests.push(("DELETE", json!({ "id": id })));
    state.players.retain(|p| p["_id"] != id.as_str());
    roster(&state)
}

async fn serve(api: Api) -> String {
    let app = Router::new()
        .route("/api/leaderboard", get(list).post(update).put(create).patch(adjust).delete(remove))
        .with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn ada() -> Value {
    json!({ "_id": "a", "name": "Ada", "balance": 5 })
}

#[tokio::test]
async fn list_needs_no_token_and_accepts_underscore_ids() {
    let api = Api::with_players(vec![ada()]);
    let remote = HttpPlayerService::new(&serve(api).await).unwrap();

    let players = remote.list().await.unwrap();

    assert_eq!(players.len(), 1);
    assert_eq!(players[0].id, sid("a"));
    assert_eq!(players[0].balance, 5.0);
    assert_eq!(players[0].wins, 0);
}

#[tokio::test]
async fn mutations_send_api_bodies_with_the_bearer_token() {
    let api = Api::with_players(vec![ada()]);
    let remote = HttpPlayerService::new(&serve(api.clone()).await).unwrap().with_token(TOKEN);
    let a = sid("a");

    remote.update_balance(&a, 12.5).await.unwrap();
    remote.adjust_stat(&a, StatField::Wins, 1).await.unwrap();
    assert_eq!(api.state().players[0]["balance"], json!(12.5));
    assert_eq!(api.state().players[0]["wins"], json!(1));

    remote.delete(&a).await.unwrap();
    assert!(api.state().players.is_empty());

    let requests = api.state().requests.clone();
    assert_eq!(
        requests,
        vec![
            ("POST", json!({ "playerId": "a", "newBalance": 12.5 })),
            ("PATCH", json!({ "playerId": "a", "type": "win", "delta": 1 })),
            ("DELETE", json!({ "id": "a" })),
        ]
    );
}

#[tokio::test]
async fn missing_or_wrong_token_is_unauthorized() {
    let api = Api::with_players(vec![ada()]);
    let base = serve(api.clone()).await;
    let anonymous = HttpPlayerService::new(&base).unwrap();
    let wrong = HttpPlayerService::new(&base).unwrap().with_token("nope");

    assert_eq!(anonymous.update_balance(&sid("a"), 1.0).await, Err(RemoteError::Unauthorized));
    assert_eq!(wrong.delete(&sid("a")).await, Err(RemoteError::Unauthorized));
    assert_eq!(api.state().players.len(), 1);
    assert!(api.state().requests.is_empty());
}

#[tokio::test]
async fn create_sends_correlation_and_reads_either_answer() {
    let api = Api::with_players(vec![ada()]);
    let remote = HttpPlayerService::new(&serve(api.clone()).await).unwrap().with_token(TOKEN);
    let ids = TempIdAllocator::new();

    let ack = remote.create("Dee", ids.allocate()).await.unwrap();
    let CreateAck::Roster(players) = ack else {
        panic!("expected the roster");
    };
    assert_eq!(players.len(), 2);
    assert_eq!(api.state().requests[0].1["correlationId"], json!("temp-player-0"));

    api.state().echo_created = true;
    let ack = remote.create("Eve", ids.allocate()).await.unwrap();
    assert!(matches!(ack, CreateAck::Echoed(p) if p.id == sid("srv-2") && p.balance == 10.0));
}

#[tokio::test]
async fn verify_token_distinguishes_good_and_bad_tokens() {
    let base = serve(Api::default()).await;

    let good = HttpPlayerService::new(&base).unwrap().with_token(TOKEN);
    let bad = HttpPlayerService::new(&base).unwrap().with_token("guess");

    assert_eq!(good.verify_token().await, Ok(true));
    assert_eq!(bad.verify_token().await, Ok(false));
}

#[tokio::test]
async fn server_errors_carry_the_message() {
    let api = Api::default();
    api.state().fail_list = true;
    let remote = HttpPlayerService::new(&serve(api).await).unwrap();

    assert_eq!(
        remote.list().await,
        Err(RemoteError::Status {
            status: 500,
            message: "Failed to fetch leaderboard data".into()
        })
    );
}

#[tokio::test]
async fn malformed_bodies_are_decode_errors() {
    let api = Api::default();
    api.state().garbage_list = true;
    let remote = HttpPlayerService::new(&serve(api).await).unwrap();

    assert!(matches!(remote.list().await, Err(RemoteError::Decode(_))));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let remote = HttpPlayerService::new(&format!("http://{addr}")).unwrap();

    assert!(matches!(remote.list().await, Err(RemoteError::Transport(_))));
}

#[tokio::test]
async fn optimistic_create_reconciles_against_the_real_roster() {
    let api = Api::with_players(vec![json!({ "_id": "a", "name": "Ada", "balance": 30 })]);
    let remote = Arc::new(HttpPlayerService::new(&serve(api).await).unwrap().with_token(TOKEN));
    let store = shared(SnapshotStore::default());
    refresh_once(&store, remote.as_ref()).await.unwrap();

    let sink = RecordingSink::new();
    let manager = MutationManager::new(Arc::clone(&store), remote.clone(), sink.clone(), TempIdAllocator::new());
    let out = manager.create_optimistic("Dee").await;

    assert_eq!(out, MutationOutcome::Confirmed { id: sid("srv-1") });
    assert_eq!(lock(&store).current().position(&sid("srv-1")), Some(1));
    assert_eq!(sink.len(), 1);

    refresh_once(&store, remote.as_ref()).await.unwrap();
    let names: Vec<_> = lock(&store).current().iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec!["Ada", "Dee"]);
}
