use super::*;
use crate::mapper::{derive_conference_id, StoreFailurePolicy, DEFAULT_TTL};
use crate::store::{MappingStore, MemoryMappingStore, StoreError};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn app_with(store: Arc<dyn MappingStore>, policy: StoreFailurePolicy) -> Router {
    let mapper = MappingService::new(store, DEFAULT_TTL, Duration::from_secs(1), policy);
    router(Arc::new(AppState { mapper }))
}

fn memory_app() -> (Arc<MemoryMappingStore>, Router) {
    let store = Arc::new(MemoryMappingStore::new());
    let app = app_with(store.clone(), StoreFailurePolicy::Explicit);
    (store, app)
}

async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, text) = get_text(app, uri).await;
    (status, serde_json::from_str(&text).unwrap())
}

fn no_input_body() -> Value {
    json!({
        "message": "No conference or id provided",
        "id": false,
        "conference": false,
    })
}

struct DownStore;

#[async_trait]
impl MappingStore for DownStore {
    async fn get(&self, _id: i64) -> Result<Option<String>, StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(5)))
    }
    async fn set(&self, _id: i64, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(5)))
    }
    async fn expire(&self, _id: i64, _ttl: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(5)))
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(5)))
    }
    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
    fn kind(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn conference_param_returns_derived_id() {
    let (_, app) = memory_app();
    let (status, body) = get_json(&app, "/conferenceMapper?conference=testroom").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Successfully retrieved conference mapping",
            "id": 611752,
            "conference": "testroom",
        })
    );
}

#[tokio::test]
async fn casing_does_not_change_id_but_is_echoed() {
    let (_, app) = memory_app();
    let (_, upper) = get_json(&app, "/conferenceMapper?conference=TestRoom").await;
    let (_, lower) = get_json(&app, "/conferenceMapper?conference=testroom").await;
    assert_eq!(upper["id"], lower["id"]);
    assert_eq!(upper["conference"], "TestRoom");
    assert_eq!(lower["conference"], "testroom");
}

#[tokio::test]
async fn repeated_registration_yields_same_id() {
    let (_, app) = memory_app();
    let (_, first) = get_json(&app, "/conferenceMapper?conference=consistencytest").await;
    let (_, second) = get_json(&app, "/conferenceMapper?conference=consistencytest").await;
    assert_eq!(first["id"], 767792);
    assert_eq!(first["id"], second["id"]);
}

#[tokio::test]
async fn id_lookup_returns_stored_name() {
    let (_, app) = memory_app();
    let (_, created) = get_json(&app, "/conferenceMapper?conference=MyRoom").await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = get_json(&app, &format!("/conferenceMapper?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Successfully retrieved conference mapping",
            "id": id,
            "conference": "myroom",
        })
    );
}

#[tokio::test]
async fn unknown_id_reports_missing_mapping() {
    let (_, app) = memory_app();
    let (status, body) = get_json(&app, "/conferenceMapper?id=999999").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "No conference mapping was found",
            "id": 999999,
            "conference": false,
        })
    );
}

#[tokio::test]
async fn unusable_params_report_no_input() {
    let (_, app) = memory_app();
    for uri in [
        "/conferenceMapper",
        "/conferenceMapper?id=invalid",
        "/conferenceMapper?conference=",
        "/conferenceMapper?id=&conference=",
        "/conferenceMapper?id=0",
    ] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, no_input_body(), "{uri}");
    }
}

#[tokio::test]
async fn special_characters_are_encoded_except_slash_and_at() {
    let (store, app) = memory_app();
    let (_, body) = get_json(&app, "/conferenceMapper?conference=Test%20Room%40conference").await;
    assert_eq!(body["conference"], "Test Room@conference");

    let id = body["id"].as_i64().unwrap();
    assert_eq!(id, i64::from(derive_conference_id("test room@conference")));
    assert_eq!(store.raw_value(id).as_deref(), Some("test%20room@conference"));
}

#[tokio::test]
async fn composite_names_round_trip_through_storage() {
    let (store, app) = memory_app();
    let (_, created) = get_json(&app, "/conferenceMapper?conference=room%40conference%2Ftest").await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(id, 961070);
    assert_eq!(store.raw_value(id).as_deref(), Some("room@conference/test"));

    let (_, fetched) = get_json(&app, &format!("/conferenceMapper?id={id}")).await;
    assert_eq!(fetched["conference"], "room@conference/test");
}

#[tokio::test]
async fn explicit_policy_surfaces_store_outage() {
    let app = app_with(Arc::new(DownStore), StoreFailurePolicy::Explicit);

    let (status, body) = get_json(&app, "/conferenceMapper?conference=testroom").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({
            "message": "Conference mapping store unavailable",
            "id": 611752,
            "conference": false,
        })
    );

    let (status, _) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn fallthrough_policy_matches_legacy_responses() {
    let app = app_with(Arc::new(DownStore), StoreFailurePolicy::Fallthrough);

    let (status, body) = get_json(&app, "/conferenceMapper?conference=testroom").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, no_input_body());

    let (status, body) = get_json(&app, "/conferenceMapper?id=12").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No conference mapping was found");
    assert_eq!(body["id"], 12);
}

#[tokio::test]
async fn health_reports_ok_for_reachable_store() {
    let (_, app) = memory_app();
    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn oversized_id_is_echoed_as_a_missing_mapping() {
    let (_, app) = memory_app();
    let (status, text) =
        get_text(&app, "/conferenceMapper?id=99999999999999999999&conference=lobby").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("\"message\":\"No conference mapping was found\""), "{text}");
    assert!(text.contains("\"id\":99999999999999999999"), "{text}");
    assert!(text.contains("\"conference\":false"), "{text}");
}

#[tokio::test]
async fn repeated_conference_keeps_first_value() {
    let (_, app) = memory_app();
    let (status, body) = get_json(&app, "/conferenceMapper?conference=a&conference=b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conference"], "a");
    assert_eq!(body["id"], i64::from(derive_conference_id("a")));
}

#[tokio::test]
async fn repeated_id_keeps_first_value() {
    let (_, app) = memory_app();
    let (status, body) = get_json(&app, "/conferenceMapper?id=1&id=x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "No conference mapping was found",
            "id": 1,
            "conference": false,
        })
    );

    let (status, body) = get_json(&app, "/conferenceMapper?id=x&id=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, no_input_body());
}
