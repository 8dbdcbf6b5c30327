use crate::mapper::{MappingOutcome, MappingQuery, MappingService, RequestedId};
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[cfg(test)]
mod tests;

const MESSAGE_FOUND: &str = "Successfully retrieved conference mapping";
const MESSAGE_NOT_FOUND: &str = "No conference mapping was found";
const MESSAGE_NO_INPUT: &str = "No conference or id provided";
const MESSAGE_STORE_UNAVAILABLE: &str = "Conference mapping store unavailable";

#[derive(Clone)]
pub struct AppState {
    pub mapper: MappingService,
}

/// Response body. Absent fields serialize as `false`, which is what
/// existing clients check for.
#[derive(Debug, Serialize)]
struct MappingResponse {
    message: &'static str,
    #[serde(serialize_with = "value_or_false")]
    id: Option<ResponseId>,
    #[serde(serialize_with = "value_or_false")]
    conference: Option<String>,
}

/// IDs are always JSON numbers, including ones wider than `i64`.
#[derive(Debug)]
struct ResponseId(RequestedId);

impl Serialize for ResponseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            RequestedId::Key(id) => serializer.serialize_i64(*id),
            RequestedId::Oversized(decimal) => RawValue::from_string(decimal.clone())
                .map_err(<S::Error as serde::ser::Error>::custom)?
                .serialize(serializer),
        }
    }
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/conferenceMapper", get(conference_mapper))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn conference_mapper(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let outcome = state
        .mapper
        .resolve(MappingQuery {
            conference: first_param(&params, "conference"),
            id: first_param(&params, "id"),
        })
        .await;
    tracing::debug!(?outcome, "resolved conference mapping");

    let (status, body) = match outcome {
        MappingOutcome::Created { id, conference } | MappingOutcome::Found { id, conference } => (
            StatusCode::OK,
            MappingResponse {
                message: MESSAGE_FOUND,
                id: Some(ResponseId(RequestedId::Key(id))),
                conference: Some(conference),
            },
        ),
        MappingOutcome::NotFound { id } => (
            StatusCode::OK,
            MappingResponse {
                message: MESSAGE_NOT_FOUND,
                id: Some(ResponseId(id)),
                conference: None,
            },
        ),
        MappingOutcome::NoInput => (
            StatusCode::OK,
            MappingResponse {
                message: MESSAGE_NO_INPUT,
                id: None,
                conference: None,
            },
        ),
        MappingOutcome::StoreUnavailable { id } => (
            StatusCode::SERVICE_UNAVAILABLE,
            MappingResponse {
                message: MESSAGE_STORE_UNAVAILABLE,
                id: id.map(|id| ResponseId(RequestedId::Key(id))),
                conference: None,
            },
        ),
    };
    (status, Json(body))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.mapper.ping().await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(error) => {
            tracing::warn!(?error, "store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    ok: false,
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Repeated keys keep their first value.
fn first_param(params: &[(String, String)], key: &str) -> Option<String> {
    params
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

fn value_or_false<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}
