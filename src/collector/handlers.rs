use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::models::EventBatch;

use super::CollectorState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "logship-collector"
    }))
}

/// Accept one event batch.
///
/// The body is taken as a raw JSON value and converted by hand so that both
/// a wrong shape and a failed validation answer 400. Upload clients treat
/// 400 as "never retry", so nothing malformed may map to another status.
pub async fn receive_events(
    State(state): State<CollectorState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let batch: EventBatch = serde_json::from_value(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed event batch: {}", e)))?;

    if let Err(reason) = batch.validate() {
        tracing::warn!("Rejected event batch: {}", reason);
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Cannot accept event log, {}", reason),
        ));
    }

    tracing::debug!(
        "Accepted batch from {} with {} event(s)",
        batch.user,
        batch.events.len()
    );
    state
        .received
        .lock()
        .expect("collector lock poisoned")
        .push(batch);

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn list_received(State(state): State<CollectorState>) -> Json<Vec<EventBatch>> {
    Json(state.received())
}

pub async fn clear_received(State(state): State<CollectorState>) -> StatusCode {
    state
        .received
        .lock()
        .expect("collector lock poisoned")
        .clear();
    StatusCode::NO_CONTENT
}
