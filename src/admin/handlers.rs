use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use crate::http::server::AppState;

pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.registry.reset(&name) {
        tracing::info!(breaker = %name, "Circuit breaker reset by operator");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn reset_all(State(state): State<AppState>) -> StatusCode {
    state.registry.reset_all();
    tracing::info!(breakers = state.registry.len(), "All circuit breakers reset by operator");
    StatusCode::NO_CONTENT
}

pub async fn open_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StatusCode {
    match state.registry.get(&name) {
        Some(breaker) => {
            breaker.force_open();
            tracing::warn!(breaker = %name, "Circuit breaker forced open by operator");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
