pub mod handlers;
pub mod auth;

use axum::{
    routing::post,
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::admin_auth_middleware;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/circuit-breakers/reset", post(reset_all))
        .route("/admin/circuit-breakers/{name}/reset", post(reset_breaker))
        .route("/admin/circuit-breakers/{name}/open", post(open_breaker))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
