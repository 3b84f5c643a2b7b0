use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::ArcShared;

mod api;

async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, "pong")
}

pub fn routes(state: &ArcShared) -> Router {
    Router::new()
        .nest("/api", api::routes())
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}
