use axum::Router;

use crate::net::error::{self, ApiErrorKind};
use crate::state::ArcShared;

mod auth;

async fn not_found() -> error::Error {
    error::Error::api(ApiErrorKind::NotFound)
}

pub fn routes() -> Router<ArcShared> {
    Router::new()
        .nest("/auth", auth::routes())
        .fallback(not_found)
}
