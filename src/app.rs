use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{health, users};
use crate::state::AppState;

pub fn create_app(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/user", users::router())
        .layer(cors)
        .with_state(state)
}
