use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{
    CountryParams, LoginRequest, NewUser, TimeIntervalParams, UserResponse, VideoMessage,
};
use crate::routes::auth::AuthUser;
use crate::services::job_registry::JobSummary;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user-exists/:username", get(user_exists))
        .route("/add-user", post(add_user))
        .route("/login", post(login))
        .route("/update-time-interval", post(update_time_interval))
        .route("/update-country", post(update_country))
        .route("/get-current-user", post(get_current_user))
        .route("/logout", get(logout))
        .route("/get-youtube-msg", get(get_youtube_msg))
        .route("/job-status", get(job_status))
}

pub async fn user_exists(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<bool>, AppError> {
    info!("GET /user-exists/{}", username);
    let exists = state.users.user_exists(&username).await?;
    Ok(Json(exists))
}

#[axum::debug_handler]
pub async fn add_user(
    State(state): State<AppState>,
    Json(data): Json<NewUser>,
) -> Result<Json<UserResponse>, AppError> {
    info!("POST /add-user - Registering {}", data.username);
    let user = state.users.add_user(data).await.map_err(|e| {
        error!("Failed to add user: {}", e);
        e
    })?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(data): Json<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    info!("POST /login - {}", data.username);
    let user = state.users.login(data).await?;
    Ok(Json(user))
}

pub async fn update_time_interval(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(params): Query<TimeIntervalParams>,
) -> Result<Json<UserResponse>, AppError> {
    info!("POST /update-time-interval - {} -> {} min", principal, params.time_interval);
    let user = state
        .users
        .update_time_interval(&principal, params.time_interval)
        .await
        .map_err(|e| {
            error!("Failed to update time interval for {}: {}", principal, e);
            e
        })?;
    Ok(Json(user))
}

pub async fn update_country(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(params): Query<CountryParams>,
) -> Result<Json<UserResponse>, AppError> {
    info!("POST /update-country - {} -> {}", principal, params.country);
    let user = state
        .users
        .update_country(&principal, &params.country)
        .await
        .map_err(|e| {
            error!("Failed to update country for {}: {}", principal, e);
            e
        })?;
    Ok(Json(user))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.current_user(&principal).await?;
    Ok(Json(user))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Json<Value> {
    info!("GET /logout - {}", principal);
    let stopped = state.users.logout(&principal);
    Json(json!({ "loggedOut": true, "jobStopped": stopped }))
}

/// `null` until the user's job has completed a fetch.
pub async fn get_youtube_msg(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Json<Option<VideoMessage>> {
    Json(state.users.video_message(&principal))
}

pub async fn job_status(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Json<Option<JobSummary>> {
    Json(state.users.job_status(&principal))
}
