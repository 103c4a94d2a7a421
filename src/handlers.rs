use crate::{
    errors::AppError,
    models::{MediaDraft, MediaItem, MediaType, MemberDraft, MemberView, SnapshotView},
    store::StoreStats,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing;

#[derive(Deserialize, Debug, Default)]
pub struct MediaQuery {
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
) -> Json<Vec<MediaItem>> {
    let catalog = state.store.catalog();
    let items = match query.media_type {
        Some(MediaType::Photo) => catalog.photos().await,
        Some(MediaType::Video) => catalog.videos().await,
        None => catalog.list().await,
    };
    tracing::debug!(count = items.len(), filter = ?query.media_type, "Listing media items");
    Json(items)
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MediaItem>, AppError> {
    state
        .store
        .catalog()
        .get(&id)
        .await
        .map(Json)
        .ok_or(AppError::MediaNotFound(id))
}

pub async fn create_media(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<MediaDraft>,
) -> Result<impl IntoResponse, AppError> {
    require("cover_url", &draft.cover_url)?;
    require("description", &draft.description)?;

    let item = state.store.catalog().insert(draft).await;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.catalog().remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::MediaNotFound(id))
    }
}

pub async fn list_members(State(state): State<Arc<AppState>>) -> Json<Vec<MemberView>> {
    let members = state.store.directory().list().await;
    Json(members.into_iter().map(MemberView::from).collect())
}

pub async fn create_member(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<MemberDraft>,
) -> Result<impl IntoResponse, AppError> {
    require("username", &draft.username)?;
    require("password_hash", &draft.password_hash)?;

    let member = state.store.directory().insert(draft).await;
    Ok((StatusCode::CREATED, Json(MemberView::from(member))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<MemberView>, AppError> {
    state
        .store
        .directory()
        .authenticate(&request.username, &request.password)
        .await
        .map(|member| Json(MemberView::from(member)))
        .ok_or(AppError::InvalidCredentials)
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
    Json(state.store.stats().await)
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
    state.store.reload().await;
    Json(state.store.stats().await)
}

/// Whole snapshot in its stored layout, minus member credentials.
pub async fn export_database(State(state): State<Arc<AppState>>) -> Json<SnapshotView> {
    Json(SnapshotView::from(state.store.snapshot().await))
}
