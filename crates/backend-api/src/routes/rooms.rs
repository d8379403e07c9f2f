use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use backchannel_chats::{MembershipView, RoomView, DEFAULT_ROOM_PAGE_SIZE};
use backchannel_database::{Page, PageRequest, RoomVisibility};
use serde::{Deserialize, Serialize};

use crate::{util::require_user, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default = "default_visibility")]
    pub visibility: RoomVisibility,
}

fn default_visibility() -> RoomVisibility {
    RoomVisibility::Public
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMemberRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomView>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room: RoomView,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: MembershipView,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub member: MembershipView,
    pub joined: bool,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RoomsResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let rooms = state.rooms().list_rooms_for_user(user.user_id).await?;
    Ok(Json(RoomsResponse { rooms }))
}

pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let user = require_user(&state, &headers)?;
    let room = state
        .rooms()
        .create_room(&payload.name, payload.visibility, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(RoomResponse { room })))
}

pub async fn list_public_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<RoomView>>, ApiError> {
    require_user(&state, &headers)?;
    let request = PageRequest::from_parts(query.page, query.size, DEFAULT_ROOM_PAGE_SIZE);
    let page = state.rooms().list_public_rooms(request).await?;
    Ok(Json(page))
}

pub async fn get_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let room = state.rooms().get_room(&room_id, user.user_id).await?;
    Ok(Json(RoomResponse { room }))
}

/// Adds a member. Without a `user_id` the caller adds themselves.
pub async fn add_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    payload: Option<Json<AddMemberRequest>>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let user = require_user(&state, &headers)?;
    let target = payload
        .and_then(|Json(body)| body.user_id)
        .unwrap_or(user.user_id);

    let member = state
        .rooms()
        .add_member(&room_id, target, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(MemberResponse { member })))
}

pub async fn join_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<Json<JoinResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let outcome = state.rooms().join_public(&room_id, user.user_id).await?;
    Ok(Json(JoinResponse {
        member: outcome.membership,
        joined: outcome.newly_joined,
    }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((room_id, member_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let user = require_user(&state, &headers)?;
    state
        .rooms()
        .remove_member(&room_id, member_id, user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
