use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use backchannel_chats::{MessageOrder, MessageView, PostMessage, DEFAULT_MESSAGE_PAGE_SIZE};
use backchannel_database::{Page, PageRequest};
use serde::{Deserialize, Serialize};

use crate::{routes::rooms::PageQuery, util::require_user, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: MessageView,
}

/// Full history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let page = state
        .messages()
        .list_messages(&room_id, user.user_id, MessageOrder::Ascending, None)
        .await?;
    Ok(Json(MessagesResponse {
        messages: page.items,
    }))
}

pub async fn list_recent_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<MessageView>>, ApiError> {
    let user = require_user(&state, &headers)?;
    let request = PageRequest::from_parts(query.page, query.size, DEFAULT_MESSAGE_PAGE_SIZE);
    let page = state
        .messages()
        .list_messages(&room_id, user.user_id, MessageOrder::Descending, Some(request))
        .await?;
    Ok(Json(page))
}

pub async fn search_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<MessageView>>, ApiError> {
    let user = require_user(&state, &headers)?;
    let request = PageRequest::from_parts(query.page, query.size, DEFAULT_MESSAGE_PAGE_SIZE);
    let page = state
        .messages()
        .search_messages(&room_id, user.user_id, &query.q, request)
        .await?;
    Ok(Json(page))
}

pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Json(payload): Json<PostMessage>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = require_user(&state, &headers)?;
    let message = state
        .messages()
        .post_message(&room_id, user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}
