mod error;
mod state;
mod util;

pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use state::{AppState, ClientEvent, ServerEvent};

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth routes
        .route("/api/auth/signup", post(routes::auth::signup))
        .route("/api/auth/signin", post(routes::auth::signin))
        .route("/api/auth/refresh-token", post(routes::auth::refresh_token))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/me", get(routes::auth::me))
        // Room routes
        .route(
            "/api/rooms",
            get(routes::rooms::list_rooms).post(routes::rooms::create_room),
        )
        .route("/api/rooms/public", get(routes::rooms::list_public_rooms))
        .route("/api/rooms/:room_id", get(routes::rooms::get_room))
        .route("/api/rooms/:room_id/join", post(routes::rooms::join_room))
        .route(
            "/api/rooms/:room_id/members",
            post(routes::rooms::add_member),
        )
        .route(
            "/api/rooms/:room_id/members/:user_id",
            delete(routes::rooms::remove_member),
        )
        // Message routes
        .route(
            "/api/rooms/:room_id/messages",
            get(routes::messages::list_messages).post(routes::messages::post_message),
        )
        .route(
            "/api/rooms/:room_id/messages/recent",
            get(routes::messages::list_recent_messages),
        )
        .route(
            "/api/rooms/:room_id/messages/search",
            get(routes::messages::search_messages),
        )
        // WebSocket route
        .route("/ws", get(routes::websocket::websocket_handler))
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
