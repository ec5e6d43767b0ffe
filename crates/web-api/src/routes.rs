use application::SendMessageRequest;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use domain::{Message, MessageId, Username};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    username: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    online_users: usize,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/messages", get(get_history).post(send_message))
        .route("/messages/{id}", delete(delete_message))
        .route("/online-users", get(online_users))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let online_users = state.session.registry.online_usernames().await.len();
    Json(HealthResponse {
        status: "ok",
        online_users,
    })
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query.limit.unwrap_or(state.history_limit);
    let messages = state.session.messages.recent_messages(limit).await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state
        .session
        .messages
        .send_message(SendMessageRequest {
            username: payload.username,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let success = state.session.messages.delete_message(MessageId(id)).await?;
    Ok(Json(DeleteResponse { success }))
}

async fn online_users(State(state): State<AppState>) -> Json<Vec<Username>> {
    Json(state.session.registry.online_usernames().await)
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state.session).run())
}
