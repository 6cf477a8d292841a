use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use coedit_core::lock::validate_resource_id;
use coedit_core::protocol::{ClientMessage, ServerMessage};
use coedit_locks::{CursorUpdate, PositionOutcome};
use futures::{SinkExt, StreamExt};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/ws?token=
///
/// Upgrade an authenticated request to a WebSocket. After the upgrade the
/// connection is registered with `WsManager` and served by a sender task
/// plus the receive loop below.
pub async fn ws_handler(
    auth: AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound client messages on the current task.
///   4. On disconnect, leaves every room and drops the user's cursors there.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user.user_id, "WebSocket connected");

    let mut rx = state
        .ws_manager
        .add(conn_id.clone(), Some(user.user_id.clone()))
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text(&state, &conn_id, &user, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                reply(
                    &state,
                    &conn_id,
                    ServerMessage::error("BAD_MESSAGE", "Binary frames are not supported"),
                )
                .await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    disconnect(&state, &conn_id, &user).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = %user.user_id, "WebSocket disconnected");
}

/// Parse and dispatch one text frame, replying with an `error` message on
/// failure.
pub async fn handle_text(state: &AppState, conn_id: &str, user: &AuthUser, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Unparseable client message");
            reply(
                state,
                conn_id,
                ServerMessage::error("BAD_MESSAGE", format!("Invalid message: {e}")),
            )
            .await;
            return;
        }
    };

    if let Err(err) = dispatch(state, conn_id, user, message).await {
        let code = match &err {
            AppError::Store(_) => "STORE_UNAVAILABLE",
            AppError::BadRequest(_) => "BAD_REQUEST",
            _ => "INTERNAL_ERROR",
        };
        if matches!(err, AppError::Store(_)) {
            tracing::error!(conn_id, error = %err, "WebSocket request failed");
        }
        reply(state, conn_id, ServerMessage::error(code, err.to_string())).await;
    }
}

async fn dispatch(
    state: &AppState,
    conn_id: &str,
    user: &AuthUser,
    message: ClientMessage,
) -> Result<(), AppError> {
    match message {
        ClientMessage::Subscribe { resource_id } => {
            validate_resource_id(&resource_id).map_err(AppError::BadRequest)?;
            if state.ws_manager.subscribe(conn_id, &resource_id).await {
                tracing::debug!(conn_id, resource_id = %resource_id, "Joined room");
            }
            send_status(state, conn_id, &resource_id).await
        }

        ClientMessage::Unsubscribe { resource_id } => {
            validate_resource_id(&resource_id).map_err(AppError::BadRequest)?;
            if state.ws_manager.unsubscribe(conn_id, &resource_id).await {
                tracing::debug!(conn_id, resource_id = %resource_id, "Left room");
                if !state
                    .ws_manager
                    .user_in_room(&resource_id, &user.user_id)
                    .await
                {
                    state.presence.remove_user(&resource_id, &user.user_id).await;
                }
            }
            Ok(())
        }

        ClientMessage::CursorMove {
            resource_id,
            position,
            color,
            expected_version,
        } => {
            validate_resource_id(&resource_id).map_err(AppError::BadRequest)?;
            let update = CursorUpdate {
                resource_id: resource_id.clone(),
                user_id: user.user_id.clone(),
                user_name: user.name.clone(),
                user_email: user.email.clone(),
                color,
                position,
            };
            match state.presence.update_position(conn_id, update).await {
                PositionOutcome::Accepted(_) => {}
                PositionOutcome::RateLimited { retry_after_ms } => {
                    tracing::trace!(conn_id, retry_after_ms, "Cursor update dropped");
                    return Ok(());
                }
            }

            // A stale cached version means the client missed a lock event.
            if let Some(expected) = expected_version {
                let status = state.lock_manager.status(&resource_id).await?;
                if status.is_stale(expected) {
                    send_status(state, conn_id, &resource_id).await?;
                }
            }
            Ok(())
        }

        ClientMessage::LockStatus { resource_id } => {
            validate_resource_id(&resource_id).map_err(AppError::BadRequest)?;
            send_status(state, conn_id, &resource_id).await
        }
    }
}

/// Send the current lock snapshot of `resource_id` to one connection.
async fn send_status(state: &AppState, conn_id: &str, resource_id: &str) -> Result<(), AppError> {
    let status = state.lock_manager.status(resource_id).await?;
    reply(
        state,
        conn_id,
        ServerMessage::LockStatus {
            resource_id: resource_id.to_string(),
            lock: status.lock,
            remaining_seconds: status.remaining_seconds,
        },
    )
    .await;
    Ok(())
}

async fn reply(state: &AppState, conn_id: &str, message: ServerMessage) {
    state.ws_manager.send_message(conn_id, &message).await;
}

/// Leave every room and drop this user's cursors where no other connection
/// of theirs remains.
async fn disconnect(state: &AppState, conn_id: &str, user: &AuthUser) {
    let rooms = state.ws_manager.remove(conn_id).await;
    for resource_id in rooms {
        if !state
            .ws_manager
            .user_in_room(&resource_id, &user.user_id)
            .await
        {
            state.presence.remove_user(&resource_id, &user.user_id).await;
        }
    }
    state.presence.forget_connection(conn_id).await;
}
