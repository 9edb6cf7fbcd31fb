//! POST /chat.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::handle_chat;
use crate::web::error::json_body;
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sender_wallet: Option<String>,
}

fn chat_failure(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "action": "none", "message": message }))).into_response()
}

/// Interpret a message and resolve the resulting intent.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(e) => return chat_failure(StatusCode::BAD_REQUEST, format!("Error: {}", e)),
    };
    if body.message.trim().is_empty() {
        return chat_failure(
            StatusCode::BAD_REQUEST,
            "No se envió ningún mensaje.".to_string(),
        );
    }

    let Some(interpreter) = state.interpreter.as_ref() else {
        return chat_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error: LLM no configurado".to_string(),
        );
    };

    match handle_chat(
        interpreter,
        &state.resolver,
        &body.message,
        body.sender_wallet.as_deref(),
    )
    .await
    {
        Ok(intent) => Json(intent).into_response(),
        Err(e) => {
            tracing::error!("Chat failed: {}", e);
            chat_failure(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e))
        }
    }
}
