//! User routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::store::NewUser;
use crate::web::error::{json_body, RecordError};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub wallet_address: String,
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, RecordError> {
    let users = state.datastore()?.list_users().await?;
    Ok(Json(json!({ "success": true, "count": users.len(), "users": users })))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), RecordError> {
    let body = json_body(payload)?;
    let store = state.datastore()?;
    let username = body.username.trim();
    if username.is_empty() || body.wallet_address.trim().is_empty() {
        return Err(ServiceError::validation("Se requieren username y wallet_address").into());
    }
    let wallet_address = state.address_format.normalize(&body.wallet_address)?;

    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            wallet_address,
        })
        .await?;
    tracing::info!("Registered user {} ({})", user.username, user.wallet_address);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user, "message": "Usuario creado exitosamente" })),
    ))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, RecordError> {
    let user = state
        .datastore()?
        .get_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Usuario no encontrado"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

/// GET /users/wallet/:wallet
pub async fn get_user_by_wallet(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>, RecordError> {
    let store = state.datastore()?;
    let wallet = state.address_format.normalize(&wallet)?;
    let user = store
        .find_user_by_wallet(&wallet)
        .await?
        .ok_or_else(|| ServiceError::not_found("Usuario no encontrado"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

/// GET /users/wallet/:wallet/contacts
pub async fn get_user_contacts(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>, RecordError> {
    let store = state.datastore()?;
    let wallet = state.address_format.normalize(&wallet)?;
    let user = store
        .find_user_by_wallet(&wallet)
        .await?
        .ok_or_else(|| ServiceError::not_found("Usuario no encontrado"))?;
    let contacts = store.list_contacts(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "count": contacts.len(),
        "contacts": contacts,
    })))
}
