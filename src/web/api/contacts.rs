//! Contact routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::store::NewContact;
use crate::web::error::{json_body, RecordError};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct ContactsQuery {
    pub user_id: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct CreateContactRequest {
    pub user_id: Option<i64>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub wallet_address: String,
}

/// GET /contacts?user_id=
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ContactsQuery>,
) -> Result<Json<Value>, RecordError> {
    let store = state.datastore()?;
    let user_id = query
        .user_id
        .ok_or_else(|| ServiceError::validation("Se requiere user_id"))?;
    if store.get_user(user_id).await?.is_none() {
        return Err(ServiceError::not_found("Usuario no encontrado").into());
    }

    let contacts = store.list_contacts(user_id).await?;
    Ok(Json(json!({ "success": true, "count": contacts.len(), "contacts": contacts })))
}

/// POST /contacts
pub async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<CreateContactRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), RecordError> {
    let body = json_body(payload)?;
    let store = state.datastore()?;
    let nombre = body.nombre.trim();
    let user_id = match body.user_id {
        Some(id) if !nombre.is_empty() && !body.wallet_address.trim().is_empty() => id,
        _ => {
            return Err(ServiceError::validation(
                "Se requieren user_id, nombre y wallet_address",
            )
            .into())
        }
    };
    let wallet_address = state.address_format.normalize(&body.wallet_address)?;

    let contact = store
        .create_contact(NewContact {
            user_id,
            nombre: nombre.to_string(),
            wallet_address,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "contact": contact, "message": "Contacto agregado exitosamente" })),
    ))
}

#[cfg(test)]
mod tests {
    use crate::web::tests::test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    const JUAN: &str = "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6";
    const PEDRO: &str = "ST3AQ7KXWA7KGQ67EX2MFYR1E3231B9S4KY6EFB1R";

    #[tokio::test]
    async fn test_create_and_list() {
        let app = test_app("{}");
        let user_id = app.seed_contacts(JUAN, &[]).await;

        let (status, body) = app
            .post(
                "/contacts",
                json!({"user_id": user_id, "nombre": " Pedro ", "wallet_address": PEDRO}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["contact"]["nombre"], "Pedro");

        let (status, body) = app
            .post(
                "/contacts",
                json!({"user_id": user_id, "nombre": "Pedro 2", "wallet_address": PEDRO}),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) = app.get(&format!("/contacts?user_id={}", user_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_validation_and_unknown_user() {
        let app = test_app("{}");
        let (status, _) = app.get("/contacts").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.get("/contacts?user_id=77").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .post("/contacts", json!({"user_id": 77, "nombre": "X", "wallet_address": PEDRO}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.post("/contacts", json!({"nombre": "X"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
