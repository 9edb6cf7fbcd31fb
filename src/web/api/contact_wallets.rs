//! Bookmarked wallet routes (`/contact-wallets`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::store::NewContactWallet;
use crate::web::error::{json_body, RecordError};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct CreateContactWalletRequest {
    #[serde(default)]
    pub nombre_wallet_agregada: String,
    #[serde(default)]
    pub wallet_agregada: String,
    #[serde(default)]
    pub wallet_quien_agrego: String,
}

/// GET /contact-wallets
pub async fn list_contact_wallets(
    State(state): State<AppState>,
) -> Result<Json<Value>, RecordError> {
    let records = state.datastore()?.list_contact_wallets(None).await?;
    Ok(Json(json!({ "success": true, "count": records.len(), "contact_wallets": records })))
}

/// GET /contact-wallets/:wallet, the bookmarks added by one wallet.
pub async fn list_owner_contact_wallets(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>, RecordError> {
    let store = state.datastore()?;
    let owner = state.address_format.normalize(&wallet)?;
    let records = store.list_contact_wallets(Some(&owner)).await?;
    Ok(Json(json!({ "success": true, "count": records.len(), "contact_wallets": records })))
}

/// POST /contact-wallets
pub async fn create_contact_wallet(
    State(state): State<AppState>,
    payload: Result<Json<CreateContactWalletRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), RecordError> {
    let body = json_body(payload)?;
    let store = state.datastore()?;
    let format = state.address_format;

    let name = body.nombre_wallet_agregada.trim();
    if name.is_empty()
        || body.wallet_agregada.trim().is_empty()
        || body.wallet_quien_agrego.trim().is_empty()
    {
        return Err(ServiceError::validation(
            "Se requieren nombre_wallet_agregada, wallet_agregada y wallet_quien_agrego",
        )
        .into());
    }
    let wallet_agregada = format.normalize(&body.wallet_agregada)?;
    let wallet_quien_agrego = format.normalize(&body.wallet_quien_agrego)?;
    if wallet_agregada == wallet_quien_agrego {
        return Err(ServiceError::validation("No puedes agregarte a ti mismo").into());
    }

    let record = store
        .create_contact_wallet(NewContactWallet {
            nombre_wallet_agregada: name.to_string(),
            wallet_agregada,
            wallet_quien_agrego,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "contact_wallet": record })),
    ))
}

#[cfg(test)]
mod tests {
    use crate::web::tests::test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    const JUAN: &str = "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6";
    const MARIA: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let app = test_app("{}");
        let bookmark = json!({
            "nombre_wallet_agregada": "María",
            "wallet_agregada": MARIA,
            "wallet_quien_agrego": JUAN
        });

        let (status, body) = app.post("/contact-wallets", bookmark.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["contact_wallet"]["id"].as_str().is_some());

        let (status, _) = app.post("/contact-wallets", bookmark).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app.get(&format!("/contact-wallets/{}", JUAN)).await;
        assert_eq!(body["count"], 1);
        let (_, body) = app.get(&format!("/contact-wallets/{}", MARIA)).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_self_bookmark_rejected() {
        let app = test_app("{}");
        let (status, _) = app
            .post(
                "/contact-wallets",
                json!({"nombre_wallet_agregada": "Yo", "wallet_agregada": JUAN, "wallet_quien_agrego": JUAN}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
