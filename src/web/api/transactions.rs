//! Transaction ledger routes (`/transacciones`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::chain::parse_amount;
use crate::error::ServiceError;
use crate::store::NewTransaction;
use crate::web::error::{json_body, RecordError};
use crate::web::AppState;

const STATUSES: &[&str] = &["pending", "success", "failed"];

#[derive(Deserialize, Default)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub sender_wallet: String,
    #[serde(default)]
    pub recipient_wallet: String,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /transacciones
pub async fn list_transactions(State(state): State<AppState>) -> Result<Json<Value>, RecordError> {
    let records = state.datastore()?.list_transactions(None).await?;
    Ok(Json(json!({ "success": true, "count": records.len(), "transacciones": records })))
}

/// GET /transacciones/wallet/:wallet
pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>, RecordError> {
    let store = state.datastore()?;
    let wallet = state.address_format.normalize(&wallet)?;
    let records = store.list_transactions(Some(&wallet)).await?;
    Ok(Json(json!({
        "success": true,
        "wallet": wallet,
        "count": records.len(),
        "transacciones": records,
    })))
}

/// POST /transacciones
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), RecordError> {
    let body = json_body(payload)?;
    let store = state.datastore()?;
    let format = state.address_format;

    if body.sender_wallet.trim().is_empty() || body.recipient_wallet.trim().is_empty() {
        return Err(ServiceError::validation(
            "Se requieren sender_wallet y recipient_wallet",
        )
        .into());
    }
    let sender_wallet = format.normalize(&body.sender_wallet)?;
    let recipient_wallet = format.normalize(&body.recipient_wallet)?;
    let amount = parse_amount(body.amount.as_ref())
        .filter(|a| *a > 0.0)
        .ok_or_else(|| ServiceError::validation("El monto debe ser mayor a 0"))?;

    let status = match body.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) if STATUSES.contains(&s) => Some(s.to_string()),
        Some(s) => {
            return Err(ServiceError::validation(format!(
                "Estado inválido '{}'. Debe ser pending, success o failed",
                s
            ))
            .into())
        }
    };
    let txid = body
        .txid
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let record = store
        .create_transaction(NewTransaction {
            sender_wallet,
            recipient_wallet,
            amount,
            txid,
            status,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "transaccion": record })),
    ))
}
