//! Chain routes: counter, balances, transfer descriptions, tx status.

use axum::extract::{Path, State};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chain::{big_number, Balance, TransferRequest};
use crate::error::ServiceError;
use crate::web::error::{json_body, ChainError};
use crate::web::AppState;

type ChainResult = Result<Json<Value>, ChainError>;

#[derive(Deserialize, Default)]
pub struct BalanceRequest {
    #[serde(default)]
    pub address: String,
}

#[derive(Deserialize, Default)]
pub struct PrepareTransferRequest {
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub amount: Option<Value>,
}

#[derive(Deserialize, Default)]
pub struct CheckTransactionRequest {
    #[serde(default)]
    pub txid: String,
}

/// Amount from a JSON number or numeric string.
pub(crate) fn parse_amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|a: &f64| a.is_finite())
}

fn balance_body(balance: &Balance) -> Value {
    let mut body = json!({
        "address": balance.address,
        "balance": balance.amount,
        "unit": balance.unit,
        "message": format!("Balance: {} {}", balance.amount, balance.unit),
    });
    body[format!("balance_{}", balance.base_unit)] = big_number(balance.base_amount);
    body
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": format!("chainchat API activa ({})", state.chain.name()),
    }))
}

/// GET /get-count
pub async fn get_count(State(state): State<AppState>) -> ChainResult {
    let reading = state.chain.read_counter().await?;
    Ok(Json(json!({ "count": reading.count, "raw_debug": reading.raw })))
}

async fn balance_of(state: &AppState, raw: &str) -> ChainResult {
    let address = state.address_format.normalize(raw)?;
    let balance = state.chain.balance(&address).await?;
    Ok(Json(balance_body(&balance)))
}

/// POST /get-balance
pub async fn get_balance(
    State(state): State<AppState>,
    payload: Result<Json<BalanceRequest>, JsonRejection>,
) -> ChainResult {
    let body = json_body(payload)?;
    balance_of(&state, &body.address).await
}

/// GET /api/balance/:address
pub async fn balance_by_path(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ChainResult {
    balance_of(&state, &address).await
}

/// POST /prepare-transfer
pub async fn prepare_transfer(
    State(state): State<AppState>,
    payload: Result<Json<PrepareTransferRequest>, JsonRejection>,
) -> ChainResult {
    let body = json_body(payload)?;
    let format = state.address_format;
    if body.recipient.trim().is_empty() || body.sender.trim().is_empty() {
        return Err(ServiceError::validation(
            "Se requieren las direcciones del remitente y destinatario",
        )
        .into());
    }

    let recipient = format.normalize(&body.recipient).map_err(|_| {
        ServiceError::validation(format!(
            "Dirección del destinatario inválida. {}",
            format.requirement()
        ))
    })?;
    let sender = format.normalize(&body.sender).map_err(|_| {
        ServiceError::validation(format!(
            "Dirección del remitente inválida. {}",
            format.requirement()
        ))
    })?;
    let amount = parse_amount(body.amount.as_ref())
        .filter(|a| *a > 0.0)
        .ok_or_else(|| {
            ServiceError::validation(format!(
                "El monto debe ser mayor a 0 {}",
                format.native_symbol()
            ))
        })?;

    let description = state
        .chain
        .prepare_transfer(&TransferRequest {
            sender,
            recipient,
            amount,
        })
        .await?;
    Ok(Json(description))
}

/// POST /check-transaction
pub async fn check_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CheckTransactionRequest>, JsonRejection>,
) -> ChainResult {
    let body = json_body(payload)?;
    let txid = body.txid.trim();
    if txid.is_empty() {
        return Err(ServiceError::validation("Se requiere el ID de la transacción").into());
    }

    let status = state.chain.transaction_status(txid).await?;
    Ok(Json(json!({
        "txid": status.txid,
        "status": status.state,
        "raw_status": status.raw_status,
        "block_height": status.block_height,
        "block_hash": status.block_hash,
        "explorer_url": status.explorer_url,
        "message": status.message(),
    })))
}

/// GET /network-info
pub async fn network_info(State(state): State<AppState>) -> ChainResult {
    Ok(Json(state.chain.network_info().await?))
}
