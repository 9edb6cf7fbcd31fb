//! Price oracle routes (`/pyth/*`).

use axum::extract::{Path, Query, State};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::resolver::{holding_list, symbol_list};
use crate::error::ServiceError;
use crate::oracle::{supported_symbols, Quote};
use crate::web::error::{json_body, OracleError};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct PricesQuery {
    #[serde(default)]
    pub symbols: Option<String>,
}

#[derive(Serialize)]
pub struct QuoteBody {
    pub success: bool,
    #[serde(flatten)]
    pub quote: Quote,
}

/// GET /pyth/price/:symbol
pub async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteBody>, OracleError> {
    let quote = state.oracle.quote(&symbol).await?;
    Ok(Json(QuoteBody {
        success: true,
        quote,
    }))
}

/// GET /pyth/prices?symbols=BTC,ETH
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<Value>, OracleError> {
    let symbols = symbol_list(query.symbols.map(Value::String).as_ref());
    if symbols.is_empty() {
        return Err(ServiceError::validation("Se requiere el parámetro symbols").into());
    }

    let result = state.oracle.quotes(&symbols).await?;
    Ok(Json(json!({
        "success": true,
        "prices": result.prices,
        "errors": result.errors,
    })))
}

/// GET /pyth/supported
pub async fn supported() -> Json<Value> {
    let symbols = supported_symbols();
    Json(json!({ "success": true, "count": symbols.len(), "symbols": symbols }))
}

/// POST /pyth/portfolio
pub async fn portfolio(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, OracleError> {
    let body = json_body(payload)?;
    let holdings = holding_list(body.get("holdings"));
    if holdings.is_empty() {
        return Err(ServiceError::validation("Se requieren holdings con montos mayores a 0").into());
    }

    let portfolio = state.oracle.portfolio(&holdings).await?;
    Ok(Json(json!({
        "success": true,
        "total_value": portfolio.total_value,
        "items": portfolio.items,
    })))
}
