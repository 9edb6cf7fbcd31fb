//! Ethereum-compatible chain client over JSON-RPC.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};

use super::{
    big_number, to_base_units, to_display_units, AddressFormat, Balance, ChainClient, CounterReading,
    TransactionStatus, TransferRequest, TxState,
};
use crate::config;
use crate::error::{ServiceError, ServiceResult};

const WEI_DECIMALS: i32 = 18;
const TRANSFER_GAS: u128 = 21_000;

pub struct EvmClient {
    client: Client,
    rpc_url: Option<String>,
    explorer_url: Option<String>,
    contract_address: Option<String>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

impl EvmClient {
    pub fn new(client: Client, chain: &config::Chain) -> Self {
        Self {
            client,
            rpc_url: chain.rpc_url.clone(),
            explorer_url: chain.explorer_url.clone(),
            contract_address: chain.contract_address.clone(),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> ServiceResult<Value> {
        let url = self
            .rpc_url
            .as_deref()
            .ok_or(ServiceError::NotConfigured("RPC de la red"))?;

        let response = self
            .client
            .post(url)
            .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!("HTTP {}: {}", status, text)));
        }

        let body: RpcResponse = response.json().await?;
        rpc_result(method, body)
    }
}

fn rpc_result(method: &str, body: RpcResponse) -> ServiceResult<Value> {
    if let Some(err) = body.error {
        return Err(ServiceError::upstream(format!(
            "{} failed ({}): {}",
            method, err.code, err.message
        )));
    }
    Ok(body.result.unwrap_or(Value::Null))
}

/// Parse a hex `QUANTITY` or 32-byte word.
pub(crate) fn parse_quantity(value: &Value) -> ServiceResult<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| ServiceError::Upstream(format!("expected hex quantity, got {}", value)))?;
    let digits = s.strip_prefix("0x").unwrap_or(s).trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| ServiceError::Upstream(format!("quantity '{}' out of range", s)))
}

/// 4-byte function selector for a Solidity signature.
pub(crate) fn selector(signature: &str) -> String {
    let hash = Keccak256::digest(signature.as_bytes());
    format!("0x{}", hex::encode(&hash[..4]))
}

fn is_tx_hash(txid: &str) -> bool {
    txid.strip_prefix("0x")
        .map(|h| h.len() == 64 && h.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Build a status from an `eth_getTransactionReceipt` result.
pub(crate) fn receipt_status(
    txid: &str,
    receipt: &Value,
    explorer_url: Option<String>,
) -> ServiceResult<TransactionStatus> {
    if receipt.is_null() {
        return Ok(TransactionStatus {
            txid: txid.to_string(),
            state: TxState::Pending,
            raw_status: "pending".to_string(),
            block_height: None,
            block_hash: None,
            explorer_url,
        });
    }

    let raw_status = receipt["status"].as_str().unwrap_or("unknown").to_string();
    let state = match raw_status.as_str() {
        "0x1" => TxState::Success,
        _ => TxState::Failed,
    };
    let block_height = match receipt.get("blockNumber") {
        Some(v) if !v.is_null() => Some(u64::try_from(parse_quantity(v)?).map_err(|_| {
            ServiceError::Upstream(format!("block number out of range: {}", v))
        })?),
        _ => None,
    };

    Ok(TransactionStatus {
        txid: txid.to_string(),
        state,
        raw_status,
        block_height,
        block_hash: receipt["blockHash"].as_str().map(String::from),
        explorer_url,
    })
}

#[async_trait]
impl ChainClient for EvmClient {
    fn name(&self) -> &str {
        "evm"
    }

    fn address_format(&self) -> AddressFormat {
        AddressFormat::Evm
    }

    async fn read_counter(&self) -> ServiceResult<CounterReading> {
        let contract = self
            .contract_address
            .as_deref()
            .ok_or(ServiceError::NotConfigured("Contrato del contador"))?;

        let raw = self
            .rpc(
                "eth_call",
                json!([{ "to": contract, "data": selector("getCount()") }, "latest"]),
            )
            .await?;

        let count = parse_quantity(&raw)?;
        let count = i64::try_from(count)
            .map_err(|_| ServiceError::Upstream(format!("counter {} out of range", count)))?;

        Ok(CounterReading { count, raw })
    }

    async fn balance(&self, address: &str) -> ServiceResult<Balance> {
        let raw = self.rpc("eth_getBalance", json!([address, "latest"])).await?;
        let wei = parse_quantity(&raw)?;

        Ok(Balance {
            address: address.to_string(),
            amount: to_display_units(wei, WEI_DECIMALS),
            base_amount: wei,
            unit: "ETH",
            base_unit: "wei",
        })
    }

    async fn prepare_transfer(&self, request: &TransferRequest) -> ServiceResult<Value> {
        let gas_price = parse_quantity(&self.rpc("eth_gasPrice", json!([])).await?)?;
        let chain_id = parse_quantity(&self.rpc("eth_chainId", json!([])).await?)?;
        let value_wei = to_base_units(request.amount, WEI_DECIMALS);
        let fee_wei = gas_price * TRANSFER_GAS;

        Ok(json!({
            "from": request.sender,
            "to": request.recipient,
            "sender": request.sender,
            "recipient": request.recipient,
            "amount": request.amount,
            "value": format!("0x{:x}", value_wei),
            "value_wei": value_wei.to_string(),
            "chain_id": big_number(chain_id),
            "gas": big_number(TRANSFER_GAS),
            "gas_price": gas_price.to_string(),
            "fee_estimate_wei": fee_wei.to_string(),
            "fee_estimate": to_display_units(fee_wei, WEI_DECIMALS),
            "message": format!(
                "¿Deseas aprobar la transferencia de {} ETH a {}?",
                request.amount, request.recipient
            ),
        }))
    }

    async fn transaction_status(&self, txid: &str) -> ServiceResult<TransactionStatus> {
        if !is_tx_hash(txid) {
            return Err(ServiceError::validation(
                "ID de transacción inválido. Debe ser 0x seguido de 64 caracteres hexadecimales",
            ));
        }

        let receipt = self
            .rpc("eth_getTransactionReceipt", json!([txid]))
            .await?;
        let explorer = self
            .explorer_url
            .as_deref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), txid));

        receipt_status(txid, &receipt, explorer)
    }

    async fn network_info(&self) -> ServiceResult<Value> {
        let chain_id = parse_quantity(&self.rpc("eth_chainId", json!([])).await?)?;
        let block = parse_quantity(&self.rpc("eth_blockNumber", json!([])).await?)?;

        Ok(json!({
            "chain": "evm",
            "chain_id": big_number(chain_id),
            "block_height": big_number(block),
        }))
    }
}
