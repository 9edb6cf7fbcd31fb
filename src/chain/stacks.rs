//! Stacks chain client over the Hiro HTTP API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    big_number, clarity, to_base_units, to_display_units, AddressFormat, Balance, ChainClient,
    CounterReading, TransactionStatus, TransferRequest, TxState,
};
use crate::config;
use crate::error::{ServiceError, ServiceResult};

const MICRO_DECIMALS: i32 = 6;
const EXPLORER_BASE: &str = "https://explorer.hiro.so";

pub struct StacksClient {
    client: Client,
    api_url: String,
    network: String,
    contract_address: Option<String>,
    contract_name: Option<String>,
    transfer_contract_address: String,
    transfer_contract_name: String,
}

#[derive(Deserialize)]
struct CallReadResponse {
    #[serde(default)]
    okay: Option<bool>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Deserialize)]
struct StxBalanceResponse {
    balance: String,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    tx_status: Option<String>,
    #[serde(default)]
    block_height: Option<u64>,
    #[serde(default)]
    block_hash: Option<String>,
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(default)]
    network_id: Option<u64>,
    #[serde(default)]
    stacks_tip_height: Option<u64>,
    #[serde(default)]
    burn_block_height: Option<u64>,
    #[serde(default)]
    server_version: Option<String>,
}

impl StacksClient {
    pub fn new(client: Client, chain: &config::Chain) -> Self {
        let api_url = if chain.is_mainnet() {
            "https://api.hiro.so"
        } else {
            "https://api.testnet.hiro.so"
        };
        Self::with_api_url(client, chain, api_url)
    }

    pub fn with_api_url(client: Client, chain: &config::Chain, api_url: impl Into<String>) -> Self {
        let network = if chain.is_mainnet() { "mainnet" } else { "testnet" };
        Self {
            client,
            api_url: api_url.into(),
            network: network.to_string(),
            contract_address: chain.contract_address.clone(),
            contract_name: chain.contract_name.clone(),
            transfer_contract_address: chain.transfer_contract_address.clone(),
            transfer_contract_name: chain.transfer_contract_name.clone(),
        }
    }

    fn explorer_url(&self, txid: &str) -> String {
        format!("{}/txid/{}?chain={}", EXPLORER_BASE, txid, self.network)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ServiceResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await?;

        read_json(response).await
    }
}

/// Decode a JSON body, or report a non-2xx answer as `HTTP <status>: <text>`.
async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> ServiceResult<T> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ServiceError::Upstream(format!("HTTP {}: {}", status, text)));
    }

    Ok(response.json().await?)
}

/// Map a Hiro `tx_status` to the three states the API exposes.
pub(crate) fn tx_state(status: &str) -> TxState {
    match status {
        "success" => TxState::Success,
        "pending" => TxState::Pending,
        _ => TxState::Failed,
    }
}

#[async_trait]
impl ChainClient for StacksClient {
    fn name(&self) -> &str {
        "stacks"
    }

    fn address_format(&self) -> AddressFormat {
        AddressFormat::Stacks
    }

    async fn read_counter(&self) -> ServiceResult<CounterReading> {
        let (address, name) = match (&self.contract_address, &self.contract_name) {
            (Some(a), Some(n)) => (a, n),
            _ => return Err(ServiceError::NotConfigured("Contrato del contador")),
        };

        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/get-count",
            self.api_url, address, name
        );
        let response = self
            .client
            .post(url)
            .json(&json!({ "sender": address, "arguments": [] }))
            .send()
            .await?;

        let body: CallReadResponse = read_json(response).await?;
        if body.okay == Some(false) {
            return Err(ServiceError::Upstream(
                body.cause.unwrap_or_else(|| "call-read failed".to_string()),
            ));
        }

        tracing::debug!("get-count raw result: {}", body.result);
        let count = clarity::decode_integer(&body.result)?;
        let count = i64::try_from(count)
            .map_err(|_| ServiceError::Upstream(format!("counter {} out of range", count)))?;

        Ok(CounterReading {
            count,
            raw: body.result,
        })
    }

    async fn balance(&self, address: &str) -> ServiceResult<Balance> {
        let body: StxBalanceResponse = self
            .get_json(&format!("/extended/v1/address/{}/stx", address))
            .await?;

        let micro: u128 = body.balance.parse().map_err(|_| {
            ServiceError::Upstream(format!("invalid balance '{}'", body.balance))
        })?;

        Ok(Balance {
            address: address.to_string(),
            amount: to_display_units(micro, MICRO_DECIMALS),
            base_amount: micro,
            unit: "STX",
            base_unit: "microstx",
        })
    }

    async fn prepare_transfer(&self, request: &TransferRequest) -> ServiceResult<Value> {
        let amount_microstx = to_base_units(request.amount, MICRO_DECIMALS);

        Ok(json!({
            "contract_address": self.transfer_contract_address,
            "contract_name": self.transfer_contract_name,
            "function_name": "transfer-stx",
            "function_args": [
                format!("'{}", request.recipient),
                format!("u{}", amount_microstx),
            ],
            "sender": request.sender,
            "recipient": request.recipient,
            "amount": request.amount,
            "amount_microstx": big_number(amount_microstx),
            "network": self.network,
            "post_condition_mode": "allow",
            "message": format!(
                "¿Deseas aprobar la transferencia de {} STX a {}?",
                request.amount, request.recipient
            ),
        }))
    }

    async fn transaction_status(&self, txid: &str) -> ServiceResult<TransactionStatus> {
        let response = self
            .client
            .get(format!("{}/extended/v1/tx/{}", self.api_url, txid))
            .send()
            .await?;

        // Freshly broadcast transactions are unknown to the indexer for a while.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TransactionStatus {
                txid: txid.to_string(),
                state: TxState::Pending,
                raw_status: "pending".to_string(),
                block_height: None,
                block_hash: None,
                explorer_url: Some(self.explorer_url(txid)),
            });
        }
        let tx: TxResponse = read_json(response).await?;
        let raw_status = tx.tx_status.unwrap_or_else(|| "unknown".to_string());

        Ok(TransactionStatus {
            txid: txid.to_string(),
            state: tx_state(&raw_status),
            raw_status,
            block_height: tx.block_height,
            block_hash: tx.block_hash,
            explorer_url: Some(self.explorer_url(txid)),
        })
    }

    async fn network_info(&self) -> ServiceResult<Value> {
        let info: InfoResponse = self.get_json("/v2/info").await?;
        Ok(json!({
            "chain": "stacks",
            "network": self.network,
            "network_id": info.network_id,
            "block_height": info.stacks_tip_height,
            "burn_block_height": info.burn_block_height,
            "server_version": info.server_version,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StacksClient {
        StacksClient::new(Client::new(), &config::Chain::default())
    }

    #[test]
    fn test_tx_state_mapping() {
        assert_eq!(tx_state("success"), TxState::Success);
        assert_eq!(tx_state("pending"), TxState::Pending);
        assert_eq!(tx_state("abort_by_post_condition"), TxState::Failed);
    }

    #[test]
    fn test_explorer_url_uses_network() {
        assert_eq!(
            client().explorer_url("0xabc"),
            "https://explorer.hiro.so/txid/0xabc?chain=testnet"
        );
    }

    #[tokio::test]
    async fn test_prepare_transfer_shape() {
        let plan = client()
            .prepare_transfer(&TransferRequest {
                sender: "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6".to_string(),
                recipient: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
                amount: 2.5,
            })
            .await
            .unwrap();

        assert_eq!(plan["function_name"], "transfer-stx");
        assert_eq!(plan["contract_name"], "traspaso-v2");
        assert_eq!(plan["amount_microstx"], 2_500_000);
        assert_eq!(plan["function_args"][1], "u2500000");
        assert_eq!(
            plan["function_args"][0],
            "'ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"
        );
    }

    #[tokio::test]
    async fn test_prepare_transfer_keeps_large_amounts_exact() {
        let plan = client()
            .prepare_transfer(&TransferRequest {
                sender: "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6".to_string(),
                recipient: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
                amount: 20_000_000_000_000.0,
            })
            .await
            .unwrap();

        assert_eq!(plan["amount_microstx"], "20000000000000000000");
        assert_eq!(plan["function_args"][1], "u20000000000000000000");
    }

    #[tokio::test]
    async fn test_counter_requires_contract() {
        let err = client().read_counter().await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_counter_reports_http_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let page = "<html>bad gateway</html>";
            let reply = format!(
                "HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                page.len(),
                page
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        let chain = config::Chain {
            contract_address: Some("ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6".to_string()),
            contract_name: Some("counter".to_string()),
            ..config::Chain::default()
        };
        let stacks = StacksClient::with_api_url(Client::new(), &chain, format!("http://{}", addr));

        let err = stacks.read_counter().await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Upstream("HTTP 502 Bad Gateway: <html>bad gateway</html>".to_string())
        );
    }

    #[test]
    fn test_call_read_body_parses() {
        let body: CallReadResponse = serde_json::from_str(
            r#"{"okay":true,"result":"0x070100000000000000000000000000000007"}"#,
        )
        .unwrap();
        assert_eq!(clarity::decode_integer(&body.result).unwrap(), 7);
    }
}
