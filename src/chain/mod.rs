//! Chain access: read-only contract calls, balances, transaction status.
//!
//! Signing and broadcasting are left to the wallet on the client side;
//! this module only prepares unsigned transfer descriptions.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub mod address;
pub mod clarity;
pub mod evm;
pub mod stacks;

pub use address::AddressFormat;

use crate::config::{ChainKind, Settings};
use crate::error::ServiceResult;

/// Decoded value of the counter contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterReading {
    pub count: i64,
    /// Raw result as returned by the node, for debugging.
    pub raw: Value,
}

/// Native-token balance of one address.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub address: String,
    /// Balance in display units (STX, ETH).
    pub amount: f64,
    /// Balance in the smallest unit (µSTX, wei).
    pub base_amount: u128,
    /// Display unit symbol.
    pub unit: &'static str,
    /// Name of the smallest unit, used as the `balance_<unit>` key.
    pub base_unit: &'static str,
}

/// Validated input for a transfer description.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStatus {
    pub txid: String,
    pub state: TxState,
    /// Status string as reported by the chain.
    pub raw_status: String,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub explorer_url: Option<String>,
}

impl TransactionStatus {
    pub fn message(&self) -> String {
        match self.state {
            TxState::Success => "✅ Transacción completada correctamente".to_string(),
            TxState::Pending => "⏳ Transacción pendiente de confirmación".to_string(),
            TxState::Failed => format!("❌ Transacción fallida: {}", self.raw_status),
        }
    }
}

/// Chain client trait.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain family name.
    fn name(&self) -> &str;

    /// Address rule every caller must apply before handing addresses in.
    fn address_format(&self) -> AddressFormat;

    /// Read the counter contract.
    async fn read_counter(&self) -> ServiceResult<CounterReading>;

    /// Native balance of a normalized address.
    async fn balance(&self, address: &str) -> ServiceResult<Balance>;

    /// Describe an unsigned transfer for the client wallet to sign.
    async fn prepare_transfer(&self, request: &TransferRequest) -> ServiceResult<Value>;

    /// Look up a transaction by id.
    async fn transaction_status(&self, txid: &str) -> ServiceResult<TransactionStatus>;

    /// Network identity and tip height.
    async fn network_info(&self) -> ServiceResult<Value>;
}

/// Build the chain client for the configured family.
pub fn create_chain_client(settings: &Settings, http: Client) -> Arc<dyn ChainClient> {
    match settings.chain.kind {
        ChainKind::Stacks => Arc::new(stacks::StacksClient::new(http, &settings.chain)),
        ChainKind::Evm => Arc::new(evm::EvmClient::new(http, &settings.chain)),
    }
}

/// Render a smallest-unit amount as a JSON number when it fits in `u64`,
/// else as a decimal string.
pub fn big_number(n: u128) -> Value {
    match u64::try_from(n) {
        Ok(n) => json!(n),
        Err(_) => json!(n.to_string()),
    }
}

/// Convert a smallest-unit amount into display units.
pub(crate) fn to_display_units(base_amount: u128, decimals: i32) -> f64 {
    base_amount as f64 / 10f64.powi(decimals)
}

/// Convert a display amount into smallest units, rounding to the nearest unit.
pub(crate) fn to_base_units(amount: f64, decimals: i32) -> u128 {
    (amount * 10f64.powi(decimals)).round().max(0.0) as u128
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Chain stub with canned answers that counts every outbound call.
    pub(crate) struct StubChain {
        format: AddressFormat,
        calls: AtomicUsize,
    }

    impl StubChain {
        pub(crate) fn new(format: AddressFormat) -> Arc<Self> {
            Arc::new(Self {
                format,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainClient for StubChain {
        fn name(&self) -> &str {
            "stub"
        }

        fn address_format(&self) -> AddressFormat {
            self.format
        }

        async fn read_counter(&self) -> ServiceResult<CounterReading> {
            self.hit();
            Ok(CounterReading {
                count: 7,
                raw: json!("0x070100000000000000000000000000000007"),
            })
        }

        async fn balance(&self, address: &str) -> ServiceResult<Balance> {
            self.hit();
            Ok(Balance {
                address: address.to_string(),
                amount: 2.5,
                base_amount: 2_500_000,
                unit: "STX",
                base_unit: "microstx",
            })
        }

        async fn prepare_transfer(&self, request: &TransferRequest) -> ServiceResult<Value> {
            self.hit();
            Ok(json!({
                "sender": request.sender,
                "recipient": request.recipient,
                "amount": request.amount,
            }))
        }

        async fn transaction_status(&self, txid: &str) -> ServiceResult<TransactionStatus> {
            self.hit();
            Ok(TransactionStatus {
                txid: txid.to_string(),
                state: TxState::Success,
                raw_status: "success".to_string(),
                block_height: Some(42),
                block_hash: Some("0xbeef".to_string()),
                explorer_url: None,
            })
        }

        async fn network_info(&self) -> ServiceResult<Value> {
            self.hit();
            Err(crate::error::ServiceError::Upstream("HTTP 503: down".to_string()))
        }
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(to_base_units(0.29, 6), 290_000);
        assert_eq!(to_base_units(10.0, 6), 10_000_000);
        assert_eq!(to_base_units(1.5, 18), 1_500_000_000_000_000_000);
        assert!((to_display_units(2_500_000, 6) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tx_messages() {
        let status = TransactionStatus {
            txid: "0xabc".to_string(),
            state: TxState::Failed,
            raw_status: "abort_by_response".to_string(),
            block_height: None,
            block_hash: None,
            explorer_url: None,
        };
        assert!(status.message().contains("abort_by_response"));
    }

    #[test]
    fn test_big_number() {
        assert_eq!(big_number(2_500_000), json!(2_500_000u64));
        assert_eq!(big_number(u64::MAX as u128), json!(u64::MAX));
        assert_eq!(
            big_number(20_000_000_000_000_000_000),
            json!("20000000000000000000")
        );
    }
}
