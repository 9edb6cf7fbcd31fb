//! Configuration loading for chainchat.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chain::AddressFormat;
use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the chainchat home directory (~/.chainchat).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".chainchat"))
}

/// Get the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from `path` (or ~/.chainchat/settings.json), then apply
/// environment overrides and validate.
///
/// A missing file is not an error: every section has defaults, and a
/// deployment driven purely by environment variables is common.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_settings_path()?,
    };

    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        settings
    } else {
        tracing::info!("No settings file at {}, using defaults", path.display());
        Settings::default()
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings)?;
    Ok(settings)
}

/// Overlay environment variables onto loaded settings.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("DEEPSEEK_API_KEY").or_else(|| var("LLM_API_KEY")) {
        settings.llm.api_key = Some(v);
    }
    if let Some(v) = var("LLM_API_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = var("LLM_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = var("CHAIN_KIND") {
        match v.to_lowercase().as_str() {
            "stacks" => settings.chain.kind = ChainKind::Stacks,
            "evm" | "ethereum" => settings.chain.kind = ChainKind::Evm,
            other => tracing::warn!("Ignoring unknown CHAIN_KIND '{}'", other),
        }
    }
    if let Some(v) = var("STACKS_NETWORK") {
        settings.chain.stacks_network = v;
    }
    if let Some(v) = var("CONTRACT_ADDRESS") {
        settings.chain.contract_address = Some(v);
    }
    if let Some(v) = var("CONTRACT_NAME") {
        settings.chain.contract_name = Some(v);
    }
    if let Some(v) = var("EVM_RPC_URL") {
        settings.chain.rpc_url = Some(v);
    }
    if let Some(v) = var("EVM_EXPLORER_URL") {
        settings.chain.explorer_url = Some(v);
    }
    if let Some(v) = var("DATABASE_PATH") {
        settings.datastore.path = Some(PathBuf::from(v));
    }
    if let Some(v) = var("PYTH_URL") {
        settings.oracle.base_url = v;
    }
    if let Some(v) = var("HTTP_TIMEOUT_SECS") {
        match v.parse() {
            Ok(secs) => settings.http.timeout_secs = secs,
            Err(_) => tracing::warn!("Ignoring invalid HTTP_TIMEOUT_SECS '{}'", v),
        }
    }
    if let Some(v) = var("PORT") {
        match v.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT '{}'", v),
        }
    }
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.http.timeout_secs == 0 {
        return Err(Error::Config("http.timeout_secs must be greater than 0".to_string()));
    }

    if let Some(address) = settings.chain.contract_address.as_deref() {
        let format = AddressFormat::for_chain(settings.chain.kind);
        format.normalize(address).map_err(|e| {
            Error::Config(format!("chain.contract_address '{}': {}", address, e))
        })?;
    }

    if settings.chain.kind == ChainKind::Evm && settings.chain.rpc_url.is_none() {
        tracing::warn!("chain.kind is evm but chain.rpc_url is not set; chain routes will fail");
    }

    Ok(())
}

/// Which chain family this deployment talks to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    #[default]
    Stacks,
    Evm,
}

/// HTTP server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Text-generation provider configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Llm {
    pub api_key: Option<String>,
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

fn default_llm_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_url(),
            model: default_llm_model(),
        }
    }
}

/// Chain configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Chain {
    #[serde(default)]
    pub kind: ChainKind,
    #[serde(default = "default_stacks_network")]
    pub stacks_network: String,
    pub contract_address: Option<String>,
    pub contract_name: Option<String>,
    #[serde(default = "default_transfer_contract_address")]
    pub transfer_contract_address: String,
    #[serde(default = "default_transfer_contract_name")]
    pub transfer_contract_name: String,
    /// JSON-RPC endpoint (evm only).
    pub rpc_url: Option<String>,
    /// Block explorer base URL (evm only).
    pub explorer_url: Option<String>,
}

fn default_stacks_network() -> String {
    "testnet".to_string()
}

fn default_transfer_contract_address() -> String {
    "ST3AQ7KXWA7KGQ67EX2MFYR1E3231B9S4KY6EFB1R".to_string()
}

fn default_transfer_contract_name() -> String {
    "traspaso-v2".to_string()
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            kind: ChainKind::default(),
            stacks_network: default_stacks_network(),
            contract_address: None,
            contract_name: None,
            transfer_contract_address: default_transfer_contract_address(),
            transfer_contract_name: default_transfer_contract_name(),
            rpc_url: None,
            explorer_url: None,
        }
    }
}

impl Chain {
    pub fn is_mainnet(&self) -> bool {
        self.stacks_network.eq_ignore_ascii_case("mainnet")
    }
}

/// Datastore configuration. No path means no datastore.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Datastore {
    pub path: Option<PathBuf>,
}

/// Price oracle configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Oracle {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
}

fn default_oracle_url() -> String {
    "https://hermes.pyth.network".to_string()
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
        }
    }
}

/// Outbound HTTP policy, shared by every client.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Http {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// chainchat settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub llm: Llm,

    #[serde(default)]
    pub chain: Chain,

    #[serde(default)]
    pub datastore: Datastore,

    #[serde(default)]
    pub oracle: Oracle,

    #[serde(default)]
    pub http: Http,
}

impl Settings {
    /// Copy of the settings safe to print.
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("***".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(settings.http.timeout_secs, 15);
        assert_eq!(settings.chain.transfer_contract_name, "traspaso-v2");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"chain": {"kind": "evm"}, "http": {"timeout_secs": 20}}"#)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let settings: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(settings.chain.kind, ChainKind::Evm);
        assert_eq!(settings.http.timeout_secs, 20);
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.llm.model, "deepseek-chat");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("CHAIN_KIND", "evm"),
            ("PORT", "8080"),
            ("HTTP_TIMEOUT_SECS", "not-a-number"),
            ("CONTRACT_NAME", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.chain.kind, ChainKind::Evm);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.http.timeout_secs, 15);
        assert!(settings.chain.contract_name.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_contract_address() {
        let mut settings = Settings::default();
        settings.chain.contract_address = Some("0xabc".to_string());
        assert!(validate_settings(&settings).is_err());

        settings.chain.contract_address =
            Some("ST3AQ7KXWA7KGQ67EX2MFYR1E3231B9S4KY6EFB1R".to_string());
        assert!(validate_settings(&settings).is_ok());

        settings.http.timeout_secs = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_redacted_hides_key() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("sk-secret".to_string());
        assert_eq!(settings.redacted().llm.api_key.as_deref(), Some("***"));
    }
}
