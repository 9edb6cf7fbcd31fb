//! Price oracle: symbol resolution, quote conversion, portfolio valuation.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub mod pyth;

pub use pyth::HermesClient;

use crate::error::{ServiceError, ServiceResult};

/// Supported symbols and their Pyth USD feed ids.
pub const FEEDS: &[(&str, &str)] = &[
    ("BTC", "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
    ("ETH", "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
    ("SOL", "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
    ("STX", "ec7a775f46379b5e943c3526b1c8d54cd49749176b0b98e02dde68d1bd335c17"),
    ("USDC", "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
    ("USDT", "2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b"),
    ("AVAX", "93da3352f9f1d105fdfe4971cfa80e9dd777bfc5d0f683ebb6e1294b92137bb7"),
    ("BNB", "2f95862b045670cd22bee3114c39763a4a08beeb663b145d283c31d7d1101c4f"),
    ("DOGE", "dcef50dd0a4cd2dcc17e45df1676dcb336a11a61c69df7a0299b0150c672d25c"),
];

/// One price update as published by the feed: `value = mantissa * 10^expo`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrice {
    pub feed_id: String,
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: i64,
}

/// Source of raw price updates.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the latest update for every id in one request.
    async fn latest(&self, feed_ids: &[&str]) -> ServiceResult<Vec<RawPrice>>;
}

/// Normalize a user-supplied symbol (`btc`, ` BTC/USD `, `Crypto.BTC/USD`).
pub fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    let upper = upper.strip_prefix("CRYPTO.").unwrap_or(&upper);
    upper.strip_suffix("/USD").unwrap_or(upper).to_string()
}

/// Feed id for a symbol, if supported.
pub fn feed_id(symbol: &str) -> Option<&'static str> {
    let symbol = normalize_symbol(symbol);
    FEEDS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, id)| *id)
}

pub fn supported_symbols() -> Vec<&'static str> {
    FEEDS.iter().map(|(s, _)| *s).collect()
}

/// `mantissa * 10^expo` as a float.
pub fn scale(mantissa: i64, expo: i32) -> f64 {
    mantissa as f64 * 10f64.powi(expo)
}

/// Qualitative volatility derived from the confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Volatility {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl Volatility {
    /// Classify by `confidence / price`.
    pub fn from_ratio(ratio: f64) -> Self {
        if !ratio.is_finite() || ratio < 0.0 {
            Volatility::VeryHigh
        } else if ratio < 0.001 {
            Volatility::VeryLow
        } else if ratio < 0.005 {
            Volatility::Low
        } else if ratio < 0.01 {
            Volatility::Medium
        } else if ratio < 0.02 {
            Volatility::High
        } else {
            Volatility::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Volatility::VeryLow => "Very Low",
            Volatility::Low => "Low",
            Volatility::Medium => "Medium",
            Volatility::High => "High",
            Volatility::VeryHigh => "Very High",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Volatility::VeryLow | Volatility::Low => {
                "Buen momento para transferir: el precio es estable."
            }
            Volatility::Medium => "Volatilidad moderada: considera transferir en partes.",
            Volatility::High | Volatility::VeryHigh => {
                "Alta volatilidad: considera esperar o transferir un monto menor."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub confidence: f64,
    pub confidence_percentage: f64,
    pub volatility: Volatility,
    pub publish_time: i64,
    pub feed_id: String,
}

impl Quote {
    pub fn from_raw(symbol: &str, raw: &RawPrice) -> Self {
        let price = scale(raw.price, raw.expo);
        let confidence = raw.conf as f64 * 10f64.powi(raw.expo);
        let ratio = if price > 0.0 { confidence / price } else { f64::INFINITY };

        Self {
            symbol: symbol.to_string(),
            price,
            confidence,
            confidence_percentage: if ratio.is_finite() { ratio * 100.0 } else { 0.0 },
            volatility: Volatility::from_ratio(ratio),
            publish_time: raw.publish_time,
            feed_id: raw.feed_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolError {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiQuote {
    pub prices: Vec<Quote>,
    pub errors: Vec<SymbolError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioItem {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub total_value: f64,
    pub items: Vec<PortfolioItem>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Price oracle facade over a [`PriceFeed`].
#[derive(Clone)]
pub struct Oracle {
    feed: Arc<dyn PriceFeed>,
}

impl Oracle {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed }
    }

    /// Fetch quotes for every resolvable symbol in one batched call.
    ///
    /// Returns the resolved `(symbol, feed_id)` pairs alongside the raw
    /// updates keyed by feed id.
    async fn fetch(
        &self,
        symbols: &[String],
    ) -> ServiceResult<(Vec<(String, &'static str)>, HashMap<String, RawPrice>)> {
        let resolved: Vec<(String, &'static str)> = symbols
            .iter()
            .filter_map(|s| {
                let symbol = normalize_symbol(s);
                feed_id(&symbol).map(|id| (symbol, id))
            })
            .collect();

        if resolved.is_empty() {
            return Ok((resolved, HashMap::new()));
        }

        let mut ids: Vec<&str> = resolved.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids.dedup();

        let updates = self.feed.latest(&ids).await?;
        let by_id = updates
            .into_iter()
            .map(|u| (u.feed_id.trim_start_matches("0x").to_lowercase(), u))
            .collect();

        Ok((resolved, by_id))
    }

    /// Quote one symbol.
    pub async fn quote(&self, symbol: &str) -> ServiceResult<Quote> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ServiceError::validation("Se requiere un símbolo"));
        }
        if feed_id(&symbol).is_none() {
            return Err(ServiceError::validation(format!(
                "Símbolo no soportado: {}",
                symbol
            )));
        }

        let (resolved, by_id) = self.fetch(std::slice::from_ref(&symbol)).await?;
        resolved
            .first()
            .and_then(|(s, id)| by_id.get(*id).map(|raw| Quote::from_raw(s, raw)))
            .ok_or_else(|| ServiceError::Upstream(format!("Sin precio para {}", symbol)))
    }

    /// Quote several symbols; unsupported or missing ones are reported in
    /// `errors` instead of failing the whole request.
    pub async fn quotes(&self, symbols: &[String]) -> ServiceResult<MultiQuote> {
        let (resolved, by_id) = self.fetch(symbols).await?;

        let mut prices = Vec::new();
        let mut errors = Vec::new();
        for raw_symbol in symbols {
            let symbol = normalize_symbol(raw_symbol);
            if symbol.is_empty() {
                continue;
            }
            if prices.iter().any(|q: &Quote| q.symbol == symbol) {
                continue;
            }
            match resolved.iter().find(|(s, _)| *s == symbol) {
                None => errors.push(SymbolError {
                    error: format!("Símbolo no soportado: {}", symbol),
                    symbol,
                }),
                Some((_, id)) => match by_id.get(*id) {
                    Some(raw) => prices.push(Quote::from_raw(&symbol, raw)),
                    None => errors.push(SymbolError {
                        error: format!("Sin precio para {}", symbol),
                        symbol,
                    }),
                },
            }
        }

        Ok(MultiQuote { prices, errors })
    }

    /// Value a set of holdings. Symbols without a quote are left out.
    pub async fn portfolio(&self, holdings: &[(String, f64)]) -> ServiceResult<Portfolio> {
        let symbols: Vec<String> = holdings.iter().map(|(s, _)| s.clone()).collect();
        let (resolved, by_id) = self.fetch(&symbols).await?;

        let mut items: Vec<PortfolioItem> = Vec::new();
        for (raw_symbol, amount) in holdings {
            let symbol = normalize_symbol(raw_symbol);
            let Some((_, id)) = resolved.iter().find(|(s, _)| *s == symbol) else {
                continue;
            };
            let Some(raw) = by_id.get(*id) else { continue };

            let price = scale(raw.price, raw.expo);
            items.push(PortfolioItem {
                symbol,
                amount: *amount,
                price,
                value: price * amount,
                percentage: 0.0,
            });
        }

        let total_value: f64 = items.iter().map(|i| i.value).sum();
        if total_value > 0.0 {
            for item in &mut items {
                item.percentage = round2(item.value / total_value * 100.0);
            }
        }

        Ok(Portfolio { total_value, items })
    }
}
