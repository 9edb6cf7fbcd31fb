//! Pyth Hermes HTTP price feed.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{PriceFeed, RawPrice};
use crate::error::{ServiceError, ServiceResult};

pub struct HermesClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LatestResponse {
    #[serde(default)]
    parsed: Vec<ParsedUpdate>,
}

#[derive(Deserialize)]
struct ParsedUpdate {
    id: String,
    price: PriceComponent,
}

/// Hermes sends the mantissa and confidence as decimal strings.
#[derive(Deserialize)]
struct PriceComponent {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

impl HermesClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn parse_updates(body: LatestResponse) -> ServiceResult<Vec<RawPrice>> {
    body.parsed
        .into_iter()
        .map(|u| {
            let price = u.price.price.parse::<i64>().map_err(|_| {
                ServiceError::Upstream(format!("invalid price '{}' for {}", u.price.price, u.id))
            })?;
            let conf = u.price.conf.parse::<u64>().map_err(|_| {
                ServiceError::Upstream(format!("invalid conf '{}' for {}", u.price.conf, u.id))
            })?;
            Ok(RawPrice {
                feed_id: u.id.trim_start_matches("0x").to_lowercase(),
                price,
                conf,
                expo: u.price.expo,
                publish_time: u.price.publish_time,
            })
        })
        .collect()
}

#[async_trait]
impl PriceFeed for HermesClient {
    async fn latest(&self, feed_ids: &[&str]) -> ServiceResult<Vec<RawPrice>> {
        let mut query: Vec<(&str, &str)> = feed_ids.iter().map(|id| ("ids[]", *id)).collect();
        query.push(("parsed", "true"));

        tracing::debug!("Fetching {} price feed(s) from Hermes", feed_ids.len());
        let response = self
            .client
            .get(format!(
                "{}/v2/updates/price/latest",
                self.base_url.trim_end_matches('/')
            ))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!("Hermes HTTP {}: {}", status, text)));
        }

        let body: LatestResponse = response.json().await?;
        parse_updates(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hermes_body() {
        let body: LatestResponse = serde_json::from_str(
            r#"{
                "binary": {"encoding": "hex", "data": []},
                "parsed": [{
                    "id": "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
                    "price": {"price": "6512345678901", "conf": "2345678", "expo": -8, "publish_time": 1700000000},
                    "ema_price": {"price": "6500000000000", "conf": "2000000", "expo": -8, "publish_time": 1700000000}
                }]
            }"#,
        )
        .unwrap();

        let updates = parse_updates(body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].price, 6_512_345_678_901);
        assert_eq!(updates[0].conf, 2_345_678);
        assert_eq!(updates[0].expo, -8);
    }

    #[test]
    fn test_bad_mantissa_is_upstream_error() {
        let body: LatestResponse = serde_json::from_str(
            r#"{"parsed": [{"id": "0xab", "price": {"price": "abc", "conf": "1", "expo": -8, "publish_time": 1}}]}"#,
        )
        .unwrap();
        assert!(matches!(parse_updates(body), Err(ServiceError::Upstream(_))));
    }
}
