use crate::domain::BookId;
use crate::ports::price_lookup::{PriceLookup, RemotePrice, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Body returned by `GET /api/prices/{id}`
#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
    currency: String,
}

/// HTTP client for the remote pricing service
///
/// Performs exactly one request per call. Retries, the circuit breaker and
/// the fallback price all live in the pricing gateway, never here.
pub struct PricingClient {
    client: reqwest::Client,
    base_url: String,
    force_failure: bool,
}

impl PricingClient {
    /// Build a client for `base_url`; `timeout` bounds each request.
    ///
    /// With `force_failure` every request carries `?fail=true`, which makes
    /// the chaos pricing service fail on purpose.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        force_failure: bool,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            force_failure,
        })
    }

    fn price_url(&self, book_id: BookId) -> String {
        format!("{}/api/prices/{}", self.base_url, book_id)
    }
}

#[async_trait]
impl PriceLookup for PricingClient {
    async fn fetch_price(&self, book_id: BookId) -> Result<RemotePrice> {
        let url = self.price_url(book_id);
        tracing::debug!(%book_id, %url, "calling pricing service");

        let mut request = self.client.get(&url);
        if self.force_failure {
            request = request.query(&[("fail", "true")]);
        }

        let body: PriceResponse = request.send().await?.error_for_status()?.json().await?;

        Ok(RemotePrice {
            price: body.price,
            currency: body.currency,
        })
    }
}
