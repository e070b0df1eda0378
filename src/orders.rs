//! Downstream orders service client

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OrdersConfig;
use crate::{Error, Result};

/// Dependency name under which orders calls are tracked by the breaker
pub const ORDERS_DEPENDENCY: &str = "orders";

/// A single order as returned by the downstream orders service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDto {
    /// Order identifier
    pub id: u32,
    /// Product name
    pub name: String,
    /// Product category
    pub category: String,
    /// Product color
    pub color: String,
    /// Price in minor units
    pub price: u32,
}

/// HTTP client for the orders service
pub struct OrdersClient {
    http: reqwest::Client,
    base_url: String,
}

impl OrdersClient {
    /// Create a client for the configured orders service
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &OrdersConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch orders, optionally filtered by category
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` on transport failures and `Error::Upstream` on
    /// non-success HTTP statuses.
    pub async fn fetch(&self, category: Option<&str>) -> Result<Vec<OrderDto>> {
        let url = match category {
            Some(category) => format!("{}/{category}", self.base_url),
            None => self.base_url.clone(),
        };

        debug!(%url, "Fetching orders");
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                dependency: ORDERS_DEPENDENCY.to_string(),
                message: format!("orders service returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }
}

/// Canned catalog served while the orders service is unavailable
#[must_use]
pub fn fallback_orders() -> Vec<OrderDto> {
    vec![
        OrderDto {
            id: 119,
            name: "LED TV".to_string(),
            category: "electronics".to_string(),
            color: "white".to_string(),
            price: 45_000,
        },
        OrderDto {
            id: 345,
            name: "Headset".to_string(),
            category: "electronics".to_string(),
            color: "black".to_string(),
            price: 7_000,
        },
        OrderDto {
            id: 475,
            name: "Sound bar".to_string(),
            category: "electronics".to_string(),
            color: "black".to_string(),
            price: 13_000,
        },
    ]
}
