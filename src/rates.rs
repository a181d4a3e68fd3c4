use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

const FRANKFURTER_URL: &str = "https://api.frankfurter.app/latest?from=JPY&to=USD";
const USER_AGENT: &str = "sale-monitor/1.0";

/// Where the JPY→USD rate comes from. `None` means conversion is skipped.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn jpy_to_usd(&self) -> Option<f64>;
}

pub struct NoRates;

#[async_trait]
impl RateSource for NoRates {
    async fn jpy_to_usd(&self) -> Option<f64> {
        None
    }
}

/// A rate given on the command line.
pub struct FixedRate(pub f64);

#[async_trait]
impl RateSource for FixedRate {
    async fn jpy_to_usd(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Daily ECB reference rate from frankfurter.app (no key required).
pub struct FrankfurterRates {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct LatestRates {
    rates: HashMap<String, f64>,
}

impl FrankfurterRates {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(FrankfurterRates { client })
    }

    async fn fetch(&self) -> Result<f64> {
        let latest: LatestRates = self
            .client
            .get(FRANKFURTER_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Failed to decode rate response")?;
        latest
            .rates
            .get("USD")
            .copied()
            .context("USD missing from rate response")
    }
}

#[async_trait]
impl RateSource for FrankfurterRates {
    async fn jpy_to_usd(&self) -> Option<f64> {
        match self.fetch().await {
            Ok(rate) => {
                info!("JPY→USD rate: {} (1 JPY = ${})", rate, rate);
                Some(rate)
            }
            Err(e) => {
                warn!("Could not fetch JPY→USD rate: {:#}", e);
                None
            }
        }
    }
}
