use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct FundamentalData {
    pub pe_ratio: Option<f64>,
    pub financial_strength: Option<f64>,
    pub dividend_yield: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalystData {
    pub rating: Option<f64>,
    pub target_price: Option<Decimal>,
}

/// Quote provider contract. Like the brokerage adapter, the wire client is
/// external; the sync layer talks to this trait.
#[async_trait]
pub trait QuoteAdapter: Send + Sync {
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal>;
    async fn get_fundamental_data(&self, symbol: &str) -> Result<FundamentalData>;
    async fn get_analyst_data(&self, symbol: &str) -> Result<AnalystData>;
    async fn get_security_industry(&self, symbol: &str) -> Result<String>;
    async fn get_country_and_exchange(&self, symbol: &str) -> Result<(String, String)>;
}

/// Exponential-backoff retry wrapper for price lookups: quote endpoints are
/// the flakiest dependency, so transient failures get a few spaced attempts
/// before they surface.
pub struct RetryingQuoteAdapter<Q> {
    inner: Q,
    attempts: u32,
    base_delay: Duration,
}

impl<Q: QuoteAdapter> RetryingQuoteAdapter<Q> {
    pub fn new(inner: Q) -> Self {
        Self {
            inner,
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_policy(inner: Q, attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay,
        }
    }
}

#[async_trait]
impl<Q: QuoteAdapter> QuoteAdapter for RetryingQuoteAdapter<Q> {
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal> {
        let mut delay = self.base_delay;
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.inner.get_current_price(symbol).await {
                Ok(price) => return Ok(price),
                Err(error) => {
                    warn!(symbol, attempt, %error, "price lookup failed");
                    last_error = Some(error);
                    if attempt < self.attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("price lookup failed")))
    }

    async fn get_fundamental_data(&self, symbol: &str) -> Result<FundamentalData> {
        self.inner.get_fundamental_data(symbol).await
    }

    async fn get_analyst_data(&self, symbol: &str) -> Result<AnalystData> {
        self.inner.get_analyst_data(symbol).await
    }

    async fn get_security_industry(&self, symbol: &str) -> Result<String> {
        self.inner.get_security_industry(symbol).await
    }

    async fn get_country_and_exchange(&self, symbol: &str) -> Result<(String, String)> {
        self.inner.get_country_and_exchange(symbol).await
    }
}
