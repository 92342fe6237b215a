use chrono::{DateTime, NaiveDate, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::HistoricalDataProvider;
use crate::config::AlpacaSettings;
use crate::models::Bar;
use crate::{Error, Result};

const MAX_RETRIES: u32 = 3;
const PAGE_LIMIT: u32 = 10_000;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

// Type alias for the rate limiter to simplify signatures
type AlpacaRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Alpaca market data client for historical stock bars
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct AlpacaClient {
    client: Client,
    data_url: String,
    api_key: String,
    secret_key: String,
    adjustment: String,
    rate_limiter: Arc<AlpacaRateLimiter>,
    retry_backoff: Duration,
}

/// Response from /v2/stocks/{symbol}/bars
#[derive(Debug, Deserialize)]
struct BarsResponse {
    // Alpaca sends `null` when the range holds no bars
    bars: Option<Vec<AlpacaBar>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl AlpacaBar {
    fn into_bar(self, symbol: &str) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timestamp: self.t,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
        }
    }
}

impl AlpacaClient {
    /// Build a client from settings; both API keys are required
    pub fn new(settings: &AlpacaSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("alpaca.api_key (or APCA_API_KEY_ID) is not set".into()))?;
        let secret_key = settings
            .secret_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config("alpaca.secret_key (or APCA_API_SECRET_KEY) is not set".into())
            })?;

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let rpm = NonZeroU32::new(settings.requests_per_minute)
            .ok_or_else(|| Error::Config("alpaca.requests_per_minute must be > 0".into()))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            data_url: settings.data_url.trim_end_matches('/').to_string(),
            api_key,
            secret_key,
            adjustment: settings.adjustment.clone(),
            rate_limiter,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Override the base delay used between retries (doubles per attempt)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Make a rate-limited API request with retry logic
    async fn make_request(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            // Wait for rate limiter
            self.rate_limiter.until_ready().await;

            let backoff = self.retry_backoff * 2u32.pow(attempt - 1);

            let request = self
                .client
                .get(url)
                .query(query)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.secret_key);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Alpaca returned {}, retrying in {:?} (attempt {}/{})",
                            status,
                            backoff,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(Error::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!(
                        "Network error: {}, retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }

        Err(Error::Api {
            status: 0,
            message: format!("Failed after {} retries", MAX_RETRIES),
        })
    }

    /// Fetch daily bars for `symbol` in `[start, end]`, following pagination
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, symbol);
        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeframe", "1Day".to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("adjustment", self.adjustment.clone()),
            ];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let response = self.make_request(&url, &query).await?;
            let page: BarsResponse = response.json().await?;

            let page_bars = page.bars.unwrap_or_default();
            tracing::debug!("Fetched {} bars for {}", page_bars.len(), symbol);
            bars.extend(page_bars.into_iter().map(|b| b.into_bar(symbol)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        bars.sort_by_key(|b| b.timestamp);

        tracing::info!(
            "Loaded {} daily bars for {} ({} to {})",
            bars.len(),
            symbol,
            start,
            end
        );

        Ok(bars)
    }
}

impl HistoricalDataProvider for AlpacaClient {
    async fn daily_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        self.get_daily_bars(symbol, start, end).await
    }
}
