//! OpenWeatherMap current-weather client

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use tracing::instrument;

use super::{CurrentWeatherResponse, WeatherProvider};
use crate::config::WeatherConfig;
use crate::cost::WeatherObservation;
use crate::grid::GridCell;
use crate::{Result, RouteError};

/// HTTP client for the `/data/2.5/weather` endpoint
pub struct OpenWeatherMapClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl OpenWeatherMapClient {
    /// Create a client from the weather section of the configuration
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RouteError::config("weather.api_key is required for live weather fetches"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("aquaroute/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RouteError::config(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    /// Error text with the request URL (and so the `appid`) removed
    fn describe(&self, err: reqwest_middleware::Error) -> String {
        let message = match err {
            reqwest_middleware::Error::Reqwest(e) => e.without_url().to_string(),
            reqwest_middleware::Error::Middleware(e) => format!("{e:#}"),
        };
        message.replace(&self.api_key, "***")
    }

    fn url_for(&self, cell: GridCell) -> String {
        format!(
            "{}?lat={:.1}&lon={:.1}&appid={}&units=metric",
            self.base_url,
            cell.latitude(),
            cell.longitude(),
            self.api_key
        )
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    #[instrument(level = "trace", skip(self, cell), fields(cell = %cell))]
    async fn fetch(&self, cell: GridCell) -> Result<WeatherObservation> {
        let fail = |reason: String| RouteError::fetch(cell.latitude(), cell.longitude(), reason);

        let response = self
            .client
            .get(self.url_for(cell))
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", self.describe(e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("status code {}", status.as_u16())));
        }

        let body: CurrentWeatherResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("invalid response body: {}", self.describe(e.into()))))?;

        Ok(body.into())
    }
}
