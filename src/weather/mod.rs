//! Weather-observation provider
//!
//! The core only needs `fetch(cell) -> observation | failure`; every failure
//! (non-success status, timeout, transport, undecodable body) is reported as
//! [`RouteError::FetchFailure`](crate::RouteError::FetchFailure) and treated
//! the same way by callers.

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;
use crate::cost::WeatherObservation;
use crate::grid::GridCell;

pub mod openweathermap;

pub use openweathermap::OpenWeatherMapClient;

/// Source of point weather observations
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current observation at the cell's rounded coordinates
    async fn fetch(&self, cell: GridCell) -> Result<WeatherObservation>;
}

/// Current-weather payload, metric units
///
/// Every field is optional; missing ones fall back to the
/// [`WeatherObservation`] defaults.
#[derive(Debug, Default, Deserialize)]
pub struct CurrentWeatherResponse {
    pub wind: Option<WindData>,
    pub main: Option<MainData>,
    pub visibility: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindData {
    pub speed: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MainData {
    pub temp: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

impl From<CurrentWeatherResponse> for WeatherObservation {
    fn from(response: CurrentWeatherResponse) -> Self {
        let wind = response.wind.unwrap_or_default();
        let main = response.main.unwrap_or_default();

        Self {
            wind_speed: wind.speed.unwrap_or(Self::DEFAULT_WIND_SPEED),
            wind_gust: wind.gust.unwrap_or(Self::DEFAULT_WIND_GUST),
            temperature: main.temp.unwrap_or(Self::DEFAULT_TEMPERATURE),
            visibility: response.visibility.unwrap_or(Self::DEFAULT_VISIBILITY),
            pressure: main.pressure.unwrap_or(Self::DEFAULT_PRESSURE),
            humidity: main.humidity.unwrap_or(Self::DEFAULT_HUMIDITY),
        }
    }
}
