//! Traversal cost model
//!
//! Turns one weather observation into a single positive scalar. The model is
//! pure: no I/O, no shared state, so both the ingestion pipeline and the live
//! route fallback can call it from any task.

use serde::{Deserialize, Serialize};

/// Point weather reading for one cell, metric units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind gust speed in m/s
    pub wind_gust: f64,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Visibility in metres
    pub visibility: f64,
    /// Sea-level pressure in hPa
    pub pressure: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl WeatherObservation {
    pub const DEFAULT_WIND_SPEED: f64 = 0.0;
    pub const DEFAULT_WIND_GUST: f64 = 0.0;
    pub const DEFAULT_TEMPERATURE: f64 = 0.0;
    pub const DEFAULT_VISIBILITY: f64 = 10_000.0;
    pub const DEFAULT_PRESSURE: f64 = 1013.0;
    pub const DEFAULT_HUMIDITY: f64 = 50.0;
}

/// Values substituted for fields the provider left out
impl Default for WeatherObservation {
    fn default() -> Self {
        Self {
            wind_speed: Self::DEFAULT_WIND_SPEED,
            wind_gust: Self::DEFAULT_WIND_GUST,
            temperature: Self::DEFAULT_TEMPERATURE,
            visibility: Self::DEFAULT_VISIBILITY,
            pressure: Self::DEFAULT_PRESSURE,
            humidity: Self::DEFAULT_HUMIDITY,
        }
    }
}

/// Weight of each normalized term in the cost sum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostCoefficients {
    pub wind_speed: f64,
    pub wind_gust: f64,
    pub temperature: f64,
    pub visibility: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl Default for CostCoefficients {
    fn default() -> Self {
        Self {
            wind_speed: 0.25,
            wind_gust: 0.20,
            temperature: 0.10,
            visibility: 0.10,
            pressure: 0.10,
            humidity: 0.10,
        }
    }
}

/// Inclusive `(min, max)` range a field is normalized against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationBounds {
    pub wind_speed: Range,
    pub wind_gust: Range,
    pub temperature: Range,
    pub visibility: Range,
    pub pressure: Range,
    pub humidity: Range,
}

impl Default for NormalizationBounds {
    fn default() -> Self {
        Self {
            wind_speed: Range::new(0.0, 15.0),
            wind_gust: Range::new(0.0, 20.0),
            temperature: Range::new(-30.0, 50.0),
            visibility: Range::new(0.0, 10_000.0),
            pressure: Range::new(950.0, 1050.0),
            humidity: Range::new(0.0, 100.0),
        }
    }
}

/// Immutable cost model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModelConfig {
    #[serde(default)]
    pub coefficients: CostCoefficients,
    #[serde(default)]
    pub bounds: NormalizationBounds,
    /// Smallest cost a cell can carry; must be > 0
    #[serde(default = "default_floor")]
    pub floor: f64,
}

/// Default lower bound on a cell's cost
pub const DEFAULT_COST_FLOOR: f64 = 0.1;

fn default_floor() -> f64 {
    DEFAULT_COST_FLOOR
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            coefficients: CostCoefficients::default(),
            bounds: NormalizationBounds::default(),
            floor: default_floor(),
        }
    }
}

/// Linear rescale mapping `min` to 0 and `max` to 1
///
/// Not clamped: readings outside the range map outside `[0, 1]`. A degenerate
/// range yields 0.
#[must_use]
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 0.0;
    }
    (value - min) / (max - min)
}

/// Weighted-sum weather cost
#[derive(Debug, Clone, Copy, Default)]
pub struct CostModel {
    config: CostModelConfig,
}

impl CostModel {
    #[must_use]
    pub fn new(config: CostModelConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn floor(&self) -> f64 {
        self.config.floor
    }

    /// Traversal cost of a cell under `observation`, never below the floor
    #[must_use]
    pub fn cost(&self, observation: &WeatherObservation) -> f64 {
        let c = &self.config.coefficients;
        let b = &self.config.bounds;
        let term = |value: f64, range: Range| normalize(value, range.min, range.max);

        let total = c.wind_speed * term(observation.wind_speed, b.wind_speed)
            + c.wind_gust * term(observation.wind_gust, b.wind_gust)
            + c.temperature * term(observation.temperature, b.temperature)
            // good visibility is cheap
            + c.visibility * (1.0 - term(observation.visibility, b.visibility))
            + c.pressure * term(observation.pressure, b.pressure)
            + c.humidity * term(observation.humidity, b.humidity);

        // f64::max discards NaN, so a garbage reading still lands on the floor
        total.max(self.config.floor)
    }
}
