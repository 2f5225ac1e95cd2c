//! Error types and handling for `AquaRoute`

use thiserror::Error;

/// Main error type for route planning and grid ingestion
#[derive(Error, Debug)]
pub enum RouteError {
    /// Coordinate outside the valid latitude/longitude range
    #[error("Coordinate out of range: ({latitude}, {longitude})")]
    OutOfRange { latitude: f64, longitude: f64 },

    /// Weather provider failed for one cell (status, timeout or transport)
    #[error("Weather fetch failed for ({latitude:.1}, {longitude:.1}): {reason}")]
    FetchFailure {
        latitude: f64,
        longitude: f64,
        reason: String,
    },

    /// Start or goal cell has no known cost
    #[error("Start or end point is missing from grid weights: ({latitude:.1}, {longitude:.1})")]
    EndpointUnresolved { latitude: f64, longitude: f64 },

    /// Search exhausted after growing the window to its cap
    #[error("No path found (lat buffer {lat_buffer}, lon buffer {lon_buffer})")]
    NoRouteFound { lat_buffer: u32, lon_buffer: u32 },

    /// Persistent store rejected a read or a batch write
    #[error("Store error: {message} ({cells} cells affected)")]
    StoreFailure { message: String, cells: usize },

    /// A background worker (blocking search, store thread) failed to complete
    #[error("Background task failed: {message}")]
    Task { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RouteError {
    /// Create a new store error
    pub fn store<S: Into<String>>(message: S, cells: usize) -> Self {
        Self::StoreFailure {
            message: message.into(),
            cells,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new fetch error for a cell
    pub fn fetch<S: Into<String>>(latitude: f64, longitude: f64, reason: S) -> Self {
        Self::FetchFailure {
            latitude,
            longitude,
            reason: reason.into(),
        }
    }

    /// Whether the caller supplied something unusable (as opposed to a
    /// server-side failure)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RouteError::OutOfRange { .. } | RouteError::EndpointUnresolved { .. }
        )
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RouteError::OutOfRange { .. } => {
                "Invalid coordinates. Latitude must be within ±90 and longitude within ±180."
                    .to_string()
            }
            RouteError::FetchFailure { .. } => {
                "Unable to reach the weather provider. Please check your connection and API key."
                    .to_string()
            }
            RouteError::EndpointUnresolved { .. } => {
                "Start or end point is missing from grid weights.".to_string()
            }
            RouteError::NoRouteFound { .. } => "No path found".to_string(),
            RouteError::StoreFailure { .. } => {
                "Weather grid storage failed. You may need to clear the grid cache.".to_string()
            }
            RouteError::Task { .. } => "Internal error while computing the route.".to_string(),
            RouteError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            RouteError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let store_err = RouteError::store("disk full", 5000);
        assert!(matches!(store_err, RouteError::StoreFailure { cells: 5000, .. }));

        let config_err = RouteError::config("missing API key");
        assert!(matches!(config_err, RouteError::Config { .. }));

        let fetch_err = RouteError::fetch(18.9, 72.9, "status 429");
        assert!(fetch_err.to_string().contains("(18.9, 72.9)"));
    }

    #[test]
    fn test_client_errors() {
        assert!(
            RouteError::OutOfRange {
                latitude: 91.0,
                longitude: 0.0
            }
            .is_client_error()
        );
        assert!(
            !RouteError::NoRouteFound {
                lat_buffer: 8,
                lon_buffer: 8
            }
            .is_client_error()
        );
    }

    #[test]
    fn test_user_messages() {
        let err = RouteError::NoRouteFound {
            lat_buffer: 8,
            lon_buffer: 8,
        };
        assert_eq!(err.user_message(), "No path found");

        let config_err = RouteError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let route_err: RouteError = io_err.into();
        assert!(matches!(route_err, RouteError::Io { .. }));
    }
}
