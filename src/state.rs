//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler and by the dictation
//! relay actors.
//!
//! ## Thread Safety Pattern:
//! All mutable data lives behind `Arc<RwLock<T>>`:
//! - Multiple requests can read the same data simultaneously
//! - Only one request can modify data at a time
//!
//! The dictation counter is updated from WebSocket actor lifecycles as well
//! as HTTP handlers, so it shares the same metrics lock.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (never changes, safe to share directly)
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests and dictations.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Current number of live dictation relay sessions
    pub active_dictations: u32,

    /// Total dictation sessions accepted since server start
    pub total_dictations: u64,

    /// Detailed metrics for each API endpoint (URL path)
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately, so other threads aren't
    /// blocked while a handler works with its snapshot.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Update the configuration with validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Try to claim a dictation slot for a new relay session.
    ///
    /// Enforces `performance.max_concurrent_dictations`. Returns false (and
    /// claims nothing) when the server is already at capacity; the relay
    /// refuses the connection in that case.
    pub fn try_begin_dictation(&self) -> bool {
        let limit = self.config.read().unwrap().performance.max_concurrent_dictations as u32;
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_dictations >= limit {
            return false;
        }
        metrics.active_dictations += 1;
        metrics.total_dictations += 1;
        true
    }

    /// Release a dictation slot (called when a relay session ends).
    ///
    /// Underflow-guarded so a double release can't wrap the counter.
    pub fn end_dictation(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_dictations > 0 {
            metrics.active_dictations -= 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones the data so the lock isn't held while the HTTP response is
    /// being serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_dictations: metrics.active_dictations,
            total_dictations: metrics.total_dictations,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Calculate the error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictation_slot_accounting() {
        let mut config = AppConfig::default();
        config.performance.max_concurrent_dictations = 2;
        let state = AppState::new(config);

        assert!(state.try_begin_dictation());
        assert!(state.try_begin_dictation());
        // At capacity: the third dictation is refused and claims nothing
        assert!(!state.try_begin_dictation());

        state.end_dictation();
        assert!(state.try_begin_dictation());

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.active_dictations, 2);
        assert_eq!(snapshot.total_dictations, 3);
    }

    #[test]
    fn test_end_dictation_never_underflows() {
        let state = AppState::new(AppConfig::default());
        state.end_dictation();
        state.end_dictation();
        assert_eq!(state.get_metrics_snapshot().active_dictations, 0);
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("POST /adr_screening", 120, false);
        state.record_endpoint_request("POST /adr_screening", 80, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = snapshot.endpoint_metrics.get("POST /adr_screening").unwrap();
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.error_count, 1);
        assert!((metric.average_duration_ms() - 100.0).abs() < f64::EPSILON);
        assert!((metric.error_rate() - 0.5).abs() < f64::EPSILON);
    }
}
