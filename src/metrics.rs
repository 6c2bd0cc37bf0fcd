// src/metrics.rs
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::relay::FRAME_CHANNEL_CAPACITY;

pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        // Default buckets keep us independent of exporter API churn.
        let handle = PrometheusBuilder::new().install_recorder()?;

        // Static gauge: how far the relay may run ahead of a slow client.
        gauge!("relay_frame_channel_capacity").set(FRAME_CHANNEL_CAPACITY as f64);

        Ok(Self { handle })
    }

    pub fn enabled_by_env() -> bool {
        std::env::var(ENV_METRICS_ENABLED).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
