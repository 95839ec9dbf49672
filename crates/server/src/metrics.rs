//! Request metrics.
//!
//! No teacher file grounds this one directly — the backend crate pack never
//! shipped a `metrics.rs` — so this follows the plain `metrics` +
//! `metrics-exporter-prometheus` idiom: install a global recorder once at
//! startup, record through the `counter!`/`histogram!` macros from call
//! sites, and render the current snapshot from `/metrics` via
//! [`metrics_exporter_prometheus::PrometheusHandle::render`].

use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder and return the handle `/metrics` renders
/// from. Must be called exactly once, before any request is served.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

/// One request's timing/labeling handle, opened at the top of the
/// orchestrator and closed via [`RequestMetrics::end`] once a response (or
/// error) is known. If the handle is instead dropped without `end` ever
/// being called — a streaming future simply abandoned mid-response when the
/// client disconnects — the `Drop` impl below finalizes it as `"cancelled"`
/// so the completed/started counters never drift apart.
pub struct RequestMetrics {
    started_at: Instant,
    provider: Option<String>,
    model: Option<String>,
    finished: bool,
}

impl RequestMetrics {
    /// Record that a request arrived, before routing is known.
    pub fn start() -> Self {
        counter!("vandamme_requests_total").increment(1);
        Self { started_at: Instant::now(), provider: None, model: None, finished: false }
    }

    /// Attach the provider/model once the resolver has run, so later
    /// counters can be labeled.
    pub fn resolved(&mut self, provider: &str, model: &str) {
        self.provider = Some(provider.to_string());
        self.model = Some(model.to_string());
        counter!(
            "vandamme_requests_routed_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    /// Record outcome and total latency. Idempotent: only the first call
    /// (whether explicit or via `Drop`) records anything.
    pub fn end(mut self, outcome: &str) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        let provider = self.provider.clone().unwrap_or_else(|| "unknown".to_string());
        let elapsed = self.started_at.elapsed();
        counter!(
            "vandamme_requests_completed_total",
            "provider" => provider.clone(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!("vandamme_request_duration_seconds", "provider" => provider).record(elapsed.as_secs_f64());
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        self.finish("cancelled");
    }
}
