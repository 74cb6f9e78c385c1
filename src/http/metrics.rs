//! # Metrics module
//!
//! Prometheus counters for reconciliation outcomes, rendered by
//! [`super::route`] at `GET /metrics`. A global registry keeps this usable
//! from any [`crate::controller::Controller`] without threading a handle
//! through every call site, the way the teacher's own telemetry module
//! exposes process-wide counters.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static RECONCILIATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "reconcile_core_reconciliations_total",
            "Total reconciliation attempts, by resource kind and outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("static metric descriptor to be valid");

    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric to register exactly once");

    counter
});

/// A reconciliation attempt's terminal outcome, for metrics purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Retry,
}

impl Outcome {
    fn as_label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Retry => "retry",
        }
    }
}

/// Increments the reconciliation counter for `kind` (e.g. a resource
/// descriptor's `plural`) and `outcome`.
pub fn record(kind: &str, outcome: Outcome) {
    RECONCILIATIONS.with_label_values(&[kind, outcome.as_label()]).inc();
}

/// Renders the current registry in Prometheus text exposition format.
pub(super) fn render() -> hyper::Response<hyper::Body> {
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return hyper::Response::builder()
            .status(hyper::StatusCode::INTERNAL_SERVER_ERROR)
            .body(hyper::Body::empty())
            .expect("a static response to always build");
    }

    hyper::Response::builder()
        .status(hyper::StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, TextEncoder::new().format_type())
        .body(hyper::Body::from(buffer))
        .expect("a static response to always build")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_the_labelled_counter() {
        record("widgets", Outcome::Success);
        let value = RECONCILIATIONS.with_label_values(&["widgets", "success"]).get();
        assert!(value >= 1);
    }
}
