use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct HookMetrics {
    pub register_total: IntCounterVec,
    pub acl_checks_total: IntCounterVec,
    pub store_failures_total: IntCounter,
    pub authentication_seconds: Histogram,
    pub registry: Registry,
}

impl HookMetrics {
    pub fn new() -> crate::Result<Arc<Self>> {
        let registry = Registry::new();

        let register_total = IntCounterVec::new(
            Opts::new("authhook_register_total", "Register decisions by outcome"),
            &["outcome"],
        )?;

        let acl_checks_total = IntCounterVec::new(
            Opts::new(
                "authhook_acl_checks_total",
                "Publish/subscribe decisions by action and outcome",
            ),
            &["action", "outcome"],
        )?;

        let store_failures_total = IntCounter::new(
            "authhook_store_failures_total",
            "Credential store lookups that failed or timed out",
        )?;

        let authentication_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "authhook_authentication_seconds",
                "Time spent authenticating a connection",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        registry.register(Box::new(register_total.clone()))?;
        registry.register(Box::new(acl_checks_total.clone()))?;
        registry.register(Box::new(store_failures_total.clone()))?;
        registry.register(Box::new(authentication_seconds.clone()))?;

        Ok(Arc::new(Self {
            register_total,
            acl_checks_total,
            store_failures_total,
            authentication_seconds,
            registry,
        }))
    }

    pub fn record_register(&self, outcome: &str) {
        self.register_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_acl_check(&self, action: &str, outcome: &str) {
        self.acl_checks_total.with_label_values(&[action, outcome]).inc();
    }

    pub fn record_store_failure(&self) {
        self.store_failures_total.inc();
    }

    pub fn observe_authentication(&self, elapsed: Duration) {
        self.authentication_seconds.observe(elapsed.as_secs_f64());
    }

    /// Render every registered metric in the prometheus text format
    pub fn gather_text(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::AuthHookError::Internal(format!("metrics are not utf-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = HookMetrics::new().unwrap();

        metrics.record_register("ok");
        metrics.record_register("ok");
        metrics.record_acl_check("publish", "error");
        metrics.record_store_failure();
        metrics.observe_authentication(Duration::from_millis(3));

        assert_eq!(metrics.register_total.with_label_values(&["ok"]).get(), 2);
        assert_eq!(metrics.store_failures_total.get(), 1);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("authhook_register_total{outcome=\"ok\"} 2"));
        assert!(text.contains("authhook_acl_checks_total{action=\"publish\",outcome=\"error\"} 1"));
        assert!(text.contains("authhook_authentication_seconds_count 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = HookMetrics::new().unwrap();
        let b = HookMetrics::new().unwrap();

        a.record_store_failure();
        assert_eq!(b.store_failures_total.get(), 0);
    }
}
