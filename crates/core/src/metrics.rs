#[cfg(feature = "metrics")]
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

#[cfg(feature = "metrics")]
const NAMESPACE: &str = "moonwatch";

/// Prometheus registry with every metric name prefixed by `moonwatch_`.
#[cfg(feature = "metrics")]
pub struct Metrics {
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl Metrics {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn counter(&self, name: &str, help: &str) -> anyhow::Result<IntCounter> {
        let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
        self.registry.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    pub fn counter_vec(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> anyhow::Result<IntCounterVec> {
        let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
        self.registry.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    pub fn gauge(&self, name: &str, help: &str) -> anyhow::Result<IntGauge> {
        let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
        self.registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    pub fn gather(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        let _ = encoder.encode(&mf, &mut buf);
        String::from_utf8_lossy(&buf).to_string()
    }
}

#[cfg(feature = "metrics")]
impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "metrics"))]
pub struct Metrics;

#[cfg(not(feature = "metrics"))]
impl Metrics {
    pub fn new() -> Self {
        Metrics
    }

    pub fn gather(&self) -> String {
        String::new()
    }
}

#[cfg(not(feature = "metrics"))]
impl Default for Metrics {
    fn default() -> Self {
        Metrics
    }
}
