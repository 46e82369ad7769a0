//! ## callscope-telemetry::metrics
//! **Prometheus counters for the capture pipeline**

use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub packets_dispatched: Counter,
    pub filter_rejections: Counter,
    pub sink_write_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let packets_dispatched =
            Counter::new("callscope_packets_total", "Packets dispatched to the store")?;
        let filter_rejections = Counter::new(
            "callscope_filter_rejections_total",
            "Capture filters rejected by a source",
        )?;
        let sink_write_latency = Histogram::with_opts(
            HistogramOpts::new(
                "callscope_sink_write_latency_ns",
                "Time spent fanning one packet out to all sinks",
            )
            .buckets(vec![1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]),
        )?;

        registry.register(Box::new(packets_dispatched.clone()))?;
        registry.register(Box::new(filter_rejections.clone()))?;
        registry.register(Box::new(sink_write_latency.clone()))?;

        Ok(Self {
            registry,
            packets_dispatched,
            filter_rejections,
            sink_write_latency,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn inc_packets_dispatched(&self) {
        self.packets_dispatched.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_text_includes_registered_metrics() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.inc_packets_dispatched();
        metrics.sink_write_latency.observe(2_000.0);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("callscope_packets_total 1"));
        assert!(text.contains("callscope_filter_rejections_total 0"));
        assert!(text.contains("callscope_sink_write_latency_ns_count 1"));
    }
}
