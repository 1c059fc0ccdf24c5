//! Prometheus metrics registry, constructed once at startup and shared
//! read-only (internally thread-safe) across every component.

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramVec, Opts, Registry, exponential_buckets,
};

/// The full set of counters/gauges/histograms enumerated in the external
/// metrics contract. Field names mirror the Prometheus metric names.
pub struct Metrics {
    pub registry: Registry,
    pub dspio_concurrency_rate: Gauge,
    pub dspio_request_total: CounterVec,
    pub dspio_request_dropped_total: CounterVec,
    pub dspio_request_error_total: CounterVec,
    pub dspio_conn_dial_total: CounterVec,
    pub dspio_request_duration_seconds: HistogramVec,
    pub ad_request_total: CounterVec,
    pub ad_request_per_pub_and_app_total: CounterVec,
    pub dsp_before_per_pub_total: CounterVec,
    pub dsp_after_per_pub_total: CounterVec,
    pub exchange_dsp_config_info: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dspio_concurrency_rate = Gauge::new(
            "dspio_concurrency_rate",
            "Number of dispatch workers currently in flight",
        )
        .expect("metric");

        let dspio_request_total = CounterVec::new(
            Opts::new("dspio_request_total", "Total dispatch attempts per DSP"),
            &["dsp_id"],
        )
        .expect("metric");

        let dspio_request_dropped_total = CounterVec::new(
            Opts::new(
                "dspio_request_dropped_total",
                "Dispatch attempts dropped because the pool was full",
            ),
            &["dsp_id"],
        )
        .expect("metric");

        let dspio_request_error_total = CounterVec::new(
            Opts::new(
                "dspio_request_error_total",
                "Dispatch attempts that errored (transport or decode)",
            ),
            &["dsp_id"],
        )
        .expect("metric");

        let dspio_conn_dial_total = CounterVec::new(
            Opts::new("dspio_conn_dial_total", "Transport dials per host"),
            &["host"],
        )
        .expect("metric");

        // 1ms, doubling, 14 decades: 1ms .. ~8.19s
        let buckets = exponential_buckets(0.001, 2.0, 14).expect("buckets");
        let dspio_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dspio_request_duration_seconds",
                "Dispatch round-trip latency per DSP",
            )
            .buckets(buckets),
            &["dsp_id"],
        )
        .expect("metric");

        let ad_request_total = CounterVec::new(
            Opts::new("ad_request_total", "Total ad requests handled"),
            &[],
        )
        .expect("metric");

        let ad_request_per_pub_and_app_total = CounterVec::new(
            Opts::new(
                "ad_request_per_pub_and_app_total",
                "Ad requests per publisher and app",
            ),
            &["pub_id", "app_id"],
        )
        .expect("metric");

        let dsp_before_per_pub_total = CounterVec::new(
            Opts::new(
                "dsp_before_per_pub_total",
                "DSP enqueue attempts observed before the enqueue call, per publisher",
            ),
            &["dsp_id", "pub_id"],
        )
        .expect("metric");

        let dsp_after_per_pub_total = CounterVec::new(
            Opts::new(
                "dsp_after_per_pub_total",
                "DSP enqueue attempts observed after the enqueue call, per publisher",
            ),
            &["dsp_id", "pub_id"],
        )
        .expect("metric");

        let exchange_dsp_config_info = GaugeVec::new(
            Opts::new(
                "exchange_dsp_config_info",
                "Set to 1 per configured DSP to seed dashboard variables",
            ),
            &["dsp_id"],
        )
        .expect("metric");

        for collector in [
            Box::new(dspio_concurrency_rate.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(dspio_request_total.clone()),
            Box::new(dspio_request_dropped_total.clone()),
            Box::new(dspio_request_error_total.clone()),
            Box::new(dspio_conn_dial_total.clone()),
            Box::new(dspio_request_duration_seconds.clone()),
            Box::new(ad_request_total.clone()),
            Box::new(ad_request_per_pub_and_app_total.clone()),
            Box::new(dsp_before_per_pub_total.clone()),
            Box::new(dsp_after_per_pub_total.clone()),
            Box::new(exchange_dsp_config_info.clone()),
        ] {
            registry.register(collector).expect("register metric");
        }

        Self {
            registry,
            dspio_concurrency_rate,
            dspio_request_total,
            dspio_request_dropped_total,
            dspio_request_error_total,
            dspio_conn_dial_total,
            dspio_request_duration_seconds,
            ad_request_total,
            ad_request_per_pub_and_app_total,
            dsp_before_per_pub_total,
            dsp_after_per_pub_total,
            exchange_dsp_config_info,
        }
    }

    /// Seed `exchange_dsp_config_info{dsp_id}` for every configured DSP so
    /// dashboard variables populate before any traffic arrives.
    pub fn seed_dsp_config_info(&self, roster: &crate::model::DspRoster) {
        for dsp in roster.iter() {
            self.exchange_dsp_config_info
                .with_label_values(&[&dsp.id.to_string()])
                .set(1.0);
        }
    }

    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&metric_families, &mut buf)
            .expect("encode metrics");
        String::from_utf8(buf).expect("utf8 metrics")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dsp, DspRoster};

    #[test]
    fn render_exposes_every_contracted_metric_name() {
        let metrics = Metrics::new();
        metrics.dspio_request_total.with_label_values(&["1001"]).inc();
        metrics.ad_request_total.with_label_values(&[]).inc();
        let text = metrics.render();

        for name in [
            "dspio_concurrency_rate",
            "dspio_request_total",
            "dspio_request_dropped_total",
            "dspio_request_error_total",
            "dspio_conn_dial_total",
            "dspio_request_duration_seconds",
            "ad_request_total",
            "ad_request_per_pub_and_app_total",
            "dsp_before_per_pub_total",
            "dsp_after_per_pub_total",
            "exchange_dsp_config_info",
        ] {
            assert!(text.contains(name), "missing metric {name} in:\n{text}");
        }
    }

    #[test]
    fn seed_dsp_config_info_sets_one_per_configured_dsp() {
        let metrics = Metrics::new();
        let roster = DspRoster::from_dsps(vec![
            Dsp {
                id: 1001,
                name: "dsp1".to_string(),
                endpoint: "https://d1/bid".to_string(),
                latency: String::new(),
            },
            Dsp {
                id: 1002,
                name: "dsp2".to_string(),
                endpoint: "https://d2/bid".to_string(),
                latency: String::new(),
            },
        ]);
        metrics.seed_dsp_config_info(&roster);

        assert_eq!(
            metrics
                .exchange_dsp_config_info
                .with_label_values(&["1001"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .exchange_dsp_config_info
                .with_label_values(&["1002"])
                .get(),
            1.0
        );
    }
}
