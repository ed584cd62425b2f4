//! Prometheus metrics exporter setup.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port the metrics endpoint listens on.
pub const METRICS_PORT: u16 = 9000;

/// Installs the global metrics recorder and serves it on `[::]:9000/metrics`.
///
/// Every exported series carries the `pipeline_id` label.
pub fn init_metrics(pipeline_id: u64) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            METRICS_PORT,
        ))
        .add_global_label("pipeline_id", pipeline_id.to_string())
        .install()
}
