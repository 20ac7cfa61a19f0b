//! Metrics collection and export for the node.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use anyhow::{Context, Result};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const VEHICLE_PACKETS_TOTAL: &str = "switchyard_vehicle_packets_total";
}

/// Describe every metric the node and its libraries emit.
///
/// Descriptions go to whichever recorder is installed at the time of the
/// call, so this must run after [`start_metrics_server`].
pub fn describe_metrics() {
    switchyard_core::metrics::describe();
    switchyard_gateway::gateway::describe_metrics();
    metrics::describe_counter!(
        names::VEHICLE_PACKETS_TOTAL,
        "Packets written to the vehicle receiver"
    );

    info!("Metrics described");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a packet written to the vehicle.
pub fn record_vehicle_packet() {
    counter!(names::VEHICLE_PACKETS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        // No recorder installed: calls are no-ops
        describe_metrics();
        record_vehicle_packet();
    }

    #[test]
    fn test_descriptions_reach_the_installed_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            record_vehicle_packet();
        });

        let rendered = handle.render();
        assert!(rendered.contains(
            "# HELP switchyard_vehicle_packets_total Packets written to the vehicle receiver"
        ));
    }

    #[test]
    fn test_descriptions_before_install_are_lost() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        describe_metrics();
        metrics::with_local_recorder(&recorder, record_vehicle_packet);

        let rendered = handle.render();
        assert!(rendered.contains("switchyard_vehicle_packets_total 1"));
        assert!(!rendered.contains("# HELP switchyard_vehicle_packets_total"));
    }
}
