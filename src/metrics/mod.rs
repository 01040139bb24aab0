//! Metrics and observability module
//!
//! Prometheus-compatible counters for engine events and transfer outcomes.

pub mod exporter;
pub mod recorder;

pub use exporter::{install_recorder, metrics_route, render_metrics, MetricsError};
pub use recorder::{
    init_metrics, record_bytes_transferred, record_event, record_file_finished,
    record_transfer_finalized, set_live_transfers,
};
