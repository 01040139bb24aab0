//! Metrics recorded by the transfer event manager

use crate::transfer::{Direction, Status};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "meshshare_engine_events_total",
        "Engine events processed, by kind"
    );
    describe_counter!(
        "meshshare_files_finished_total",
        "Files that reached a terminal status"
    );
    describe_counter!(
        "meshshare_transfers_finalized_total",
        "Transfers finalized, by direction and status"
    );
    describe_counter!(
        "meshshare_bytes_transferred_total",
        "Bytes reported by progress events"
    );

    describe_gauge!(
        "meshshare_live_transfers",
        "Transfers currently tracked in memory"
    );

    describe_histogram!(
        "meshshare_transfer_duration_seconds",
        "Time from transfer creation to finalization"
    );
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "incoming",
        Direction::Outgoing => "outgoing",
        Direction::UnknownDirection => "unknown",
    }
}

pub fn record_event(kind: &str) {
    counter!("meshshare_engine_events_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_bytes_transferred(direction: Direction, bytes: u64) {
    counter!("meshshare_bytes_transferred_total", "direction" => direction_label(direction))
        .increment(bytes);
}

pub fn record_file_finished(status: Status) {
    counter!("meshshare_files_finished_total", "status" => format!("{status:?}")).increment(1);
}

pub fn record_transfer_finalized(direction: Direction, status: Status, duration: Duration) {
    counter!(
        "meshshare_transfers_finalized_total",
        "direction" => direction_label(direction),
        "status" => format!("{status:?}")
    )
    .increment(1);
    histogram!("meshshare_transfer_duration_seconds").record(duration.as_secs_f64());
}

pub fn set_live_transfers(count: usize) {
    gauge!("meshshare_live_transfers").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        // Should not panic when called multiple times
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_recording_without_recorder() {
        record_event("FileProgress");
        record_bytes_transferred(Direction::Incoming, 1024);
        record_file_finished(Status::Success);
        record_transfer_finalized(Direction::Outgoing, Status::Canceled, Duration::from_secs(3));
        set_live_transfers(2);
    }
}
