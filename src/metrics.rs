//! Stage metrics for the ETL run
//!
//! Recording goes through the `metrics` facade and is a no-op unless a recorder
//! is installed. [`init`] installs a Prometheus recorder so the run can dump a
//! text snapshot with [`write_snapshot`] when it finishes.

use crate::error::{EtlError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EtlError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics recorder installed");
    Ok(())
}

/// Render the current metrics in Prometheus text format
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub fn write_snapshot<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match render() {
        Some(body) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, body)?;
            info!("Wrote metrics snapshot to {}", path.display());
        }
        None => warn!("Metrics recorder not installed, skipping snapshot"),
    }
    Ok(())
}

// ============================================================================
// Loader Metrics
// ============================================================================

pub mod loader {
    pub fn rows_read(count: usize) {
        ::metrics::counter!("etl_loader_rows_read_total").increment(count as u64);
    }

    pub fn rows_joined(count: usize) {
        ::metrics::counter!("etl_loader_rows_joined_total").increment(count as u64);
    }
}

// ============================================================================
// Transform Metrics
// ============================================================================

pub mod transform {
    pub fn duplicates_removed(count: usize) {
        ::metrics::counter!("etl_transform_duplicates_removed_total").increment(count as u64);
    }

    pub fn values_remapped(column: &str, count: usize) {
        ::metrics::counter!("etl_transform_values_remapped_total", "column" => column.to_string())
            .increment(count as u64);
    }

    pub fn category_columns(count: usize) {
        ::metrics::gauge!("etl_transform_category_columns").set(count as f64);
    }
}

// ============================================================================
// Writer Metrics
// ============================================================================

pub mod writer {
    pub fn rows_written(table: &str, count: usize) {
        ::metrics::counter!("etl_writer_rows_written_total", "table" => table.to_string())
            .increment(count as u64);
    }
}

/// Record how long a pipeline stage took
pub fn stage_duration(stage: &'static str, secs: f64) {
    ::metrics::histogram!("etl_stage_duration_seconds", "stage" => stage).record(secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_contains_recorded_metrics() {
        init().unwrap();
        // Second install is a no-op
        init().unwrap();
        writer::rows_written("ETL_pipeline_cleaned", 3);
        transform::duplicates_removed(1);

        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics").join("run.prom");
        write_snapshot(&path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("etl_writer_rows_written_total"));
        assert!(body.contains("ETL_pipeline_cleaned"));
        assert!(body.contains("etl_transform_duplicates_removed_total"));
    }
}
