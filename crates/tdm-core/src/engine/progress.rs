//! Transfer progress (bytes done, rate, ETA) as computed by engines.
//!
//! rate = bytes_done / elapsed_secs and ETA = (total_bytes - bytes_done) / rate.

/// Snapshot of transfer progress for one task.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Bytes written so far.
    pub bytes_done: u64,
    /// Total size in bytes, if the source advertised it.
    pub total_bytes: Option<u64>,
    /// Elapsed time since the transfer started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Average transfer rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if size or rate is unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }
}
