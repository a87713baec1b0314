use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// Best-effort redelivery guard: accepts only events strictly newer than
/// the last accepted one. Not persisted; a restart accepts the next event.
pub struct DedupGuard {
    watermark: Mutex<f64>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self {
            watermark: Mutex::new(f64::NEG_INFINITY),
        }
    }

    /// Check-and-advance under the lock. Ties and NaN are rejected.
    pub fn accept(&self, ts: f64) -> bool {
        let mut watermark = self.watermark.lock().unwrap_or_else(PoisonError::into_inner);
        if ts > *watermark {
            *watermark = ts;
            true
        } else {
            trace!("Dropping event at {} (watermark {})", ts, *watermark);
            false
        }
    }

    #[cfg(test)]
    pub fn watermark(&self) -> f64 {
        *self.watermark.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new()
    }
}
