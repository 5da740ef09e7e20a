use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Callback invoked after every acknowledged chunk.
pub type ProgressCallback = Box<dyn Fn(TransferProgress) + Send + Sync>;

/// Snapshot of an in-flight upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub acknowledged_bytes: u64,
    pub total_bytes: u64,
    pub chunks_sent: u32,
    pub bytes_per_second: f64,
}

impl TransferProgress {
    /// Acknowledged share of the payload, 0-100.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.acknowledged_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

/// Sliding-window throughput estimate.
pub struct SpeedCalculator {
    samples: Mutex<Vec<(Instant, u64)>>,
    window: Duration,
    max_samples: usize,
}

impl SpeedCalculator {
    /// Creates a calculator keeping at most `max_samples` samples no older
    /// than `window` (defaults: 10 s, 64 samples).
    pub fn new(window: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            window: window.unwrap_or(Duration::from_secs(10)),
            max_samples: max_samples.unwrap_or(64),
        }
    }

    /// Records `bytes` transferred now.
    pub fn add_sample(&self, bytes: u64) {
        let Ok(mut samples) = self.samples.lock() else {
            return;
        };
        let now = Instant::now();
        samples.push((now, bytes));
        samples.retain(|(at, _)| now.duration_since(*at) <= self.window);
        if samples.len() > self.max_samples {
            let excess = samples.len() - self.max_samples;
            samples.drain(..excess);
        }
    }

    /// Average bytes/second across the window; 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(samples) = self.samples.lock() else {
            return 0.0;
        };
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return 0.0;
        };
        let elapsed = last.0.duration_since(first.0);
        if samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        // The first sample marks the window start; its bytes predate it.
        let bytes: u64 = samples.iter().skip(1).map(|(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining` bytes, if any speed is known.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / speed))
    }
}
