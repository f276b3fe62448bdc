//! Timing helpers for the CLI and benchmarks.

use std::time::{Duration, Instant};

/// RAII timer that logs elapsed time on drop.
///
/// # Example
/// ```
/// use foamview::util::Timed;
///
/// let _t = Timed::info("Render").with_throughput(640 * 480, "ray");
/// // ... do work ...
/// // logs "Render: 12.3ms (25.0 Mray/s)" when _t is dropped
/// ```
pub struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
    throughput: Option<(u64, &'static str)>,
}

impl Timed {
    /// Create a new timer that logs at INFO level.
    pub fn info(name: &'static str) -> Self {
        log::debug!("{}...", name);
        Self::at(name, log::Level::Info)
    }

    /// Create a new timer that logs at DEBUG level.
    pub fn debug(name: &'static str) -> Self {
        log::trace!("{}...", name);
        Self::at(name, log::Level::Debug)
    }

    fn at(name: &'static str, level: log::Level) -> Self {
        Self {
            name,
            start: Instant::now(),
            level,
            throughput: None,
        }
    }

    /// Also report `items` processed as a per-second rate.
    pub fn with_throughput(mut self, items: u64, unit: &'static str) -> Self {
        self.throughput = Some((items, unit));
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        match self.throughput {
            Some((items, unit)) => log::log!(
                self.level,
                "{}: {:.3?} ({})",
                self.name,
                elapsed,
                format_rate(items, elapsed, unit)
            ),
            None => log::log!(self.level, "{}: {:.3?}", self.name, elapsed),
        }
    }
}

/// `items` per `elapsed` with an SI prefix, e.g. "3.41 Mray/s".
pub fn format_rate(items: u64, elapsed: Duration, unit: &str) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return format!("inf {}/s", unit);
    }
    let rate = items as f64 / secs;
    let (scaled, prefix) = if rate >= 1e9 {
        (rate / 1e9, "G")
    } else if rate >= 1e6 {
        (rate / 1e6, "M")
    } else if rate >= 1e3 {
        (rate / 1e3, "k")
    } else {
        (rate, "")
    };
    format!("{:.2} {}{}/s", scaled, prefix, unit)
}
