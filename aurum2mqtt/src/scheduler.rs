use log::{debug, info, warn};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// The Meetstekker refreshes its smart meter readings about every ten seconds.
pub const DEVICE_REFRESH: Duration = Duration::from_secs(10);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Triggers cycles on a fixed period from a single thread.
///
/// The first cycle runs immediately. Cycles never overlap: ticks that fall
/// inside an overrunning cycle are dropped and the schedule resumes at the
/// next period boundary.
pub struct CycleScheduler {
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(interval: Duration) -> Self {
        if interval < DEVICE_REFRESH {
            warn!(
                "update interval of {:.2}s is shorter than the device refresh of {:.2}s",
                interval.as_secs_f64(),
                DEVICE_REFRESH.as_secs_f64()
            );
        }
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to wait after a cycle that took `elapsed`.
    pub fn wait_after(&self, elapsed: Duration) -> Duration {
        if elapsed < self.interval {
            return self.interval - elapsed;
        }
        let interval = self.interval.as_nanos();
        let skipped = elapsed.as_nanos() / interval;
        warn!("cycle took {:.2}s, skipping {skipped} tick(s)", elapsed.as_secs_f64());
        let remainder = interval - elapsed.as_nanos() % interval;
        Duration::from_nanos(u64::try_from(remainder).unwrap_or(u64::MAX))
    }

    /// Calls `cycle` once per period until a message arrives on `shutdown`.
    /// Dropping the sending side does not stop the scheduler.
    pub fn run<F: FnMut()>(&self, shutdown: &Receiver<()>, mut cycle: F) {
        let mut shutdown_connected = true;
        loop {
            let started = Instant::now();
            cycle();
            let wait = self.wait_after(started.elapsed());
            debug!("next cycle in {:.2}s", wait.as_secs_f64());

            if !shutdown_connected {
                thread::sleep(wait);
                continue;
            }
            match shutdown.recv_timeout(wait) {
                Ok(()) => {
                    info!("shutdown requested");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("shutdown channel closed, running until the process is killed");
                    shutdown_connected = false;
                    thread::sleep(wait);
                }
            }
        }
    }
}

impl Default for CycleScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
