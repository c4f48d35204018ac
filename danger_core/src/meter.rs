use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Process-wide frame counters.
#[derive(Default)]
pub struct Meter {
    submitted_frames: AtomicU64,
    dropped_frames: AtomicU64,
    processed_frames: AtomicU64,
    alerts: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            submitted_frames: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            processed_frames: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
        }
    }

    pub fn tick_submitted(&self) {
        self.submitted_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_dropped(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_processed(&self) {
        self.processed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_submitted(&self) -> u64 {
        self.submitted_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_dropped(&self) -> u64 {
        self.dropped_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_processed(&self) -> u64 {
        self.processed_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_alerts(&self) -> u64 {
        self.alerts.swap(0, Ordering::Relaxed)
    }
}

pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let submitted = METER.get_reset_submitted();
            let dropped = METER.get_reset_dropped();
            let processed = METER.get_reset_processed();
            let alerts = METER.get_reset_alerts();
            let elapsed = start.elapsed().as_secs_f32();

            if submitted > 0 {
                log::info!(
                    "Frames per second: {:.2} submitted, {:.2} dropped, {:.2} processed",
                    submitted as f32 / elapsed,
                    dropped as f32 / elapsed,
                    processed as f32 / elapsed
                );
            }
            if alerts > 0 {
                log::info!("Alerts in the last {elapsed:.1}s: {alerts}");
            }
        }
    })
}
