use std::cmp;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use errors::*;

const SLEEP_SLICE_MS: u64 = 100;

/// `Shutdown` is a shared flag telling the loops and the job monitors to wind down.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested, draining");
        }
    }

    /// Makes SIGINT and SIGTERM trigger this shutdown instead of killing the process.
    pub fn trigger_on_signals(&self) -> Result<()> {
        for signal in &[SIGINT, SIGTERM] {
            flag::register(*signal, Arc::clone(&self.triggered)).chain_err(|| {
                format!("Unable to install a handler for signal {}", signal)
            })?;
        }
        Ok(())
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in short slices. Returns false as soon as shutdown is triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let slice = cmp::min(deadline - now, Duration::from_millis(SLEEP_SLICE_MS));
            thread::sleep(slice);
        }
    }
}
