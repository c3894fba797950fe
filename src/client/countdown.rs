//! Reusable countdown timer.
//!
//! Drives the remaining-time display on both the initiator's OTP screen and
//! the approver's review view. One tick per wall-clock second while running;
//! reaching zero stops the timer and fires the expiry callback exactly once
//! per armed run. Display layers derive urgency bands from `remaining()` on
//! their own.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct CountdownInner {
    initial: u32,
    remaining: AtomicU32,
    running: AtomicBool,
    expired: AtomicBool,
    on_expire: Box<dyn Fn() + Send + Sync>,
}

impl CountdownInner {
    /// One simulated second. The run task calls this while running; tests
    /// drive it directly.
    fn tick(&self) {
        let remaining = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
        let Ok(previous) = remaining else {
            // Already at zero; nothing decrements below it.
            return;
        };
        if previous == 1 {
            self.running.store(false, Ordering::SeqCst);
            if !self.expired.swap(true, Ordering::SeqCst) {
                (self.on_expire)();
            }
        }
    }
}

pub struct Countdown {
    inner: Arc<CountdownInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    pub fn new(initial_seconds: u32, on_expire: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(CountdownInner {
                initial: initial_seconds,
                remaining: AtomicU32::new(initial_seconds),
                running: AtomicBool::new(false),
                expired: AtomicBool::new(false),
                on_expire: Box::new(on_expire),
            }),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.inner.remaining.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.inner.expired.load(Ordering::SeqCst)
    }

    /// Start ticking. Idempotent: overlapping calls never create a second
    /// tick source.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.remaining() == 0 {
            self.inner.running.store(false, Ordering::SeqCst);
            return;
        }
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                inner.tick();
                if inner.remaining.load(Ordering::SeqCst) == 0 {
                    break;
                }
            }
        });
        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    /// Stop ticking; `remaining()` keeps its value.
    pub fn pause(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }

    /// Stop and restore `initial_seconds`; a later `start()` re-arms both
    /// the ticking and the expiry callback.
    pub fn reset(&self) {
        self.pause();
        self.inner
            .remaining
            .store(self.inner.initial, Ordering::SeqCst);
        self.inner.expired.store(false, Ordering::SeqCst);
    }

    /// One simulated second, for callers that drive time themselves.
    pub fn tick(&self) {
        self.inner.tick();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.pause();
    }
}

/// Render seconds as `MM:SS` for countdown displays.
#[must_use]
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
