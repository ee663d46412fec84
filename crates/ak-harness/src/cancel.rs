use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CancelToken: cooperative stop flag for one orchestration run
// ---------------------------------------------------------------------------

/// Shared stop flag checked at loop boundaries and around blocking calls.
///
/// Clones share the same flag. [`CancelToken::sleep`] waits on a condition
/// variable so a stop request cuts a settle delay short instead of waiting
/// it out.
///
/// ```ignore
/// let token = CancelToken::new();
/// let worker = token.clone();
/// std::thread::spawn(move || {
///     while !worker.is_cancelled() {
///         do_step();
///         if !worker.sleep(Duration::from_secs(2)) { break; }
///     }
/// });
/// token.request_stop();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop. Idempotent.
    pub fn request_stop(&self) {
        let first = self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok();
        if first {
            info!("stop requested");
            let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.inner.wake.notify_all();
        } else {
            debug!("stop already requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// token was (or became) cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (next, _timeout) = self
                .inner
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
