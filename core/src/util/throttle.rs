//! Call throttling with a guaranteed run interval.
//!
//! Each call cancels the pending trailing call. If more than `must_run` has
//! passed since the current window opened, the function runs immediately
//! and a new window opens; otherwise it is scheduled `delay` from now.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Window {
    pending: Option<JoinHandle<()>>,
    started: Option<Instant>,
}

/// Throttled wrapper around `f`. Calls must happen inside a tokio runtime.
pub struct Throttle<A> {
    f: Arc<dyn Fn(A) + Send + Sync + 'static>,
    delay: Duration,
    must_run: Duration,
    window: Mutex<Window>,
}

impl<A> std::fmt::Debug for Throttle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("delay", &self.delay)
            .field("must_run", &self.must_run)
            .finish_non_exhaustive()
    }
}

impl<A: Send + 'static> Throttle<A> {
    pub fn new(delay: Duration, must_run: Duration, f: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            f: Arc::new(f),
            delay,
            must_run,
            window: Mutex::new(Window {
                pending: None,
                started: None,
            }),
        }
    }

    pub fn call(&self, args: A) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = window.pending.take() {
            pending.abort();
        }

        let now = Instant::now();
        let started = *window.started.get_or_insert(now);
        if now.duration_since(started) > self.must_run {
            window.started = Some(now);
            drop(window);
            (self.f)(args);
            return;
        }

        let f = self.f.clone();
        let delay = self.delay;
        window.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f(args);
        }));
    }
}

impl<A> Drop for Throttle<A> {
    fn drop(&mut self) {
        let window = self.window.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = window.pending.take() {
            pending.abort();
        }
    }
}
