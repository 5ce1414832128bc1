//! Cooperative shutdown and liveness signalling between the controlling
//! thread and the ingest worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared shutdown flags observed by the worker once per loop iteration.
///
/// `finish` asks the worker to drain the input queue and stop; `stop`
/// asks for an immediate stop that skips any remaining items.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    finish: AtomicBool,
    stop: AtomicBool,
}

impl ShutdownSignal {
    /// Create a signal with neither flag raised.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raise the drain-and-stop flag.
    pub fn request_finish(&self) {
        self.finish.store(true, Ordering::SeqCst);
    }

    /// Raise the immediate-stop flag.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether a drain-and-stop was requested.
    pub fn finish_requested(&self) -> bool {
        self.finish.load(Ordering::SeqCst)
    }

    /// Whether an immediate stop was requested.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Keep-alive token held by the controlling thread.
///
/// The worker holds the matching [`LivenessProbe`]; when the guard is
/// dropped (the controlling thread unwound or exited), the probe reports
/// dead and the worker stops immediately rather than spinning on a feed
/// nobody is consuming.
#[derive(Debug)]
pub struct LivenessGuard {
    token: Arc<()>,
}

impl LivenessGuard {
    /// Create a guard owned by the calling thread.
    pub fn new() -> Self {
        Self { token: Arc::new(()) }
    }

    /// A probe tied to this guard's lifetime.
    pub fn probe(&self) -> LivenessProbe {
        LivenessProbe {
            token: Arc::downgrade(&self.token),
        }
    }
}

impl Default for LivenessGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side view of a [`LivenessGuard`].
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    token: Weak<()>,
}

impl LivenessProbe {
    /// `true` while the guard is still alive.
    pub fn is_alive(&self) -> bool {
        self.token.strong_count() > 0
    }
}
