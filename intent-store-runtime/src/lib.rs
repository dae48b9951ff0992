//! # Intent Store Runtime
//!
//! Runtime abstraction used by the intent store.
//!
//! The store needs exactly two things from its environment:
//! - **Time**: wall-clock milliseconds for version stamps
//! - **Blocking execution**: phase chains call into the dataplane synchronously,
//!   so they must run off the thread that dispatches map events
//!
//! ## Feature Flags
//!
//! - `tokio` (default): Tokio implementation backed by the blocking thread pool

/// A unit of blocking work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runtime trait for the store
pub trait StoreRuntime: Send + Sync + 'static {
    /// Current wall time in milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;

    /// Run `job` on a thread that may block
    fn spawn_blocking(&self, job: Job);
}

#[cfg(feature = "tokio")]
pub mod tokio_runtime {
    //! Tokio-based runtime implementation

    use super::*;
    use tokio::runtime::Handle;

    /// Tokio runtime wrapper
    #[derive(Debug, Clone)]
    pub struct TokioRuntime {
        handle: Handle,
    }

    impl TokioRuntime {
        /// Wrap an explicit runtime handle
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Wrap the runtime the caller is running on, if any
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl StoreRuntime for TokioRuntime {
        fn now_millis(&self) -> u64 {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64
        }

        fn spawn_blocking(&self, job: Job) {
            // Detached: completion is observed through the store, not the handle.
            drop(self.handle.spawn_blocking(job));
        }
    }
}

/// Mock runtime for testing
pub mod mock_runtime {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};
    use core::time::Duration;
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    /// Deterministic runtime: a manually advanced clock and jobs that either
    /// run inline or wait for [`MockRuntime::run_pending`].
    #[derive(Default)]
    pub struct MockRuntime {
        current_time_ms: AtomicU64,
        deferred: bool,
        queue: Mutex<VecDeque<Job>>,
    }

    impl MockRuntime {
        /// Runtime running every job inline, at spawn time
        pub fn new() -> Self {
            Self::default()
        }

        /// Runtime queueing jobs until [`MockRuntime::run_pending`]
        pub fn deferred() -> Self {
            Self {
                deferred: true,
                ..Self::default()
            }
        }

        /// Set the clock
        pub fn set_time(&self, millis: u64) {
            self.current_time_ms.store(millis, Ordering::SeqCst);
        }

        /// Advance the mock clock
        pub fn advance(&self, duration: Duration) {
            self.current_time_ms
                .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }

        /// Number of queued jobs
        pub fn queued(&self) -> usize {
            self.queue.lock().len()
        }

        /// Run queued jobs, including ones they spawn; returns how many ran
        pub fn run_pending(&self) -> usize {
            let mut ran = 0;
            loop {
                let job = match self.queue.lock().pop_front() {
                    Some(job) => job,
                    None => return ran,
                };
                job();
                ran += 1;
            }
        }
    }

    impl StoreRuntime for MockRuntime {
        fn now_millis(&self) -> u64 {
            self.current_time_ms.load(Ordering::SeqCst)
        }

        fn spawn_blocking(&self, job: Job) {
            if self.deferred {
                self.queue.lock().push_back(job);
            } else {
                job();
            }
        }
    }
}

/// Get the default runtime based on features
#[cfg(feature = "tokio")]
pub fn default_runtime() -> Option<tokio_runtime::TokioRuntime> {
    tokio_runtime::TokioRuntime::current()
}
