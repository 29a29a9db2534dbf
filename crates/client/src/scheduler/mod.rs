//! Signature-keyed call scheduler.
//!
//! Handlers registered against a high-frequency host event are wrapped in a
//! [`Debounced`]. Each call is reduced to a *signature*; per signature the
//! scheduler keeps a window that starts with the first call and ends `wait`
//! later, at the next frame (or fallback poll) after that deadline:
//!
//! - the first call of a window runs immediately
//! - the next call is queued until the window ends
//! - further calls only replace the queued arguments, so the deferred run
//!   sees the latest ones
//!
//! When a window ends with a call queued, that call runs as the first call of
//! a new window. A window that ends with nothing queued leaves the signature
//! idle, and the next call runs immediately again.

mod frames;

pub use frames::{FixedRateFrames, FrameSource, HostFrames};

use pageflow_core::Error;
use pageflow_core::config::SchedulerConfig;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;

type Deferred = Box<dyn FnOnce() -> Result<(), Error> + Send>;
type Handler<A> = Arc<dyn Fn(A) -> Result<(), Error> + Send + Sync>;
type SignatureFn<A> = Arc<dyn Fn(&str, &A) -> Result<String, Error> + Send + Sync>;

/// What a [`Debounced::call`] did with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The handler ran before `call` returned.
    Executed,
    /// The call will run when the signature's window ends.
    Queued,
    /// A call was already queued; only its arguments were replaced.
    Coalesced,
}

/// A deferred call and the window length of the wrapper that queued it.
struct Pending {
    wait: Duration,
    run: Deferred,
}

#[derive(Default)]
struct Windows {
    executed: HashSet<String>,
    queued: HashMap<String, Pending>,
}

struct Inner {
    frames: Arc<dyn FrameSource>,
    fallback_poll: Duration,
    runtime: Handle,
    windows: Mutex<Windows>,
    next_id: AtomicU64,
}

impl Inner {
    fn windows(&self) -> MutexGuard<'_, Windows> {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait at least one frame, and until `wait` has elapsed.
    async fn wait_for_boundary(&self, wait: Duration) {
        let start = Instant::now();
        loop {
            if self.frames.is_rendering() {
                self.frames.next_frame().await;
            } else {
                tokio::time::sleep(self.fallback_poll).await;
            }
            if start.elapsed() >= wait {
                break;
            }
        }
    }

    fn arm(self: &Arc<Self>, signature: String, wait: Duration) {
        let inner = self.clone();
        self.runtime.spawn(async move {
            inner.wait_for_boundary(wait).await;
            inner.end_window(signature);
        });
    }

    fn end_window(self: &Arc<Self>, signature: String) {
        let pending = {
            let mut windows = self.windows();
            windows.executed.remove(&signature);
            let pending = windows.queued.remove(&signature);
            if pending.is_some() {
                windows.executed.insert(signature.clone());
            }
            pending
        };

        let Some(Pending { wait, run }) = pending else {
            tracing::trace!(%signature, "window closed idle");
            return;
        };

        self.arm(signature.clone(), wait);
        if let Err(e) = run() {
            tracing::error!(%signature, error = %e, "deferred call failed");
        }
    }
}

/// Owns the windows of every handler scheduled through it.
///
/// Clones share state. Each feature should hold its own scheduler so that
/// signatures of unrelated features never share windows.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let windows = self.inner.windows();
        f.debug_struct("Scheduler")
            .field("fallback_poll", &self.inner.fallback_poll)
            .field("open_windows", &windows.executed.len())
            .field("queued", &windows.queued.len())
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoRuntime` when called outside a runtime.
    pub fn new(frames: Arc<dyn FrameSource>, config: &SchedulerConfig) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|e| Error::NoRuntime(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                frames,
                fallback_poll: config.fallback_poll(),
                runtime,
                windows: Mutex::new(Windows::default()),
                next_id: AtomicU64::new(0),
            }),
        })
    }

    /// Create a scheduler paced by [`FixedRateFrames`] at the configured interval.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, Error> {
        Self::new(Arc::new(FixedRateFrames::new(config.frame_interval())), config)
    }

    /// Wrap `handler` so that it runs at most once per window per signature.
    ///
    /// By default every call to the returned wrapper shares one signature,
    /// unique to this wrapper; see [`Debounced::with_args_in_signature`] and
    /// [`Debounced::with_signature`].
    pub fn schedule<A, F>(&self, name: &str, wait: Duration, handler: F) -> Debounced<A>
    where
        A: Send + 'static,
        F: Fn(A) -> Result<(), Error> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        Debounced {
            scheduler: self.clone(),
            identity: format!("{name}#{id}").into(),
            wait,
            handler: Arc::new(handler),
            signature: Arc::new(|identity: &str, _: &A| -> Result<String, Error> { Ok(identity.to_string()) }),
        }
    }

    /// Number of calls waiting for their window to end.
    pub fn pending(&self) -> usize {
        self.inner.windows().queued.len()
    }

    /// Whether no signature has an open window.
    pub fn is_idle(&self) -> bool {
        let windows = self.inner.windows();
        windows.executed.is_empty() && windows.queued.is_empty()
    }
}

/// A handler wrapped by [`Scheduler::schedule`].
pub struct Debounced<A> {
    scheduler: Scheduler,
    identity: Arc<str>,
    wait: Duration,
    handler: Handler<A>,
    signature: SignatureFn<A>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            identity: self.identity.clone(),
            wait: self.wait,
            handler: self.handler.clone(),
            signature: self.signature.clone(),
        }
    }
}

impl<A> std::fmt::Debug for Debounced<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debounced")
            .field("identity", &self.identity)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Include the JSON form of the arguments in the signature, so calls
    /// with different arguments get independent windows.
    pub fn with_args_in_signature(mut self) -> Self
    where
        A: Serialize,
    {
        self.signature = Arc::new(|identity: &str, args: &A| -> Result<String, Error> {
            let args = serde_json::to_string(args).map_err(|e| Error::Signature(e.to_string()))?;
            Ok(format!("{identity}:{args}"))
        });
        self
    }

    /// Derive signatures with `derive(identity, args)`.
    ///
    /// An error from `derive` is returned by [`Debounced::call`] and the
    /// handler does not run.
    pub fn with_signature<S>(mut self, derive: S) -> Self
    where
        S: Fn(&str, &A) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.signature = Arc::new(derive);
        self
    }

    /// This wrapper's identity, the default signature.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Call the wrapped handler, subject to its signature's window.
    ///
    /// # Errors
    ///
    /// Returns signature derivation errors, and handler errors for calls
    /// that run immediately. Errors of deferred runs are logged instead.
    pub fn call(&self, args: A) -> Result<CallOutcome, Error> {
        let signature = (self.signature)(&self.identity, &args)?;
        let inner = &self.scheduler.inner;

        let mut windows = inner.windows();
        if windows.executed.insert(signature.clone()) {
            drop(windows);
            inner.arm(signature, self.wait);
            (self.handler)(args)?;
            return Ok(CallOutcome::Executed);
        }

        let handler = self.handler.clone();
        let pending = Pending { wait: self.wait, run: Box::new(move || handler(args)) };
        let outcome = match windows.queued.insert(signature, pending) {
            None => CallOutcome::Queued,
            Some(_) => CallOutcome::Coalesced,
        };
        Ok(outcome)
    }
}
