//! Deferred results.
//!
//! [`Pending`] is the handle returned by operations that perform I/O: the
//! caller receives it immediately and calls [`Pending::get`] when it needs the
//! value. A handle is either already resolved, a deferred computation run on
//! `get`, or a worker thread started eagerly whose result `get` waits for.

use std::fmt;
use std::sync::mpsc;
use std::thread;

use crate::PatchError;

type Job<T> = Box<dyn FnOnce() -> Result<T, PatchError> + Send>;

enum State<T> {
    Ready(Result<T, PatchError>),
    Deferred(Job<T>),
    Spawned(mpsc::Receiver<Result<T, PatchError>>),
}

/// A value that becomes available after an operation completes.
#[must_use = "a Pending does nothing useful until `get` is called"]
pub struct Pending<T> {
    state: State<T>,
}

impl<T: Send + 'static> Pending<T> {
    /// A handle that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// A handle that is already resolved with an error.
    pub fn failed(error: PatchError) -> Self {
        Self::from_result(Err(error))
    }

    /// A handle resolved with `result`.
    pub fn from_result(result: Result<T, PatchError>) -> Self {
        Self {
            state: State::Ready(result),
        }
    }

    /// A handle that runs `job` on the calling thread when [`get`](Self::get)
    /// is called.
    pub fn deferred(job: impl FnOnce() -> Result<T, PatchError> + Send + 'static) -> Self {
        Self {
            state: State::Deferred(Box::new(job)),
        }
    }

    /// A handle that starts `job` on a worker thread right away.
    ///
    /// If the thread cannot be started, the handle resolves to a fetch error.
    pub fn spawn(
        name: &str,
        job: impl FnOnce() -> Result<T, PatchError> + Send + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        let spawned = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                // Receiver may be gone if the handle was dropped
                let _ = tx.send(job());
            });

        match spawned {
            Ok(_) => Self {
                state: State::Spawned(rx),
            },
            Err(e) => Self::failed(PatchError::fetch_with_source(
                format!("failed to start worker thread {name}"),
                e,
            )),
        }
    }

    /// Whether [`get`](Self::get) would return without doing any work.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Block until the value is available.
    pub fn get(self) -> Result<T, PatchError> {
        match self.state {
            State::Ready(result) => result,
            State::Deferred(job) => job(),
            State::Spawned(rx) => rx
                .recv()
                .unwrap_or_else(|_| Err(PatchError::fetch("worker exited without a result"))),
        }
    }

    /// Chain a fallible step onto the eventual value.
    ///
    /// The step runs on [`get`](Pending::get), even when this handle is
    /// already resolved.
    pub fn and_then<U: Send + 'static>(
        self,
        f: impl FnOnce(T) -> Result<U, PatchError> + Send + 'static,
    ) -> Pending<U> {
        Pending::deferred(move || self.get().and_then(f))
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(Ok(_)) => "ready",
            State::Ready(Err(_)) => "failed",
            State::Deferred(_) => "deferred",
            State::Spawned(_) => "spawned",
        };
        f.debug_struct("Pending").field("state", &state).finish()
    }
}
