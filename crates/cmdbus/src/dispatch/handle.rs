//! Owner-side control of a running dispatch loop.

use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::thread::JoinHandle;

use tracing::debug;

use super::DISPATCH_TARGET;
use crate::error::BusError;

/// Handle to a provider's dispatch thread, returned by
/// [`BusContext::start`](crate::BusContext::start).
///
/// Dropping the handle detaches the thread; the loop keeps serving its
/// consumers until every one of them has gone.
#[derive(Debug)]
pub struct DispatchHandle {
    name: String,
    waker: UnixStream,
    thread: Option<JoinHandle<Result<(), BusError>>>,
}

impl DispatchHandle {
    pub(super) const fn new(
        name: String,
        waker: UnixStream,
        thread: JoinHandle<Result<(), BusError>>,
    ) -> Self {
        Self {
            name,
            waker,
            thread: Some(thread),
        }
    }

    /// Name of the provider this loop serves.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the loop to stop once the current cycle completes.
    ///
    /// Requests already read are answered first. Calling this after the loop
    /// has ended is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] when the wake endpoint cannot be
    /// written for a reason other than the loop having exited.
    pub fn shutdown(&self) -> Result<(), BusError> {
        let mut waker = &self.waker;
        match waker.write_all(&[1]) {
            Ok(()) => {
                debug!(target: DISPATCH_TARGET, provider = %self.name, "shutdown signalled");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(error) => Err(BusError::transport("signal shutdown", error)),
        }
    }

    /// Whether the loop thread has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the loop thread to return and yields its outcome.
    ///
    /// `Ok(())` follows a [`shutdown`](Self::shutdown) or the departure of
    /// every consumer. Under [`FatalPolicy::Stop`](crate::FatalPolicy::Stop)
    /// the error that stopped the loop is returned here.
    ///
    /// # Errors
    ///
    /// Returns the loop's fatal error, or [`BusError::LoopPanicked`] when the
    /// handler panicked.
    pub fn join(mut self) -> Result<(), BusError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.join().map_err(|_| BusError::LoopPanicked {
            name: self.name.clone(),
        })?
    }
}
