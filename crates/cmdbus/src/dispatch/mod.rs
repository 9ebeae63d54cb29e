//! Provider-side dispatch loop.
//!
//! One thread per provider waits on `poll(2)` for any of its listeners to
//! become readable, then serves each ready listener in registration order:
//! read and assemble the command, run the handler, write the reply. Cycles
//! never overlap, so consumers are serialised by the loop itself and a slow
//! handler delays everyone behind it.
//!
//! The loop also polls a private wake endpoint. [`DispatchHandle::shutdown`]
//! writes to it to stop the loop between cycles.

mod handle;

use std::io::Read;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::thread;

use cmdbus_config::FatalPolicy;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, debug_span, error, info, warn};

use crate::error::BusError;
use crate::fatal;
use crate::handler::CommandHandler;
use crate::reader::{self, ReadLimits};
use crate::registry::BusHandle;
use crate::wire;

pub use self::handle::DispatchHandle;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Moves `bus` into a new dispatch thread.
pub(crate) fn spawn(
    bus: BusHandle,
    policy: FatalPolicy,
    limits: ReadLimits,
) -> Result<DispatchHandle, BusError> {
    let (waker, wake) = UnixStream::pair()
        .map_err(|source| BusError::transport("create wake endpoint", source))?;
    let name = bus.name.clone();
    let worker = thread::Builder::new()
        .name(format!("cmdbus-{name}"))
        .spawn(move || run(bus, wake, policy, limits))
        .map_err(|source| BusError::Spawn {
            name: name.clone(),
            source: source.into(),
        })?;
    Ok(DispatchHandle::new(name, waker, worker))
}

fn run(
    bus: BusHandle,
    wake: UnixStream,
    policy: FatalPolicy,
    limits: ReadLimits,
) -> Result<(), BusError> {
    let mut dispatcher = Dispatcher::new(bus, wake, limits);
    info!(
        target: DISPATCH_TARGET,
        provider = %dispatcher.name,
        listeners = dispatcher.listeners.len(),
        "dispatch loop started"
    );
    match dispatcher.run() {
        Ok(()) => {
            info!(target: DISPATCH_TARGET, provider = %dispatcher.name, "dispatch loop stopped");
            Ok(())
        }
        Err(err) => match policy {
            FatalPolicy::Abort => fatal::terminate(&err),
            FatalPolicy::Stop => {
                error!(
                    target: DISPATCH_TARGET,
                    provider = %dispatcher.name,
                    error = %err,
                    kind = ?err.kind(),
                    "dispatch loop stopped on fatal error"
                );
                Err(err)
            }
        },
    }
}

struct Listener {
    stream: UnixStream,
    open: bool,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Wake,
    Listener(usize),
}

#[derive(Debug, Default)]
struct Readiness {
    wake: bool,
    listeners: Vec<usize>,
}

enum Step {
    Continue,
    Stop,
}

struct Dispatcher {
    name: String,
    handler: Box<dyn CommandHandler>,
    listeners: Vec<Listener>,
    wake: Option<UnixStream>,
    limits: ReadLimits,
}

impl Dispatcher {
    fn new(bus: BusHandle, wake: UnixStream, limits: ReadLimits) -> Self {
        let BusHandle {
            name,
            handler,
            listeners,
        } = bus;
        Self {
            name,
            handler,
            listeners: listeners
                .into_iter()
                .map(|stream| Listener { stream, open: true })
                .collect(),
            wake: Some(wake),
            limits,
        }
    }

    fn run(&mut self) -> Result<(), BusError> {
        loop {
            if !self.has_sources() {
                info!(
                    target: DISPATCH_TARGET,
                    provider = %self.name,
                    "no endpoints left to serve"
                );
                return Ok(());
            }
            let readiness = self.wait()?;
            if readiness.wake
                && let Step::Stop = self.drain_wake()?
            {
                return Ok(());
            }
            for slot in readiness.listeners {
                self.dispatch(slot)?;
            }
        }
    }

    fn has_sources(&self) -> bool {
        self.wake.is_some() || self.listeners.iter().any(|listener| listener.open)
    }

    /// Blocks until at least one source is readable.
    fn wait(&self) -> Result<Readiness, BusError> {
        let mut sources = Vec::with_capacity(self.listeners.len() + 1);
        let mut fds = Vec::with_capacity(self.listeners.len() + 1);
        if let Some(wake) = &self.wake {
            sources.push(Source::Wake);
            fds.push(PollFd::new(wake.as_fd(), PollFlags::POLLIN));
        }
        for (slot, listener) in self.listeners.iter().enumerate() {
            if listener.open {
                sources.push(Source::Listener(slot));
                fds.push(PollFd::new(listener.stream.as_fd(), PollFlags::POLLIN));
            }
        }

        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) => {}
                Err(source) => return Err(BusError::Multiplex { source }),
            }
        }

        let mut readiness = Readiness::default();
        for (fd, source) in fds.iter().zip(sources) {
            let revents = fd.revents().unwrap_or_else(PollFlags::empty);
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                return Err(BusError::transport(
                    "poll endpoint",
                    std::io::Error::other(format!("{source:?} reported {revents:?}")),
                ));
            }
            if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP) {
                match source {
                    Source::Wake => readiness.wake = true,
                    Source::Listener(slot) => readiness.listeners.push(slot),
                }
            }
        }
        Ok(readiness)
    }

    fn drain_wake(&mut self) -> Result<Step, BusError> {
        let Some(wake) = self.wake.as_ref() else {
            return Ok(Step::Continue);
        };
        let mut byte = [0_u8; 1];
        let mut stream = wake;
        match stream.read(&mut byte) {
            Ok(0) => {
                // The handle was dropped; the loop keeps running detached.
                debug!(target: DISPATCH_TARGET, provider = %self.name, "dispatch handle detached");
                self.wake = None;
                Ok(Step::Continue)
            }
            Ok(_) => {
                info!(target: DISPATCH_TARGET, provider = %self.name, "shutdown requested");
                Ok(Step::Stop)
            }
            Err(source) => Err(BusError::transport("read wake endpoint", source)),
        }
    }

    /// Serves one request on listener `slot`.
    fn dispatch(&mut self, slot: usize) -> Result<(), BusError> {
        let span = debug_span!(target: DISPATCH_TARGET, "dispatch", provider = %self.name, slot);
        let _guard = span.enter();
        let Some(listener) = self.listeners.get_mut(slot) else {
            return Ok(());
        };

        let mut stream = &listener.stream;
        let command = match reader::read_command(&mut stream, self.limits) {
            Ok(Some(command)) => command,
            Ok(None) => {
                warn!(target: DISPATCH_TARGET, "consumer disconnected; listener retired");
                listener.open = false;
                return Ok(());
            }
            Err(error) if error.is_peer_gone() => {
                warn!(target: DISPATCH_TARGET, error = %error, "consumer reset; listener retired");
                listener.open = false;
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        debug!(target: DISPATCH_TARGET, command_len = command.len(), "command received");

        let mut result = self.handler.handle(&command);
        if result.answer().len() > wire::MAX_ANSWER_LEN {
            warn!(
                target: DISPATCH_TARGET,
                answer_len = result.answer().len(),
                "answer exceeds the reply framing; truncated"
            );
            result = wire::truncate_answer(result, wire::MAX_ANSWER_LEN);
        }
        debug!(
            target: DISPATCH_TARGET,
            status = %result.status(),
            answer_len = result.answer().len(),
            "reply ready"
        );
        match wire::write_reply(&mut stream, &result) {
            // A consumer that timed out or dropped its endpoint mid-call is
            // gone; the others keep their provider.
            Err(error) if error.is_peer_gone() => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "consumer left before its reply; listener retired"
                );
                listener.open = false;
                Ok(())
            }
            outcome => outcome,
        }
    }
}
