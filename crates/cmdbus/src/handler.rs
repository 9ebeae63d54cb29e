//! Provider callback abstraction.

use std::sync::Arc;

use crate::status::CallResult;

/// Handles commands delivered to a provider.
///
/// One handler serves every consumer of its provider. The dispatch loop calls
/// it from a single thread, but the handler is shared with whoever built it,
/// so any state it mutates needs its own synchronisation.
#[cfg_attr(test, mockall::automock)]
pub trait CommandHandler: Send + Sync {
    /// Produces the reply for one assembled command.
    fn handle(&self, command: &str) -> CallResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&str) -> CallResult + Send + Sync,
{
    fn handle(&self, command: &str) -> CallResult {
        self(command)
    }
}

/// Handler pairing a callback with explicit private data.
///
/// Built by [`with_private`].
pub struct WithPrivate<T, F> {
    private: Arc<T>,
    callback: F,
}

/// Wraps `callback` so every invocation receives `private`.
///
/// The provider keeps its own clone of the `Arc` to observe or update the
/// same data outside the dispatch loop.
#[must_use]
pub fn with_private<T, F>(private: Arc<T>, callback: F) -> WithPrivate<T, F>
where
    T: Send + Sync,
    F: Fn(&T, &str) -> CallResult + Send + Sync,
{
    WithPrivate { private, callback }
}

impl<T, F> CommandHandler for WithPrivate<T, F>
where
    T: Send + Sync,
    F: Fn(&T, &str) -> CallResult + Send + Sync,
{
    fn handle(&self, command: &str) -> CallResult {
        (self.callback)(&self.private, command)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::status::Status;

    #[test]
    fn closures_act_as_handlers() {
        let handler = |command: &str| CallResult::ok(command.to_uppercase());
        assert_eq!(handler.handle("ping").answer(), "PING");
    }

    #[test]
    fn private_data_reaches_every_invocation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = with_private(Arc::clone(&seen), |seen: &Mutex<Vec<String>>, command| {
            let mut guard = seen.lock().expect("lock seen commands");
            guard.push(command.to_owned());
            CallResult::new(Status::OK, guard.len().to_string())
        });

        assert_eq!(handler.handle("one").answer(), "1");
        assert_eq!(handler.handle("two").answer(), "2");
        assert_eq!(
            *seen.lock().expect("lock seen commands"),
            vec!["one".to_owned(), "two".to_owned()]
        );
    }
}
