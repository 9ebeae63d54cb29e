//! Provider lookup and consumer registration.
//!
//! A [`BusContext`] owns every provider of a process, keyed by name. Modules
//! receive the context explicitly, register their consumer endpoints while the
//! process is wiring itself up, and the provider then starts its dispatch
//! loop. Starting moves the provider's listeners into the loop thread, so a
//! registration that arrives afterwards fails instead of racing the loop.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::os::unix::net::UnixStream;

use cmdbus_config::Config;
use tracing::{debug, info};

use crate::client::ConsumerEndpoint;
use crate::dispatch::{self, DispatchHandle};
use crate::error::BusError;
use crate::handler::CommandHandler;
use crate::reader::ReadLimits;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Provider-owned state: the command handler and its listener endpoints.
pub(crate) struct BusHandle {
    pub(crate) name: String,
    pub(crate) handler: Box<dyn CommandHandler>,
    /// Provider halves of the endpoint pairs, in registration order.
    pub(crate) listeners: Vec<UnixStream>,
}

enum Provider {
    Idle(BusHandle),
    Dispatching,
}

/// Process-wide map from provider name to provider state.
pub struct BusContext {
    config: Config,
    providers: HashMap<String, Provider>,
}

impl BusContext {
    /// Creates an empty context.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] when `config` fails validation.
    pub fn new(config: Config) -> Result<Self, BusError> {
        config.validate()?;
        Ok(Self {
            config,
            providers: HashMap::new(),
        })
    }

    /// Configuration shared by every provider in the context.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Defines a provider named `name` served by `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::DuplicateProvider`] when the name is taken.
    pub fn provide(
        &mut self,
        name: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Result<(), BusError> {
        match self.providers.entry(name.into()) {
            Entry::Occupied(entry) => Err(BusError::DuplicateProvider {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                info!(target: REGISTRY_TARGET, provider = %entry.key(), "provider defined");
                let handle = BusHandle {
                    name: entry.key().clone(),
                    handler: Box::new(handler),
                    listeners: Vec::with_capacity(self.config.max_listeners()),
                };
                entry.insert(Provider::Idle(handle));
                Ok(())
            }
        }
    }

    /// Connects a new consumer to the provider called `name`.
    ///
    /// # Errors
    ///
    /// - [`BusError::ProviderNotFound`] when no such provider exists.
    /// - [`BusError::ProviderStarted`] when its dispatch loop already runs.
    /// - [`BusError::CapacityExceeded`] when every listener slot is taken.
    /// - [`BusError::Transport`] when the socket pair cannot be created.
    pub fn register(&mut self, name: &str) -> Result<ConsumerEndpoint, BusError> {
        let capacity = self.config.max_listeners();
        let timeout = self.config.call_timeout();
        let handle = self.idle_provider(name)?;
        if handle.listeners.len() >= capacity {
            return Err(BusError::CapacityExceeded {
                name: name.to_owned(),
                capacity,
            });
        }

        let (listener, consumer) = UnixStream::pair()
            .map_err(|source| BusError::transport("create endpoint pair", source))?;
        let slot = handle.listeners.len();
        handle.listeners.push(listener);
        debug!(target: REGISTRY_TARGET, provider = %name, slot, "consumer registered");
        Ok(ConsumerEndpoint::new(name.to_owned(), slot, consumer, timeout))
    }

    /// Starts the dispatch loop of the provider called `name`.
    ///
    /// # Errors
    ///
    /// - [`BusError::ProviderNotFound`] when no such provider exists.
    /// - [`BusError::ProviderStarted`] when it is already dispatching.
    /// - [`BusError::Spawn`] or [`BusError::Transport`] when the loop thread
    ///   cannot be set up. The provider is consumed in that case.
    pub fn start(&mut self, name: &str) -> Result<DispatchHandle, BusError> {
        let slot = self
            .providers
            .get_mut(name)
            .ok_or_else(|| BusError::ProviderNotFound {
                name: name.to_owned(),
            })?;
        let Provider::Idle(handle) = std::mem::replace(slot, Provider::Dispatching) else {
            return Err(BusError::ProviderStarted {
                name: name.to_owned(),
            });
        };
        dispatch::spawn(
            handle,
            self.config.on_fatal(),
            ReadLimits::from_config(&self.config),
        )
    }

    /// Number of consumers registered with `name`, while it is not yet
    /// dispatching.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> Option<usize> {
        match self.providers.get(name)? {
            Provider::Idle(handle) => Some(handle.listeners.len()),
            Provider::Dispatching => None,
        }
    }

    /// Whether the provider called `name` has started its loop.
    #[must_use]
    pub fn is_dispatching(&self, name: &str) -> bool {
        matches!(self.providers.get(name), Some(Provider::Dispatching))
    }

    fn idle_provider(&mut self, name: &str) -> Result<&mut BusHandle, BusError> {
        match self.providers.get_mut(name) {
            Some(Provider::Idle(handle)) => Ok(handle),
            Some(Provider::Dispatching) => Err(BusError::ProviderStarted {
                name: name.to_owned(),
            }),
            None => Err(BusError::ProviderNotFound {
                name: name.to_owned(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn listener(&self, name: &str, slot: usize) -> Option<&UnixStream> {
        match self.providers.get(name)? {
            Provider::Idle(handle) => handle.listeners.get(slot),
            Provider::Dispatching => None,
        }
    }
}

#[cfg(test)]
mod tests;
