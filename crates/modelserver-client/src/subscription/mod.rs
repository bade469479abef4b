//! Per-model subscription channels and push notification dispatch.
//!
//! The [`SubscriptionManager`] keeps at most one channel per model
//! identifier. The host's transport reports channel events back through the
//! `handle_*` methods; each inbound message is decoded, classified into a
//! [`Notification`] and delivered to exactly one listener callback.
//!
//! Lifecycle per identifier: `Opening` on subscribe, `Open` once the
//! transport reports the open event, `Error` after a transport error, and
//! removed on unsubscribe or when the transport closes.
//!
//! Every registration carries a generation number in its
//! [`ChannelAddress`]. Events echoing an address from a superseded
//! registration are ignored, so a late close from an earlier channel never
//! tears down its replacement.

mod listener;
mod notification;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use modelserver_config::{ApiVersion, Config, Format};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

pub use self::listener::SubscriptionListener;
pub use self::notification::{
    CloseNotification, CommandExecutionResult, ErrorNotification, ExecutionKind, FullModel,
    IncrementalUpdate, Notification,
};
use crate::client::paths::{FORMAT, MODEL_URI, Route};
use crate::envelope::Envelope;
use crate::errors::ModelServerError;
use crate::transport::{Channel, ChannelAddress, ChannelFactory, TransportError};

/// Tracing target for subscription activity.
pub(crate) const SUBSCRIPTION_TARGET: &str = "modelserver_client::subscription";

const TIMEOUT: &str = "timeout";
const LIVE_VALIDATION: &str = "livevalidation";

/// Parameters of a subscription request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Format of pushed models; the configured default when `None`.
    pub format: Option<Format>,
    /// Idle time after which the server closes the channel.
    pub timeout: Option<Duration>,
    /// Ask the server to validate after every change.
    pub live_validation: bool,
    /// Fail instead of warning when the model is already subscribed.
    pub error_when_unsuccessful: bool,
}

/// Lifecycle state of a registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// The channel was requested and has not reported its open event yet.
    Opening,
    /// The channel is open.
    Open,
    /// The transport reported an error; the channel awaits its close event.
    Error,
}

type SharedChannel = Arc<Mutex<Box<dyn Channel>>>;

struct Subscription {
    generation: u64,
    state: ChannelState,
    channel: Option<SharedChannel>,
    listener: Arc<dyn SubscriptionListener>,
}

#[derive(Default)]
struct Registry {
    active: HashMap<String, Subscription>,
    /// Listeners of unsubscribed channels awaiting their close event.
    closing: HashMap<u64, Arc<dyn SubscriptionListener>>,
    next_generation: u64,
}

impl Registry {
    fn current(&mut self, address: &ChannelAddress) -> Option<&mut Subscription> {
        self.active
            .get_mut(address.modeluri())
            .filter(|subscription| subscription.generation == address.generation())
    }

    /// Forgets the registration `address` belongs to, whether active or
    /// closing, and hands back its listener.
    fn release(&mut self, address: &ChannelAddress) -> Option<Arc<dyn SubscriptionListener>> {
        if self.current(address).is_some() {
            return self
                .active
                .remove(address.modeluri())
                .map(|subscription| subscription.listener);
        }
        self.closing.remove(&address.generation())
    }
}

/// Owns the subscription channels of one client.
pub struct SubscriptionManager<F> {
    factory: F,
    base_url: Url,
    api_version: ApiVersion,
    default_format: Format,
    registry: Mutex<Registry>,
}

impl<F: ChannelFactory> SubscriptionManager<F> {
    /// Builds a manager opening channels through `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError::Config`] when the base URL is invalid.
    pub fn new(factory: F, config: &Config) -> Result<Self, ModelServerError> {
        Ok(Self {
            factory,
            base_url: config.base_url()?,
            api_version: config.api_version(),
            default_format: config.default_format(),
            registry: Mutex::new(Registry::default()),
        })
    }

    /// Channel factory in use.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Opens a channel for `modeluri` and routes its notifications to
    /// `listener`.
    ///
    /// An existing registration is kept. It produces
    /// [`ModelServerError::AlreadySubscribed`] when
    /// `options.error_when_unsuccessful` is set and a warning otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError`] for a duplicate subscription (see above),
    /// an unresolvable channel address, or a channel that fails to open.
    pub fn subscribe(
        &self,
        modeluri: &str,
        listener: Arc<dyn SubscriptionListener>,
        options: SubscriptionOptions,
    ) -> Result<(), ModelServerError> {
        let url = self.channel_url(modeluri, &options)?;

        let generation = {
            let mut registry = self.lock();
            if registry.active.contains_key(modeluri) {
                drop(registry);
                if options.error_when_unsuccessful {
                    return Err(ModelServerError::AlreadySubscribed {
                        modeluri: modeluri.to_owned(),
                    });
                }
                warn!(
                    target: SUBSCRIPTION_TARGET,
                    modeluri,
                    "already subscribed; keeping the existing channel"
                );
                return Ok(());
            }
            registry.next_generation = registry.next_generation.wrapping_add(1);
            let issued = registry.next_generation;
            registry.active.insert(
                modeluri.to_owned(),
                Subscription {
                    generation: issued,
                    state: ChannelState::Opening,
                    channel: None,
                    listener,
                },
            );
            issued
        };
        let address = ChannelAddress::new(modeluri, url, generation);

        debug!(
            target: SUBSCRIPTION_TARGET,
            modeluri,
            generation,
            url = %address.url(),
            "opening subscription channel"
        );

        match self.factory.open(&address) {
            Ok(channel) => {
                self.attach(&address, channel);
                Ok(())
            }
            Err(error) => {
                self.lock().release(&address);
                warn!(
                    target: SUBSCRIPTION_TARGET,
                    modeluri,
                    error = %error,
                    "failed to open subscription channel"
                );
                Err(ModelServerError::channel(modeluri, error))
            }
        }
    }

    fn attach(&self, address: &ChannelAddress, channel: Box<dyn Channel>) {
        let shared: SharedChannel = Arc::new(Mutex::new(channel));
        let mut registry = self.lock();
        if let Some(subscription) = registry.current(address) {
            subscription.channel = Some(shared);
            return;
        }
        drop(registry);
        // Unsubscribed while the channel was being opened.
        if let Err(error) = lock_channel(&shared).close() {
            debug!(
                target: SUBSCRIPTION_TARGET,
                modeluri = address.modeluri(),
                error = %error,
                "failed to close orphaned channel"
            );
        }
    }

    /// Closes and forgets the channel for `modeluri`.
    ///
    /// The listener stays attached to the closing channel and receives its
    /// close notification once the transport reports it. Unknown identifiers
    /// are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError::Channel`] when closing the channel fails;
    /// the registration is removed regardless.
    pub fn unsubscribe(&self, modeluri: &str) -> Result<(), ModelServerError> {
        let removed = {
            let mut registry = self.lock();
            let subscription = registry.active.remove(modeluri);
            if let Some(closing) = &subscription {
                registry
                    .closing
                    .insert(closing.generation, Arc::clone(&closing.listener));
            }
            subscription
        };
        let Some(subscription) = removed else {
            warn!(
                target: SUBSCRIPTION_TARGET,
                modeluri,
                "not subscribed; nothing to unsubscribe"
            );
            return Ok(());
        };

        debug!(target: SUBSCRIPTION_TARGET, modeluri, "closing subscription channel");
        let Some(shared) = subscription.channel else {
            // The channel is closed as soon as its open completes.
            return Ok(());
        };
        let closed = lock_channel(&shared).close();
        closed.map_err(|error| {
            self.lock().closing.remove(&subscription.generation);
            ModelServerError::channel(modeluri, error)
        })
    }

    /// Serialises `message` and writes it to the channel for `modeluri`.
    ///
    /// Without an attached channel the call warns and does nothing on v1
    /// servers and fails on v2 servers. The registry is not locked while the
    /// transport writes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelServerError::Codec`] when `message` cannot be
    /// serialised, [`ModelServerError::NotSubscribed`] as described above, or
    /// [`ModelServerError::Channel`] when the write fails.
    pub fn send(&self, modeluri: &str, message: &impl Serialize) -> Result<(), ModelServerError> {
        let text = serde_json::to_string(message)?;

        let channel = self
            .lock()
            .active
            .get(modeluri)
            .and_then(|subscription| subscription.channel.clone());
        let Some(shared) = channel else {
            return match self.api_version {
                ApiVersion::V1 => {
                    warn!(
                        target: SUBSCRIPTION_TARGET,
                        modeluri,
                        "not subscribed; message dropped"
                    );
                    Ok(())
                }
                ApiVersion::V2 => Err(ModelServerError::NotSubscribed {
                    modeluri: modeluri.to_owned(),
                }),
            };
        };
        let written = lock_channel(&shared).send(&text);
        written.map_err(|error| ModelServerError::channel(modeluri, error))
    }

    /// Sends a heartbeat on the channel for `modeluri`.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionManager::send`].
    pub fn send_keep_alive(&self, modeluri: &str) -> Result<(), ModelServerError> {
        self.send(modeluri, &Envelope::keep_alive())
    }

    /// Whether a channel is registered for `modeluri`.
    #[must_use]
    pub fn is_subscribed(&self, modeluri: &str) -> bool {
        self.lock().active.contains_key(modeluri)
    }

    /// State of the channel for `modeluri`, if registered.
    #[must_use]
    pub fn state(&self, modeluri: &str) -> Option<ChannelState> {
        self.lock()
            .active
            .get(modeluri)
            .map(|subscription| subscription.state)
    }

    /// Identifiers with a registered channel, sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        let mut modeluris: Vec<String> = self.lock().active.keys().cloned().collect();
        modeluris.sort();
        modeluris
    }

    /// Transport callback: the channel at `address` opened.
    pub fn handle_open(&self, address: &ChannelAddress) {
        let Some(listener) = self.update_state(address, ChannelState::Open) else {
            ignore_stale(address, "open");
            return;
        };
        listener.on_notification(&Notification::Open {
            modeluri: address.modeluri().to_owned(),
        });
    }

    /// Transport callback: a text frame arrived on the channel at `address`.
    pub fn handle_message(&self, address: &ChannelAddress, text: &str) {
        let modeluri = address.modeluri();
        let current = self
            .lock()
            .current(address)
            .map(|subscription| Arc::clone(&subscription.listener));
        let Some(listener) = current else {
            ignore_stale(address, "message");
            return;
        };
        let notification = match Envelope::parse(text) {
            Ok(envelope) => {
                if let Some(embedded) = envelope.embedded_model_uri()
                    && embedded != modeluri
                {
                    debug!(
                        target: SUBSCRIPTION_TARGET,
                        modeluri,
                        embedded,
                        "message names another model; attributing it to its channel"
                    );
                }
                Notification::from_envelope(modeluri, envelope)
            }
            Err(error) => Notification::malformed(modeluri.to_owned(), &error, None),
        };
        if let Notification::Error(error) = &notification {
            warn!(
                target: SUBSCRIPTION_TARGET,
                modeluri,
                message = %error.message,
                "subscription message reported an error"
            );
        }
        listener.on_notification(&notification);
    }

    /// Transport callback: the channel at `address` closed.
    ///
    /// The registration is removed before the listener is notified. Channels
    /// closed through [`SubscriptionManager::unsubscribe`] still notify the
    /// listener they were registered with, exactly once.
    pub fn handle_close(&self, address: &ChannelAddress, code: u16, reason: &str) {
        let released = self.lock().release(address);
        let Some(listener) = released else {
            ignore_stale(address, "close");
            return;
        };
        let close = CloseNotification::new(address.modeluri(), code, reason);
        debug!(
            target: SUBSCRIPTION_TARGET,
            modeluri = address.modeluri(),
            code,
            reason = %close.reason,
            "subscription channel closed"
        );
        listener.on_notification(&Notification::Close(close));
    }

    /// Transport callback: the channel at `address` failed.
    ///
    /// The registration stays until the transport reports the close.
    pub fn handle_error(&self, address: &ChannelAddress, error: &TransportError) {
        let Some(listener) = self.update_state(address, ChannelState::Error) else {
            ignore_stale(address, "error");
            return;
        };
        warn!(
            target: SUBSCRIPTION_TARGET,
            modeluri = address.modeluri(),
            error = %error,
            "subscription channel failed"
        );
        listener.on_notification(&Notification::Error(ErrorNotification {
            modeluri: address.modeluri().to_owned(),
            message: error.message().to_owned(),
            payload: None,
        }));
    }

    fn channel_url(
        &self,
        modeluri: &str,
        options: &SubscriptionOptions,
    ) -> Result<Url, ModelServerError> {
        let path = Route::Subscribe.path(self.api_version);
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|source| ModelServerError::Address { path, source })?;

        let socket_scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        }
        .to_owned();
        if url.set_scheme(&socket_scheme).is_err() {
            debug!(
                target: SUBSCRIPTION_TARGET,
                scheme = %socket_scheme,
                "keeping base URL scheme for subscription channel"
            );
        }

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(MODEL_URI, modeluri);
            query.append_pair(
                FORMAT,
                options.format.unwrap_or(self.default_format).as_str(),
            );
            if let Some(timeout) = options.timeout {
                query.append_pair(TIMEOUT, &timeout.as_millis().to_string());
            }
            if options.live_validation {
                query.append_pair(LIVE_VALIDATION, "true");
            }
        }
        Ok(url)
    }

    fn update_state(
        &self,
        address: &ChannelAddress,
        state: ChannelState,
    ) -> Option<Arc<dyn SubscriptionListener>> {
        self.lock().current(address).map(|subscription| {
            subscription.state = state;
            Arc::clone(&subscription.listener)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_channel(channel: &SharedChannel) -> MutexGuard<'_, Box<dyn Channel>> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ignore_stale(address: &ChannelAddress, event: &str) {
    debug!(
        target: SUBSCRIPTION_TARGET,
        modeluri = address.modeluri(),
        generation = address.generation(),
        event,
        "event from a superseded or unknown channel; ignoring"
    );
}
