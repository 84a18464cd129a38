//! # Event Service
//!
//! Factory tying one latest-value store and one transport to the
//! publishers and subscribers that share them.
//!
//! ```rust,ignore
//! let service = EventService::from_config(EventServiceConfig::from_env()?);
//! let publisher = service.default_publisher();
//! let subscriber = service.default_subscriber();
//! ```

use crate::config::{EventServiceConfig, TransportKind};
use crate::publisher::EventPublisher;
use crate::store::LatestValueStore;
use crate::subscriber::EventSubscriber;
use crate::transport::{KeyspaceTransport, LogTransport, Transport};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Shared store plus transport, handing out publishers and subscribers.
pub struct EventService {
    config: EventServiceConfig,
    store: Arc<LatestValueStore>,
    transport: Arc<dyn Transport>,
    default_publisher: OnceLock<EventPublisher>,
    default_subscriber: OnceLock<EventSubscriber>,
}

impl EventService {
    /// Build the transport named by `config`.
    #[must_use]
    pub fn from_config(config: EventServiceConfig) -> Self {
        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::Keyspace => {
                Arc::new(KeyspaceTransport::with_capacity(config.channel_capacity))
            }
            TransportKind::Log => Arc::new(LogTransport::with_retention(config.log_retention)),
        };
        Self::with_transport(config, transport)
    }

    /// In-memory keyspace service with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_config(EventServiceConfig::default())
    }

    /// Log-backed service with default settings.
    #[must_use]
    pub fn log_backed() -> Self {
        Self::from_config(EventServiceConfig {
            transport: TransportKind::Log,
            ..EventServiceConfig::default()
        })
    }

    /// Use a caller-supplied transport.
    #[must_use]
    pub fn with_transport(config: EventServiceConfig, transport: Arc<dyn Transport>) -> Self {
        info!(
            transport = transport.name(),
            patterns = transport.capabilities().supports_pattern_subscribe,
            "Event service created"
        );
        Self {
            config,
            store: Arc::new(LatestValueStore::new()),
            transport,
            default_publisher: OnceLock::new(),
            default_subscriber: OnceLock::new(),
        }
    }

    /// The shared publisher. Must first be called inside a tokio runtime.
    pub fn default_publisher(&self) -> EventPublisher {
        self.default_publisher
            .get_or_init(|| self.make_new_publisher())
            .clone()
    }

    /// A publisher with its own queue. Must be called inside a tokio runtime.
    #[must_use]
    pub fn make_new_publisher(&self) -> EventPublisher {
        EventPublisher::new(Arc::clone(&self.store), Arc::clone(&self.transport))
    }

    pub fn default_subscriber(&self) -> EventSubscriber {
        self.default_subscriber
            .get_or_init(|| self.make_new_subscriber())
            .clone()
    }

    #[must_use]
    pub fn make_new_subscriber(&self) -> EventSubscriber {
        EventSubscriber::new(
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            self.config.subscriber_buffer,
        )
    }

    #[must_use]
    pub fn config(&self) -> &EventServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<LatestValueStore> {
        &self.store
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Stop the default publisher and close the transport. Open streams end.
    pub async fn shutdown(&self) {
        if let Some(publisher) = self.default_publisher.get() {
            publisher.shutdown();
        }
        self.transport.shutdown().await;
        info!(transport = self.transport.name(), "Event service shut down");
    }
}
