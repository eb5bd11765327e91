//! Message broker ports.
//!
//! Modeled on AMQP 0-9-1 with the default exchange: publishing to a queue
//! name routes straight to that queue. Connections are long-lived; channels
//! are cheap and opened per logical flow.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::error::BrokerError;

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    pub durable: bool,
    /// Owned by the declaring channel and removed with it.
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Survives broker restarts.
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Self::default()
        }
    }

    pub fn transient() -> Self {
        Self::default()
    }

    /// Private reply queue; declare it with an empty name to get a
    /// server-generated one.
    pub fn exclusive() -> Self {
        Self {
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// Per-message metadata carried alongside the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub message_id: Option<String>,
    /// Delivery mode 2: written to disk by a durable queue.
    pub persistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl OutboundMessage {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            properties: MessageProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.properties.correlation_id = correlation_id;
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.properties.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.properties.message_id = Some(message_id.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.properties.persistent = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The broker forgets a message as soon as it is delivered.
    Auto,
    /// The consumer must `ack` or `reject` every delivery.
    Manual,
}

/// Settles one manually acknowledged delivery.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// A message received from a queue.
pub struct Delivery {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    /// The broker delivered this message before and it was requeued.
    pub redelivered: bool,
    acker: Option<Box<dyn DeliveryAcker>>,
}

impl Delivery {
    /// A delivery that needs no settlement (auto-ack consumers).
    pub fn new(body: Vec<u8>, properties: MessageProperties, redelivered: bool) -> Self {
        Self {
            body,
            properties,
            redelivered,
            acker: None,
        }
    }

    pub fn with_acker(mut self, acker: Box<dyn DeliveryAcker>) -> Self {
        self.acker = Some(acker);
        self
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        match &self.acker {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        match &self.acker {
            Some(acker) => acker.reject(requeue).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("body_len", &self.body.len())
            .field("properties", &self.properties)
            .field("redelivered", &self.redelivered)
            .field("manual_ack", &self.acker.is_some())
            .finish()
    }
}

/// Deliveries of one consumer. The stream ends (or yields an error) when the
/// channel or connection behind it goes away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// Entry point to a broker.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// One attempt; retry policy belongs to the caller.
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), BrokerError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Idempotent. Returns the queue name, which the server picks when
    /// `name` is empty.
    async fn declare_queue(&self, name: &str, options: QueueOptions)
        -> Result<String, BrokerError>;

    /// Maximum unacknowledged deliveries per consumer on this channel.
    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    /// Returns once the broker has taken responsibility for the message.
    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str, mode: AckMode) -> Result<DeliveryStream, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
