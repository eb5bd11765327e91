//! Error types for port operations.

/// Broker transport failures, tagged with the queue involved where there is one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Failed to declare queue {queue}: {message}")]
    Declare { queue: String, message: String },

    #[error("Failed to publish to {queue}: {message}")]
    Publish { queue: String, message: String },

    #[error("Failed to consume from {queue}: {message}")]
    Consume { queue: String, message: String },

    #[error("Failed to settle delivery: {0}")]
    Acknowledge(String),

    /// The connection or channel was closed underneath the caller.
    #[error("Broker connection closed")]
    Closed,
}

impl BrokerError {
    pub fn declare(queue: &str, message: impl ToString) -> Self {
        Self::Declare {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }

    pub fn publish(queue: &str, message: impl ToString) -> Self {
        Self::Publish {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }

    pub fn consume(queue: &str, message: impl ToString) -> Self {
        Self::Consume {
            queue: queue.to_string(),
            message: message.to_string(),
        }
    }
}

/// Failures of a combat RPC call.
#[derive(Debug, thiserror::Error)]
pub enum CombatClientError {
    #[error("No combat reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Invalid combat reply: {0}")]
    InvalidReply(String),

    #[error("Reply channel closed before a reply arrived")]
    ReplyChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures publishing a hero action.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures talking to an HTTP collaborator (hero, save, level design, items).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Request to {service} failed: {message}")]
    RequestFailed {
        service: &'static str,
        message: String,
    },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn request(service: &'static str, message: impl ToString) -> Self {
        Self::RequestFailed {
            service,
            message: message.to_string(),
        }
    }

    pub fn invalid_response(service: &'static str, message: impl ToString) -> Self {
        Self::InvalidResponse {
            service,
            message: message.to_string(),
        }
    }
}
