//! Hero action dispatcher.
//!
//! Publishes hero state mutations to the durable hero queue as persistent
//! messages and returns once the broker has confirmed them. Consumers apply
//! each action at most once per `messageId`, so redelivery is harmless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use delve_domain::MessageId;
use delve_shared::{HeroAction, HeroActionEnvelope};

use crate::infrastructure::ports::{
    ClockPort, DispatchError, HeroActionPort, OutboundMessage, QueueOptions,
};
use crate::infrastructure::transport::{close_after, SharedConnection};

pub struct ActionDispatcher {
    connection: Arc<SharedConnection>,
    queue: String,
    clock: Arc<dyn ClockPort>,
    close_grace: Duration,
}

impl ActionDispatcher {
    pub fn new(
        connection: Arc<SharedConnection>,
        queue: impl Into<String>,
        clock: Arc<dyn ClockPort>,
        close_grace: Duration,
    ) -> Self {
        Self {
            connection,
            queue: queue.into(),
            clock,
            close_grace,
        }
    }
}

#[async_trait]
impl HeroActionPort for ActionDispatcher {
    async fn dispatch(&self, action: HeroAction) -> Result<MessageId, DispatchError> {
        let envelope = HeroActionEnvelope::new(action, self.clock.now());
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| DispatchError::Serialization(e.to_string()))?;

        let channel = self.connection.channel().await?;
        let published = async {
            channel
                .declare_queue(&self.queue, QueueOptions::durable())
                .await?;
            let message = OutboundMessage::new(body)
                .with_message_id(envelope.message_id.to_string())
                .persistent();
            channel.publish(&self.queue, message).await
        }
        .await;
        close_after(channel, self.close_grace);
        published?;

        tracing::info!(
            action = envelope.action.name(),
            user_id = %envelope.action.user_id(),
            message_id = %envelope.message_id,
            "Hero action dispatched"
        );
        Ok(envelope.message_id)
    }
}
