//! RabbitMQ adapter (AMQP 0-9-1 via `lapin`).
//!
//! Everything goes through the default exchange, so a queue name doubles as
//! the routing key. Channels run in confirm mode: a publish returns once the
//! broker has acked the message and fails if it nacks it.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::{FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};

use crate::infrastructure::ports::{
    AckMode, BrokerChannel, BrokerConnection, BrokerError, BrokerPort, Delivery, DeliveryAcker,
    DeliveryStream, MessageProperties, OutboundMessage, QueueOptions,
};

const PERSISTENT_DELIVERY_MODE: u8 = 2;

pub struct AmqpBroker {
    url: String,
}

impl AmqpBroker {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl BrokerPort for AmqpBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(Arc::new(AmqpConnection { connection }))
    }
}

struct AmqpConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        Ok(Arc::new(AmqpChannel { channel }))
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.connection
            .close(200, "OK")
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }
}

struct AmqpChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, BrokerError> {
        let queue = self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: options.durable,
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::declare(name, e))?;
        Ok(queue.name().as_str().to_string())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<(), BrokerError> {
        let confirmation = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                to_basic_properties(&message.properties),
            )
            .await
            .map_err(|e| BrokerError::publish(queue, e))?
            .await
            .map_err(|e| BrokerError::publish(queue, e))?;
        check_confirmation(queue, &confirmation)
    }

    async fn consume(&self, queue: &str, mode: AckMode) -> Result<DeliveryStream, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: mode == AckMode::Auto,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::consume(queue, e))?;

        let queue = queue.to_string();
        Ok(consumer
            .map(move |item| match item {
                Ok(delivery) => {
                    let properties = from_basic_properties(&delivery.properties);
                    let converted =
                        Delivery::new(delivery.data, properties, delivery.redelivered);
                    Ok(match mode {
                        AckMode::Manual => converted.with_acker(Box::new(AmqpAcker {
                            acker: delivery.acker,
                        })),
                        AckMode::Auto => converted,
                    })
                }
                Err(e) => Err(BrokerError::consume(&queue, e)),
            })
            .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.channel
            .close(200, "OK")
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }
}

struct AmqpAcker {
    acker: Acker,
}

#[async_trait]
impl DeliveryAcker for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }
}

fn check_confirmation(queue: &str, confirmation: &Confirmation) -> Result<(), BrokerError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(BrokerError::publish(queue, "rejected by the broker")),
        Confirmation::NotRequested => Err(BrokerError::publish(
            queue,
            "channel is not in confirm mode",
        )),
    }
}

fn to_basic_properties(properties: &MessageProperties) -> BasicProperties {
    let mut basic = BasicProperties::default().with_content_type("application/json".into());
    if let Some(correlation_id) = &properties.correlation_id {
        basic = basic.with_correlation_id(ShortString::from(correlation_id.clone()));
    }
    if let Some(reply_to) = &properties.reply_to {
        basic = basic.with_reply_to(ShortString::from(reply_to.clone()));
    }
    if let Some(message_id) = &properties.message_id {
        basic = basic.with_message_id(ShortString::from(message_id.clone()));
    }
    if properties.persistent {
        basic = basic.with_delivery_mode(PERSISTENT_DELIVERY_MODE);
    }
    basic
}

fn from_basic_properties(basic: &BasicProperties) -> MessageProperties {
    MessageProperties {
        correlation_id: basic.correlation_id().as_ref().map(|s| s.as_str().to_string()),
        reply_to: basic.reply_to().as_ref().map(|s| s.as_str().to_string()),
        message_id: basic.message_id().as_ref().map(|s| s.as_str().to_string()),
        persistent: *basic.delivery_mode() == Some(PERSISTENT_DELIVERY_MODE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_survive_conversion() {
        let properties = MessageProperties {
            correlation_id: Some("c-1".into()),
            reply_to: Some("amq.gen-1".into()),
            message_id: Some("m-1".into()),
            persistent: true,
        };

        let basic = to_basic_properties(&properties);
        assert_eq!(from_basic_properties(&basic), properties);
    }

    #[test]
    fn only_broker_acks_count_as_published() {
        assert_eq!(check_confirmation("HeroQ", &Confirmation::Ack(None)), Ok(()));
        assert_eq!(
            check_confirmation("HeroQ", &Confirmation::Nack(None)),
            Err(BrokerError::publish("HeroQ", "rejected by the broker"))
        );
        assert!(matches!(
            check_confirmation("HeroQ", &Confirmation::NotRequested),
            Err(BrokerError::Publish { .. })
        ));
    }

    #[test]
    fn transient_messages_leave_delivery_mode_unset() {
        let basic = to_basic_properties(&MessageProperties::default());
        assert_eq!(*basic.delivery_mode(), None);
        assert!(!from_basic_properties(&basic).persistent);
    }
}
