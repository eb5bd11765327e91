//! Combat worker.
//!
//! Consumes battle requests from the combat queue, resolves them with the
//! combat engine and replies to the requester. The worker owns one
//! long-lived connection and reconnects at a fixed interval whenever it is
//! lost, for as long as the process runs.
//!
//! Every delivery is settled explicitly:
//! - a request missing a side is acknowledged and dropped;
//! - a body that is not a combat request is copied to the dead-letter queue;
//! - a reply that cannot be published is requeued once, then dead-lettered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use delve_shared::CombatRequest;

use crate::infrastructure::ports::{
    AckMode, BrokerChannel, BrokerConnection, BrokerError, BrokerPort, Delivery,
    OutboundMessage, QueueOptions,
};
use crate::infrastructure::transport::connect_with_retry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Ready,
    /// At least one battle in flight.
    Processing,
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Resolved and answered on `reply_to`.
    Replied,
    /// Resolved; the request asked for no reply.
    Processed,
    /// Malformed request dropped.
    Dropped,
    /// Poison body moved to the dead-letter queue.
    DeadLettered,
    /// Handed back to the broker for another attempt.
    Requeued,
    /// Could not even be dead-lettered.
    Rejected { requeue: bool },
}

impl Disposition {
    async fn settle(self, delivery: &Delivery) -> Result<(), BrokerError> {
        match self {
            Disposition::Replied
            | Disposition::Processed
            | Disposition::Dropped
            | Disposition::DeadLettered => delivery.ack().await,
            Disposition::Requeued => delivery.reject(true).await,
            Disposition::Rejected { requeue } => delivery.reject(requeue).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CombatWorkerConfig {
    pub queue: String,
    pub dead_letter_queue: String,
    /// Unacknowledged deliveries, and so battles resolved concurrently.
    pub prefetch: u16,
    pub reconnect_delay: Duration,
}

enum ConsumeEnd {
    Cancelled,
    ConnectionLost,
}

pub struct CombatWorker {
    broker: Arc<dyn BrokerPort>,
    config: CombatWorkerConfig,
    state: watch::Sender<WorkerState>,
    in_flight: AtomicUsize,
}

impl CombatWorker {
    pub fn new(broker: Arc<dyn BrokerPort>, config: CombatWorkerConfig) -> Self {
        let (state, _) = watch::channel(WorkerState::Connecting);
        Self {
            broker,
            config,
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Run until `cancel` fires. In-flight battles finish before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(queue = %self.config.queue, "Starting combat worker");

        loop {
            self.state.send_replace(WorkerState::Connecting);
            let Some(connection) =
                connect_with_retry(self.broker.as_ref(), self.config.reconnect_delay, &cancel)
                    .await
            else {
                break;
            };

            match self.consume(connection.as_ref(), &cancel).await {
                Ok(ConsumeEnd::Cancelled) => {
                    if let Err(e) = connection.close().await {
                        tracing::debug!(error = %e, "Error closing combat worker connection");
                    }
                    break;
                }
                Ok(ConsumeEnd::ConnectionLost) => {
                    tracing::warn!("Combat worker lost its broker connection, reconnecting");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Combat worker could not start consuming");
                    if let Err(e) = connection.close().await {
                        tracing::debug!(error = %e, "Error closing combat worker connection");
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }

        tracing::info!("Combat worker shutting down");
    }

    async fn consume(
        &self,
        connection: &dyn BrokerConnection,
        cancel: &CancellationToken,
    ) -> Result<ConsumeEnd, BrokerError> {
        let channel = connection.open_channel().await?;
        channel
            .declare_queue(&self.config.queue, QueueOptions::transient())
            .await?;
        channel
            .declare_queue(&self.config.dead_letter_queue, QueueOptions::durable())
            .await?;
        channel.set_prefetch(self.config.prefetch).await?;
        let deliveries = channel.consume(&self.config.queue, AckMode::Manual).await?;

        self.state.send_replace(WorkerState::Ready);
        tracing::info!(
            queue = %self.config.queue,
            prefetch = self.config.prefetch,
            "Combat worker ready"
        );

        let channel_ref: &dyn BrokerChannel = channel.as_ref();
        deliveries
            .take_until(cancel.cancelled())
            .take_while(|item| {
                if let Err(e) = item {
                    tracing::warn!(error = %e, "Combat delivery stream failed");
                }
                future::ready(item.is_ok())
            })
            .filter_map(|item| future::ready(item.ok()))
            .for_each_concurrent(usize::from(self.config.prefetch.max(1)), |delivery| async move {
                self.handle(channel_ref, delivery).await;
            })
            .await;

        if cancel.is_cancelled() {
            if let Err(e) = channel.close().await {
                tracing::debug!(error = %e, "Error closing combat worker channel");
            }
            return Ok(ConsumeEnd::Cancelled);
        }
        Ok(ConsumeEnd::ConnectionLost)
    }

    /// Process and settle one delivery.
    pub async fn handle(&self, channel: &dyn BrokerChannel, delivery: Delivery) -> Disposition {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.transition(WorkerState::Ready, WorkerState::Processing);
        }

        let disposition = self.process(channel, &delivery).await;
        if let Err(e) = disposition.settle(&delivery).await {
            tracing::warn!(error = %e, ?disposition, "Failed to settle combat delivery");
        }

        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.transition(WorkerState::Processing, WorkerState::Ready);
        }
        disposition
    }

    /// Connection loss wins over processing bookkeeping.
    fn transition(&self, from: WorkerState, to: WorkerState) {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
    }

    async fn process(&self, channel: &dyn BrokerChannel, delivery: &Delivery) -> Disposition {
        let request = match CombatRequest::decode(&delivery.body) {
            Ok(request) => request,
            Err(e) => return self.dead_letter(channel, delivery, &e.to_string()).await,
        };

        let battle = match request.to_battle() {
            Ok(battle) => battle,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed combat request");
                return Disposition::Dropped;
            }
        };

        let outcome = match tokio::task::spawn_blocking(move || battle.resolve()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Battle resolution aborted");
                return self.dead_letter(channel, delivery, &e.to_string()).await;
            }
        };
        tracing::debug!(
            hero = request.hero.as_ref().map_or("unknown", |h| h.label()),
            monster = request.monster.as_ref().map_or("unknown", |m| m.label()),
            winner = %outcome.winner,
            turns = outcome.log.len().saturating_sub(1),
            "Battle resolved"
        );

        let Some(reply_to) = delivery.properties.reply_to.as_deref() else {
            return Disposition::Processed;
        };

        let body = match serde_json::to_vec(&outcome) {
            Ok(body) => body,
            Err(e) => return self.dead_letter(channel, delivery, &e.to_string()).await,
        };
        let reply = OutboundMessage::new(body)
            .with_correlation_id(delivery.properties.correlation_id.clone());

        match channel.publish(reply_to, reply).await {
            Ok(()) => Disposition::Replied,
            Err(e) if !delivery.redelivered => {
                tracing::warn!(error = %e, reply_to = %reply_to, "Reply failed, requeueing request");
                Disposition::Requeued
            }
            Err(e) => {
                tracing::error!(error = %e, reply_to = %reply_to, "Reply failed again");
                self.dead_letter(channel, delivery, &e.to_string()).await
            }
        }
    }

    async fn dead_letter(
        &self,
        channel: &dyn BrokerChannel,
        delivery: &Delivery,
        reason: &str,
    ) -> Disposition {
        let mut properties = delivery.properties.clone();
        properties.persistent = true;
        let message = OutboundMessage::new(delivery.body.clone()).with_properties(properties);

        match channel.publish(&self.config.dead_letter_queue, message).await {
            Ok(()) => {
                tracing::warn!(
                    reason = %reason,
                    queue = %self.config.dead_letter_queue,
                    "Combat message dead-lettered"
                );
                Disposition::DeadLettered
            }
            Err(e) => {
                tracing::error!(error = %e, reason = %reason, "Dead-lettering failed");
                Disposition::Rejected {
                    requeue: !delivery.redelivered,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_broker::InMemoryBroker;
    use crate::infrastructure::ports::{MessageProperties, MockBrokerChannel};

    const DEAD_LETTER: &str = "CombatQ.dead-letter";

    fn config() -> CombatWorkerConfig {
        CombatWorkerConfig {
            queue: "CombatQ".into(),
            dead_letter_queue: DEAD_LETTER.into(),
            prefetch: 4,
            reconnect_delay: Duration::from_millis(10),
        }
    }

    struct Running {
        broker: InMemoryBroker,
        worker: Arc<CombatWorker>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start() -> Running {
        let broker = InMemoryBroker::new();
        let worker = Arc::new(CombatWorker::new(Arc::new(broker.clone()), config()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let worker = worker.clone();
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });
        wait_for_state(&worker, WorkerState::Ready).await;
        Running {
            broker,
            worker,
            cancel,
            task,
        }
    }

    async fn wait_for_state(worker: &CombatWorker, expected: WorkerState) {
        let mut rx = worker.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == expected))
            .await
            .expect("state reached in time")
            .expect("worker alive");
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn publish(broker: &InMemoryBroker, message: OutboundMessage) {
        let connection = broker.connect().await.expect("connect");
        let channel = connection.open_channel().await.expect("channel");
        channel.publish("CombatQ", message).await.expect("publish");
    }

    const SCENARIO_A: &[u8] = br#"{"hero": {"hp": 100, "atk": 50, "res": 10, "vit": 20},
                                   "monster": {"hp": 20, "atk": 5, "gold": 10, "vit": 10}}"#;

    #[tokio::test]
    async fn answers_on_reply_queue_with_same_correlation_id() {
        let running = start().await;
        let connection = running.broker.connect().await.expect("connect");
        let channel = connection.open_channel().await.expect("channel");
        let reply_queue = channel
            .declare_queue("", QueueOptions::exclusive())
            .await
            .expect("declare");
        let mut replies = channel
            .consume(&reply_queue, AckMode::Auto)
            .await
            .expect("consume");

        channel
            .publish(
                "CombatQ",
                OutboundMessage::new(SCENARIO_A.to_vec())
                    .with_correlation_id(Some("corr-1".into()))
                    .with_reply_to(reply_queue.clone()),
            )
            .await
            .expect("publish");

        let reply = tokio::time::timeout(Duration::from_secs(2), replies.next())
            .await
            .expect("reply in time")
            .expect("stream open")
            .expect("delivery");
        assert_eq!(reply.properties.correlation_id.as_deref(), Some("corr-1"));

        let outcome: serde_json::Value = serde_json::from_slice(&reply.body).expect("json");
        assert_eq!(outcome["winner"], "hero");
        assert_eq!(outcome["goldLooted"], 10);

        let broker = running.broker.clone();
        eventually(|| {
            let broker = broker.clone();
            async move { broker.unacked_count().await == 0 }
        })
        .await;
        assert_eq!(running.broker.ready_count("CombatQ").await, 0);
        running.cancel.cancel();
    }

    #[tokio::test]
    async fn request_missing_a_side_is_dropped() {
        let running = start().await;
        publish(
            &running.broker,
            OutboundMessage::new(br#"{"hero": {"hp": 10, "atk": 1}}"#.to_vec()),
        )
        .await;

        let broker = running.broker.clone();
        eventually(|| {
            let broker = broker.clone();
            async move {
                broker.ready_count("CombatQ").await == 0 && broker.unacked_count().await == 0
            }
        })
        .await;
        assert_eq!(running.broker.ready_count(DEAD_LETTER).await, 0);
        running.cancel.cancel();
    }

    #[tokio::test]
    async fn garbage_is_dead_lettered() {
        let running = start().await;
        publish(&running.broker, OutboundMessage::new(b"not json".to_vec())).await;

        let broker = running.broker.clone();
        eventually(|| {
            let broker = broker.clone();
            async move { broker.ready_count(DEAD_LETTER).await == 1 }
        })
        .await;

        let dead = running.broker.published_to(DEAD_LETTER).await;
        assert_eq!(dead[0].body, b"not json");
        assert!(dead[0].properties.persistent);
        running.cancel.cancel();
    }

    #[tokio::test]
    async fn reconnects_after_broker_outage() {
        let running = start().await;

        running.broker.set_available(false).await;
        wait_for_state(&running.worker, WorkerState::Connecting).await;

        running.broker.set_available(true).await;
        wait_for_state(&running.worker, WorkerState::Ready).await;

        publish(&running.broker, OutboundMessage::new(b"[]".to_vec())).await;
        let broker = running.broker.clone();
        eventually(|| {
            let broker = broker.clone();
            async move { broker.ready_count(DEAD_LETTER).await == 1 }
        })
        .await;
        running.cancel.cancel();
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let running = start().await;
        running.cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), running.task)
            .await
            .expect("worker stopped in time")
            .expect("worker task did not panic");
    }

    fn delivery(redelivered: bool) -> Delivery {
        Delivery::new(
            SCENARIO_A.to_vec(),
            MessageProperties {
                correlation_id: Some("corr-9".into()),
                reply_to: Some("reply-q".into()),
                ..MessageProperties::default()
            },
            redelivered,
        )
    }

    fn worker() -> CombatWorker {
        CombatWorker::new(Arc::new(InMemoryBroker::new()), config())
    }

    #[tokio::test]
    async fn failed_reply_is_requeued_on_first_delivery() {
        let mut channel = MockBrokerChannel::new();
        channel
            .expect_publish()
            .withf(|queue, _| queue == "reply-q")
            .times(1)
            .returning(|queue, _| Err(BrokerError::publish(queue, "channel closed")));

        let disposition = worker().process(&channel, &delivery(false)).await;
        assert_eq!(disposition, Disposition::Requeued);
    }

    #[tokio::test]
    async fn failed_reply_on_redelivery_is_dead_lettered() {
        let mut channel = MockBrokerChannel::new();
        channel
            .expect_publish()
            .withf(|queue, _| queue == "reply-q")
            .times(1)
            .returning(|queue, _| Err(BrokerError::publish(queue, "channel closed")));
        channel
            .expect_publish()
            .withf(|queue, message| queue == DEAD_LETTER && message.body == SCENARIO_A)
            .times(1)
            .returning(|_, _| Ok(()));

        let disposition = worker().process(&channel, &delivery(true)).await;
        assert_eq!(disposition, Disposition::DeadLettered);
    }

    #[tokio::test]
    async fn unroutable_poison_is_rejected_without_requeue_when_seen_twice() {
        let mut channel = MockBrokerChannel::new();
        channel
            .expect_publish()
            .returning(|queue, _| Err(BrokerError::publish(queue, "down")));

        let poison = Delivery::new(b"{".to_vec(), MessageProperties::default(), true);
        let disposition = worker().process(&channel, &poison).await;
        assert_eq!(disposition, Disposition::Rejected { requeue: false });
    }

    #[tokio::test]
    async fn request_without_reply_address_is_processed_silently() {
        let mut channel = MockBrokerChannel::new();
        channel.expect_publish().times(0);

        let fire_and_forget = Delivery::new(SCENARIO_A.to_vec(), MessageProperties::default(), false);
        let disposition = worker().process(&channel, &fire_and_forget).await;
        assert_eq!(disposition, Disposition::Processed);
    }

    #[tokio::test]
    async fn huge_health_pools_are_answered_with_a_bounded_log() {
        let mut channel = MockBrokerChannel::new();
        channel
            .expect_publish()
            .withf(|queue, message| {
                let outcome: delve_domain::BattleOutcome =
                    serde_json::from_slice(&message.body).expect("outcome body");
                queue == "amq.gen-reply"
                    && outcome.log.len() == delve_domain::MAX_TURNS as usize + 2
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let endless = br#"{"hero": {"hp": 1000000000000, "atk": 1, "vit": 1},
                           "monster": {"hp": 1000000000000, "atk": 1}}"#;
        let delivery = Delivery::new(
            endless.to_vec(),
            MessageProperties {
                reply_to: Some("amq.gen-reply".into()),
                correlation_id: Some("c-1".into()),
                ..MessageProperties::default()
            },
            false,
        );
        let disposition = worker().process(&channel, &delivery).await;
        assert_eq!(disposition, Disposition::Replied);
    }
}
