//! Combat RPC client.
//!
//! Request/reply over the broker: every call gets its own channel and an
//! exclusive server-named reply queue, publishes to the combat queue with
//! `reply_to` and a fresh correlation id, and waits for the matching reply
//! until the deadline. Channels come from the process-wide
//! [`SharedConnection`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use delve_domain::BattleOutcome;
use delve_shared::CombatRequest;

use crate::infrastructure::correlation::CorrelationId;
use crate::infrastructure::ports::{
    AckMode, BrokerChannel, CombatClientError, CombatPort, DeliveryStream, OutboundMessage,
    QueueOptions,
};
use crate::infrastructure::transport::{close_after, SharedConnection};

/// Calls awaiting a reply, keyed by correlation id.
///
/// A call is resolved at most once: resolving or timing out removes the
/// entry, so anything arriving later finds nothing to complete.
#[derive(Default)]
pub struct PendingReplies {
    inner: DashMap<String, oneshot::Sender<Vec<u8>>>,
}

impl PendingReplies {
    pub fn insert(&self, correlation_id: String, tx: oneshot::Sender<Vec<u8>>) {
        self.inner.insert(correlation_id, tx);
    }

    /// Returns false if the call already completed or timed out.
    pub fn resolve(&self, correlation_id: &str, body: Vec<u8>) -> bool {
        if let Some((_, tx)) = self.inner.remove(correlation_id) {
            let _ = tx.send(body);
            true
        } else {
            tracing::debug!(
                correlation_id = %correlation_id,
                "Reply for unknown call - it may have timed out"
            );
            false
        }
    }

    pub fn remove(&self, correlation_id: &str) -> bool {
        self.inner.remove(correlation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Unregisters a call and stops its reply listener however the call ends,
/// including when the caller drops the future.
struct CallGuard<'a> {
    pending: &'a PendingReplies,
    correlation_id: String,
    listener: Option<JoinHandle<()>>,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.correlation_id);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

pub struct CombatRpcClient {
    connection: Arc<SharedConnection>,
    queue: String,
    timeout: Duration,
    close_grace: Duration,
    pending: Arc<PendingReplies>,
}

impl CombatRpcClient {
    pub fn new(
        connection: Arc<SharedConnection>,
        queue: impl Into<String>,
        timeout: Duration,
        close_grace: Duration,
    ) -> Self {
        Self {
            connection,
            queue: queue.into(),
            timeout,
            close_grace,
            pending: Arc::new(PendingReplies::default()),
        }
    }

    /// Calls currently waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Everything after the channel is open: declare, subscribe, publish,
    /// then wait for the matching reply.
    async fn call(
        &self,
        channel: &Arc<dyn BrokerChannel>,
        body: Vec<u8>,
    ) -> Result<BattleOutcome, CombatClientError> {
        channel
            .declare_queue(&self.queue, QueueOptions::transient())
            .await?;
        let reply_queue = channel.declare_queue("", QueueOptions::exclusive()).await?;

        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.to_string(), tx);
        let mut guard = CallGuard {
            pending: &self.pending,
            correlation_id: correlation_id.to_string(),
            listener: None,
        };

        let replies = channel.consume(&reply_queue, AckMode::Auto).await?;
        guard.listener = Some(tokio::spawn(listen_for_reply(
            replies,
            correlation_id,
            self.pending.clone(),
        )));

        let message = OutboundMessage::new(body)
            .with_correlation_id(Some(correlation_id.to_string()))
            .with_reply_to(reply_queue);
        channel.publish(&self.queue, message).await?;
        tracing::debug!(
            correlation_id = %correlation_id.short(),
            queue = %self.queue,
            "Combat request published"
        );

        let reply = rx
            .await
            .map_err(|_| CombatClientError::ReplyChannelClosed)?;
        serde_json::from_slice(&reply).map_err(|e| CombatClientError::InvalidReply(e.to_string()))
    }

    fn timed_out(&self) -> CombatClientError {
        let timeout_ms = self.timeout.as_millis() as u64;
        tracing::warn!(timeout_ms, queue = %self.queue, "Combat request timed out");
        CombatClientError::Timeout { timeout_ms }
    }
}

#[async_trait]
impl CombatPort for CombatRpcClient {
    /// The deadline covers the whole call, connecting included.
    async fn request_combat(
        &self,
        request: CombatRequest,
    ) -> Result<BattleOutcome, CombatClientError> {
        let body = serde_json::to_vec(&request)
            .map_err(|e| CombatClientError::Serialization(e.to_string()))?;
        let deadline = Instant::now() + self.timeout;

        let channel = match tokio::time::timeout_at(deadline, self.connection.channel()).await {
            Ok(channel) => channel?,
            Err(_) => return Err(self.timed_out()),
        };

        let result = match tokio::time::timeout_at(deadline, self.call(&channel, body)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        };
        match &result {
            Ok(_) => close_after(channel, self.close_grace),
            // A failed call leaves nothing for the broker to settle.
            Err(_) => close_after(channel, Duration::ZERO),
        }
        result
    }
}

async fn listen_for_reply(
    mut replies: DeliveryStream,
    correlation_id: CorrelationId,
    pending: Arc<PendingReplies>,
) {
    while let Some(item) = replies.next().await {
        match item {
            Ok(delivery) => {
                let received = delivery.properties.correlation_id.as_deref();
                if correlation_id.matches(received) {
                    pending.resolve(&correlation_id.to_string(), delivery.body);
                    return;
                }
                tracing::debug!(
                    expected = %correlation_id.short(),
                    received = ?received,
                    "Ignoring reply with foreign correlation id"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Combat reply stream failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_broker::InMemoryBroker;
    use crate::infrastructure::ports::{BrokerError, BrokerPort};
    use delve_domain::{Combatant, Side};
    use delve_shared::CombatantPayload;

    fn client(broker: &InMemoryBroker, timeout: Duration) -> CombatRpcClient {
        let connection = Arc::new(SharedConnection::new(Arc::new(broker.clone())));
        CombatRpcClient::new(connection, "CombatQ", timeout, Duration::from_millis(5))
    }

    fn request() -> CombatRequest {
        CombatRequest::new(
            CombatantPayload::new(Combatant::new(100, 50, 10, 20)),
            CombatantPayload::new(Combatant::new(20, 5, 0, 10).with_loot(10)),
        )
    }

    fn outcome_body(gold: i64) -> Vec<u8> {
        serde_json::to_vec(&BattleOutcome {
            winner: Side::Hero,
            final_hero_hit_points: 100,
            gold_looted: gold,
            log: Vec::new(),
        })
        .expect("encode outcome")
    }

    /// Answers the next combat request: first with a stray reply, then
    /// twice with the real one.
    async fn spawn_noisy_responder(broker: &InMemoryBroker) {
        let connection = broker.connect().await.expect("connect");
        let channel = connection.open_channel().await.expect("channel");
        channel
            .declare_queue("CombatQ", QueueOptions::transient())
            .await
            .expect("declare");
        let mut requests = channel
            .consume("CombatQ", AckMode::Auto)
            .await
            .expect("consume");

        tokio::spawn(async move {
            let Some(Ok(request)) = requests.next().await else {
                return;
            };
            let reply_to = request.properties.reply_to.clone().unwrap_or_default();
            let stray = OutboundMessage::new(outcome_body(999))
                .with_correlation_id(Some(CorrelationId::new().to_string()));
            let _ = channel.publish(&reply_to, stray).await;
            for _ in 0..2 {
                let reply = OutboundMessage::new(outcome_body(10))
                    .with_correlation_id(request.properties.correlation_id.clone());
                let _ = channel.publish(&reply_to, reply).await;
            }
        });
    }

    #[tokio::test]
    async fn matching_reply_resolves_the_call_once() {
        let broker = InMemoryBroker::new();
        spawn_noisy_responder(&broker).await;
        let client = client(&broker, Duration::from_secs(2));

        let outcome = client
            .request_combat(request())
            .await
            .expect("combat reply");

        assert_eq!(outcome.gold_looted, 10);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn request_carries_reply_address_and_correlation_id() {
        let broker = InMemoryBroker::new();
        spawn_noisy_responder(&broker).await;
        let client = client(&broker, Duration::from_secs(2));

        client.request_combat(request()).await.expect("reply");

        let published = broker.published_to("CombatQ").await;
        assert_eq!(published.len(), 1);
        let properties = &published[0].properties;
        assert!(properties
            .reply_to
            .as_deref()
            .is_some_and(|q| q.starts_with("amq.gen-")));
        assert!(properties.correlation_id.is_some());

        let body: serde_json::Value =
            serde_json::from_slice(&published[0].body).expect("json body");
        assert_eq!(body["hero"]["atk"], 50);
        assert_eq!(body["monster"]["gold"], 10);
    }

    #[tokio::test]
    async fn no_reply_times_out_without_leaking_the_call() {
        let broker = InMemoryBroker::new();
        let client = client(&broker, Duration::from_millis(50));

        let err = client
            .request_combat(request())
            .await
            .expect_err("nobody answers");

        assert!(matches!(err, CombatClientError::Timeout { timeout_ms: 50 }));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn reply_queue_is_removed_after_the_call() {
        let broker = InMemoryBroker::new();
        let client = client(&broker, Duration::from_millis(20));

        let _ = client.request_combat(request()).await;
        // The channel is closed off the caller's path.
        tokio::time::sleep(Duration::from_millis(30)).await;

        let published = broker.published_to("CombatQ").await;
        let reply_queue = published[0]
            .properties
            .reply_to
            .clone()
            .expect("reply_to set");
        assert!(!broker.queue_exists(&reply_queue).await);
    }

    #[tokio::test]
    async fn broker_outage_fails_fast() {
        let broker = InMemoryBroker::new();
        broker.set_available(false).await;
        let client = client(&broker, Duration::from_secs(5));

        let err = client.request_combat(request()).await.expect_err("down");
        assert!(matches!(err, CombatClientError::Broker(_)));
    }

    /// Connection attempts never complete, like a blackholed broker host.
    struct HangingBroker;

    #[async_trait]
    impl BrokerPort for HangingBroker {
        async fn connect(
            &self,
        ) -> Result<Arc<dyn crate::infrastructure::ports::BrokerConnection>, BrokerError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn deadline_covers_connecting_to_the_broker() {
        let connection = Arc::new(SharedConnection::new(Arc::new(HangingBroker)));
        let client = CombatRpcClient::new(
            connection,
            "CombatQ",
            Duration::from_millis(100),
            Duration::from_millis(5),
        );

        let started = Instant::now();
        let err = client
            .request_combat(request())
            .await
            .expect_err("broker never answers");

        assert!(matches!(err, CombatClientError::Timeout { timeout_ms: 100 }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn late_resolution_is_ignored() {
        let pending = PendingReplies::default();
        let (tx, _rx) = oneshot::channel();
        pending.insert("c-1".into(), tx);

        assert!(pending.remove("c-1"));
        assert!(!pending.resolve("c-1", Vec::new()));
        assert!(pending.is_empty());
    }
}
