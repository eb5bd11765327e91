//! In-memory broker for development and testing
//!
//! Follows AMQP default-exchange semantics closely enough to exercise the
//! worker and RPC flows without RabbitMQ: named queues, server-named
//! exclusive queues owned by a channel, round-robin consumers, manual
//! acknowledgement with requeue and the redelivered flag. Nothing is
//! persisted and only this process can reach it.
//!
//! `set_available(false)` simulates losing the broker: every connection dies,
//! consumer streams end, unacknowledged messages go back to their queues and
//! new connection attempts fail until availability is restored.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex};

use crate::infrastructure::ports::{
    AckMode, BrokerChannel, BrokerConnection, BrokerError, BrokerPort, Delivery, DeliveryAcker,
    DeliveryStream, MessageProperties, OutboundMessage, QueueOptions,
};

/// Most recent publishes kept for inspection; older ones are forgotten.
pub const PUBLISH_LOG_CAPACITY: usize = 256;

/// In-memory broker. Clones share the same queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

struct BrokerState {
    available: AtomicBool,
    /// Bumped on every simulated outage; connections from older
    /// generations are dead.
    generation: AtomicU64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    connections_opened: usize,
    /// channel id -> connection id
    channels: HashMap<u64, u64>,
    queues: HashMap<String, QueueState>,
    /// delivery tag -> message awaiting ack
    unacked: HashMap<u64, Unacked>,
    published: VecDeque<(String, OutboundMessage)>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct QueueState {
    /// Channel owning an exclusive queue.
    owner: Option<u64>,
    ready: VecDeque<Stored>,
    consumers: Vec<Consumer>,
    next_consumer: usize,
}

#[derive(Clone)]
struct Stored {
    body: Vec<u8>,
    properties: MessageProperties,
    redelivered: bool,
}

struct Consumer {
    channel_id: u64,
    mode: AckMode,
    tx: mpsc::UnboundedSender<Result<Delivery, BrokerError>>,
}

struct Unacked {
    queue: String,
    channel_id: u64,
    message: Stored,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                available: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub async fn set_available(&self, available: bool) {
        let mut inner = self.state.inner.lock().await;
        if !available {
            self.state.generation.fetch_add(1, Ordering::SeqCst);
            let channels: Vec<u64> = inner.channels.keys().copied().collect();
            for channel_id in channels {
                close_channel(&self.state, &mut inner, channel_id);
            }
            tracing::debug!("In-memory broker went away");
        }
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Successful connections since creation.
    pub async fn connections_opened(&self) -> usize {
        self.state.inner.lock().await.connections_opened
    }

    pub async fn queue_exists(&self, queue: &str) -> bool {
        self.state.inner.lock().await.queues.contains_key(queue)
    }

    /// Messages waiting in `queue` for a consumer.
    pub async fn ready_count(&self, queue: &str) -> usize {
        self.state
            .inner
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    pub async fn consumer_count(&self, queue: &str) -> usize {
        self.state
            .inner
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, |q| q.consumers.len())
    }

    /// Delivered but not yet acknowledged, across all queues.
    pub async fn unacked_count(&self) -> usize {
        self.state.inner.lock().await.unacked.len()
    }

    /// Recent messages published to `queue`, routable or not, oldest first.
    /// Only the last [`PUBLISH_LOG_CAPACITY`] publishes across all queues are
    /// remembered.
    pub async fn published_to(&self, queue: &str) -> Vec<OutboundMessage> {
        self.state
            .inner
            .lock()
            .await
            .published
            .iter()
            .filter(|(name, _)| name == queue)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerPort for InMemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection(
                "in-memory broker unavailable".to_string(),
            ));
        }

        let mut inner = self.state.inner.lock().await;
        inner.connections_opened += 1;
        let id = inner.next_id();

        Ok(Arc::new(MemoryConnection {
            handle: Arc::new(ConnectionHandle {
                id,
                generation: self.state.generation.load(Ordering::SeqCst),
                closed: AtomicBool::new(false),
                state: self.state.clone(),
            }),
        }))
    }
}

struct ConnectionHandle {
    id: u64,
    generation: u64,
    closed: AtomicBool,
    state: Arc<BrokerState>,
}

impl ConnectionHandle {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.state.available.load(Ordering::SeqCst)
            && self.state.generation.load(Ordering::SeqCst) == self.generation
    }
}

struct MemoryConnection {
    handle: Arc<ConnectionHandle>,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        if !self.handle.is_open() {
            return Err(BrokerError::Closed);
        }

        let mut inner = self.handle.state.inner.lock().await;
        let id = inner.next_id();
        inner.channels.insert(id, self.handle.id);

        Ok(Arc::new(MemoryChannel {
            id,
            closed: AtomicBool::new(false),
            connection: self.handle.clone(),
        }))
    }

    fn is_connected(&self) -> bool {
        self.handle.is_open()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.handle.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let state = &self.handle.state;
        let mut inner = state.inner.lock().await;
        let channels: Vec<u64> = inner
            .channels
            .iter()
            .filter(|(_, connection)| **connection == self.handle.id)
            .map(|(channel, _)| *channel)
            .collect();
        for channel_id in channels {
            close_channel(state, &mut inner, channel_id);
        }
        Ok(())
    }
}

struct MemoryChannel {
    id: u64,
    closed: AtomicBool,
    connection: Arc<ConnectionHandle>,
}

impl MemoryChannel {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) || !self.connection.is_open() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    fn state(&self) -> &Arc<BrokerState> {
        &self.connection.state
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, BrokerError> {
        self.ensure_open()?;
        let mut inner = self.state().inner.lock().await;

        let name = if name.is_empty() {
            format!("amq.gen-{}", inner.next_id())
        } else {
            name.to_string()
        };

        let owner = options.exclusive.then_some(self.id);
        inner.queues.entry(name.clone()).or_insert_with(|| QueueState {
            owner,
            ready: VecDeque::new(),
            consumers: Vec::new(),
            next_consumer: 0,
        });
        Ok(name)
    }

    async fn set_prefetch(&self, _count: u16) -> Result<(), BrokerError> {
        // Deliveries are not throttled in memory.
        self.ensure_open()
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut inner = self.state().inner.lock().await;
        if inner.published.len() == PUBLISH_LOG_CAPACITY {
            inner.published.pop_front();
        }
        inner.published.push_back((queue.to_string(), message.clone()));

        let Some(target) = inner.queues.get_mut(queue) else {
            // The default exchange silently drops unroutable messages.
            tracing::debug!(queue = %queue, "Dropping message for undeclared queue");
            return Ok(());
        };
        target.ready.push_back(Stored {
            body: message.body,
            properties: message.properties,
            redelivered: false,
        });
        pump(self.state(), &mut inner, queue);
        Ok(())
    }

    async fn consume(&self, queue: &str, mode: AckMode) -> Result<DeliveryStream, BrokerError> {
        self.ensure_open()?;
        let mut inner = self.state().inner.lock().await;

        let Some(target) = inner.queues.get_mut(queue) else {
            return Err(BrokerError::consume(queue, "no such queue"));
        };
        let (tx, rx) = mpsc::unbounded_channel();
        target.consumers.push(Consumer {
            channel_id: self.id,
            mode,
            tx,
        });
        pump(self.state(), &mut inner, queue);

        Ok(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut inner = self.state().inner.lock().await;
        close_channel(self.state(), &mut inner, self.id);
        Ok(())
    }
}

struct MemoryAcker {
    state: Arc<BrokerState>,
    tag: u64,
}

impl MemoryAcker {
    fn unknown_tag(&self) -> BrokerError {
        BrokerError::Acknowledge(format!("unknown delivery tag {}", self.tag))
    }
}

#[async_trait]
impl DeliveryAcker for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        let mut inner = self.state.inner.lock().await;
        inner
            .unacked
            .remove(&self.tag)
            .map(|_| ())
            .ok_or_else(|| self.unknown_tag())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        let mut inner = self.state.inner.lock().await;
        let entry = inner
            .unacked
            .remove(&self.tag)
            .ok_or_else(|| self.unknown_tag())?;
        if requeue {
            requeue_message(&self.state, &mut inner, entry);
        }
        Ok(())
    }
}

/// Hand ready messages of `queue` to its consumers, round-robin.
fn pump(state: &Arc<BrokerState>, inner: &mut Inner, queue: &str) {
    loop {
        let tag = inner.next_id();
        let Inner {
            queues, unacked, ..
        } = &mut *inner;

        let Some(target) = queues.get_mut(queue) else {
            return;
        };
        if target.consumers.is_empty() {
            return;
        }
        let Some(message) = target.ready.pop_front() else {
            return;
        };

        let index = target.next_consumer % target.consumers.len();
        let consumer = &target.consumers[index];
        let channel_id = consumer.channel_id;
        let manual = consumer.mode == AckMode::Manual;

        let mut delivery = Delivery::new(
            message.body.clone(),
            message.properties.clone(),
            message.redelivered,
        );
        if manual {
            delivery = delivery.with_acker(Box::new(MemoryAcker {
                state: state.clone(),
                tag,
            }));
        }

        if consumer.tx.send(Ok(delivery)).is_err() {
            // Receiver dropped without cancelling; forget the consumer.
            target.consumers.remove(index);
            target.ready.push_front(message);
            continue;
        }

        target.next_consumer = index + 1;
        if manual {
            unacked.insert(
                tag,
                Unacked {
                    queue: queue.to_string(),
                    channel_id,
                    message,
                },
            );
        }
    }
}

fn requeue_message(state: &Arc<BrokerState>, inner: &mut Inner, entry: Unacked) {
    let Unacked {
        queue, mut message, ..
    } = entry;
    if let Some(target) = inner.queues.get_mut(&queue) {
        message.redelivered = true;
        target.ready.push_front(message);
        pump(state, inner, &queue);
    }
}

/// Drop the channel's consumers and exclusive queues; its unacknowledged
/// deliveries go back to their queues.
fn close_channel(state: &Arc<BrokerState>, inner: &mut Inner, channel_id: u64) {
    inner.channels.remove(&channel_id);
    inner.queues.retain(|_, q| q.owner != Some(channel_id));
    for target in inner.queues.values_mut() {
        target.consumers.retain(|c| c.channel_id != channel_id);
    }

    let tags: Vec<u64> = inner
        .unacked
        .iter()
        .filter(|(_, entry)| entry.channel_id == channel_id)
        .map(|(tag, _)| *tag)
        .collect();
    for tag in tags {
        if let Some(entry) = inner.unacked.remove(&tag) {
            requeue_message(state, inner, entry);
        }
    }
}
