//! Connection lifecycle on top of [`BrokerPort`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{BrokerChannel, BrokerConnection, BrokerError, BrokerPort};

/// Connect, retrying forever at a fixed `delay`.
///
/// Returns `None` only when `cancel` fires first.
pub async fn connect_with_retry(
    broker: &dyn BrokerPort,
    delay: Duration,
    cancel: &CancellationToken,
) -> Option<Arc<dyn BrokerConnection>> {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        tracing::debug!(attempt, "Connecting to broker");

        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = broker.connect() => result,
        };

        match result {
            Ok(connection) => {
                tracing::info!(attempt, "Connected to broker");
                return Some(connection);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "Broker unavailable, retrying"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Bound on a single connection attempt made by [`SharedConnection`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One long-lived broker connection per process, handing out a fresh channel
/// per call.
///
/// The connection is opened on first use and re-opened on the next call
/// after it drops. Callers see a single failed attempt as an error; they do
/// not wait for the broker to come back. An attempt that outlives the
/// connect timeout counts as failed, so callers queued behind the lock wait
/// at most that long.
pub struct SharedConnection {
    broker: Arc<dyn BrokerPort>,
    connect_timeout: Duration,
    current: Mutex<Option<Arc<dyn BrokerConnection>>>,
}

impl SharedConnection {
    pub fn new(broker: Arc<dyn BrokerPort>) -> Self {
        Self {
            broker,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            current: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub async fn channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        let mut current = self.current.lock().await;

        if let Some(connection) = current.as_ref().filter(|c| c.is_connected()) {
            match connection.open_channel().await {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    tracing::warn!(error = %e, "Shared broker connection unusable, reconnecting");
                }
            }
        }

        let connection = tokio::time::timeout(self.connect_timeout, self.broker.connect())
            .await
            .map_err(|_| {
                BrokerError::Connection(format!(
                    "no connection within {} ms",
                    self.connect_timeout.as_millis()
                ))
            })??;
        tracing::info!("Shared broker connection established");
        *current = Some(connection.clone());
        connection.open_channel().await
    }

    pub async fn close(&self) {
        if let Some(connection) = self.current.lock().await.take() {
            if let Err(e) = connection.close().await {
                tracing::debug!(error = %e, "Error closing shared broker connection");
            }
        }
    }
}

/// Close `channel` after `grace` without holding up the caller.
///
/// The grace period lets the broker finish bookkeeping for messages that
/// were just published or consumed.
pub fn close_after(channel: Arc<dyn BrokerChannel>, grace: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if let Err(e) = channel.close().await {
            tracing::debug!(error = %e, "Error closing broker channel");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_broker::InMemoryBroker;

    /// A broker behind a black hole: connection attempts never complete.
    struct HangingBroker;

    #[async_trait::async_trait]
    impl BrokerPort for HangingBroker {
        async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn retry_waits_for_the_broker_to_come_back() {
        let broker = InMemoryBroker::new();
        broker.set_available(false).await;

        let restore = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            restore.set_available(true).await;
        });

        let cancel = CancellationToken::new();
        let connection =
            connect_with_retry(&broker, Duration::from_millis(5), &cancel).await;

        assert!(connection.is_some_and(|c| c.is_connected()));
    }

    #[tokio::test]
    async fn retry_gives_up_only_when_cancelled() {
        let broker = InMemoryBroker::new();
        broker.set_available(false).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let connection =
            connect_with_retry(&broker, Duration::from_millis(5), &cancel).await;
        assert!(connection.is_none());
    }

    #[tokio::test]
    async fn shared_connection_reconnects_after_loss() {
        let broker = InMemoryBroker::new();
        let shared = SharedConnection::new(Arc::new(broker.clone()));

        shared.channel().await.expect("first channel");
        assert_eq!(broker.connections_opened().await, 1);

        shared.channel().await.expect("reused connection");
        assert_eq!(broker.connections_opened().await, 1);

        broker.set_available(false).await;
        assert!(shared.channel().await.is_err());

        broker.set_available(true).await;
        shared.channel().await.expect("reconnected");
        assert_eq!(broker.connections_opened().await, 2);
    }

    #[tokio::test]
    async fn hanging_connect_gives_up_after_the_connect_timeout() {
        let shared = SharedConnection::new(Arc::new(HangingBroker))
            .with_connect_timeout(Duration::from_millis(30));

        let started = tokio::time::Instant::now();
        let err = shared.channel().await.err().expect("connect never completes");

        assert!(matches!(err, BrokerError::Connection(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn close_after_closes_once_grace_elapsed() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect().await.expect("connect");
        let channel = connection.open_channel().await.expect("channel");
        let reply_queue = channel
            .declare_queue("", crate::infrastructure::ports::QueueOptions::exclusive())
            .await
            .expect("declare");

        close_after(channel, Duration::from_millis(10));
        assert!(broker.queue_exists(&reply_queue).await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!broker.queue_exists(&reply_queue).await);
    }
}
