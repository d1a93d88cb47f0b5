//! In-memory broker (feature `transport-mock`).
//!
//! Records every accepted send per endpoint and lets callers inject connect,
//! send, flush and close failures. Used for dry runs and the test suite.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::connection::Connector;
use crate::registry::Destination;
use crate::transport::{ConnectOptions, EventPublisher, TransportError};

/// A send accepted by the mock broker.
#[derive(Clone, Debug)]
pub struct SentRecord {
    pub endpoint: String,
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Bytes,
}

#[derive(Default)]
struct MockState {
    connect_failures: HashMap<String, u32>,
    send_failures: HashMap<String, u32>,
    flush_failures: HashMap<String, u32>,
    hung_flushes: HashSet<String>,
    close_failures: HashSet<String>,
    connect_attempts: HashMap<String, u32>,
    sends: HashMap<String, u64>,
    flushes: HashMap<String, u32>,
    closes: HashMap<String, u32>,
    closed: HashSet<String>,
    sent: Vec<SentRecord>,
}

/// Consumes one injected failure for `endpoint`, if any remain.
fn take_failure(failures: &mut HashMap<String, u32>, endpoint: &str) -> bool {
    match failures.get_mut(endpoint) {
        Some(remaining) if *remaining > 0 => {
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            true
        }
        _ => false,
    }
}

#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `n` connection attempts to `endpoint`.
    pub fn fail_next_connects(&self, endpoint: &str, n: u32) {
        self.lock().connect_failures.insert(endpoint.to_string(), n);
    }

    /// Refuse every connection attempt to `endpoint`.
    pub fn refuse_connections(&self, endpoint: &str) {
        self.fail_next_connects(endpoint, u32::MAX);
    }

    pub fn fail_next_sends(&self, endpoint: &str, n: u32) {
        self.lock().send_failures.insert(endpoint.to_string(), n);
    }

    pub fn fail_next_flushes(&self, endpoint: &str, n: u32) {
        self.lock().flush_failures.insert(endpoint.to_string(), n);
    }

    /// Flushes on `endpoint` never complete.
    pub fn hang_flushes(&self, endpoint: &str) {
        self.lock().hung_flushes.insert(endpoint.to_string());
    }

    pub fn fail_close(&self, endpoint: &str) {
        self.lock().close_failures.insert(endpoint.to_string());
    }

    pub fn connect_attempts(&self, endpoint: &str) -> u32 {
        self.lock()
            .connect_attempts
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Accepted sends, including ones not kept in [`MockBroker::sent`].
    pub fn send_count(&self, endpoint: &str) -> u64 {
        self.lock().sends.get(endpoint).copied().unwrap_or(0)
    }

    pub fn flush_count(&self, endpoint: &str) -> u32 {
        self.lock().flushes.get(endpoint).copied().unwrap_or(0)
    }

    pub fn close_count(&self, endpoint: &str) -> u32 {
        self.lock().closes.get(endpoint).copied().unwrap_or(0)
    }

    pub fn is_closed(&self, endpoint: &str) -> bool {
        self.lock().closed.contains(endpoint)
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.lock().sent.clone()
    }

    pub fn sent_to(&self, endpoint: &str) -> Vec<SentRecord> {
        self.lock()
            .sent
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub async fn connect_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<Box<dyn EventPublisher>, TransportError> {
        self.open(endpoint, true)
    }

    fn open(
        &self,
        endpoint: &str,
        record: bool,
    ) -> Result<Box<dyn EventPublisher>, TransportError> {
        let mut state = self.lock();
        *state
            .connect_attempts
            .entry(endpoint.to_string())
            .or_default() += 1;
        if take_failure(&mut state.connect_failures, endpoint) {
            return Err(TransportError::Connect(format!(
                "mock broker at {endpoint} refused connection"
            )));
        }
        state.closed.remove(endpoint);
        Ok(Box::new(MockPublisher {
            endpoint: endpoint.to_string(),
            record,
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait::async_trait]
impl Connector for MockBroker {
    async fn connect(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn EventPublisher>, TransportError> {
        self.connect_endpoint(&destination.endpoint).await
    }
}

/// Standalone mock handle for `--engine mock`: sends are counted and
/// logged, payloads are dropped.
pub async fn connect(
    endpoint: &str,
    _opts: &ConnectOptions,
) -> Result<Box<dyn EventPublisher>, TransportError> {
    MockBroker::new().open(endpoint, false)
}

struct MockPublisher {
    endpoint: String,
    /// Keep payloads for [`MockBroker::sent`].
    record: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockPublisher {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl EventPublisher for MockPublisher {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: Bytes,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.closed.contains(&self.endpoint) {
            return Err(TransportError::Disconnected);
        }
        if take_failure(&mut state.send_failures, &self.endpoint) {
            return Err(TransportError::Publish(format!(
                "mock broker at {} rejected send",
                self.endpoint
            )));
        }
        debug!(endpoint = %self.endpoint, topic, bytes = value.len(), "mock send");
        *state.sends.entry(self.endpoint.clone()).or_default() += 1;
        if self.record {
            state.sent.push(SentRecord {
                endpoint: self.endpoint.clone(),
                topic: topic.to_string(),
                key: key.map(<[u8]>::to_vec),
                value,
            });
        }
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), TransportError> {
        let hang = {
            let mut state = self.lock();
            *state.flushes.entry(self.endpoint.clone()).or_default() += 1;
            if take_failure(&mut state.flush_failures, &self.endpoint) {
                return Err(TransportError::Timeout);
            }
            state.hung_flushes.contains(&self.endpoint)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        *state.closes.entry(self.endpoint.clone()).or_default() += 1;
        if state.close_failures.contains(&self.endpoint) {
            return Err(TransportError::Close(format!(
                "mock broker at {} failed to close",
                self.endpoint
            )));
        }
        state.closed.insert(self.endpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_send_failures_are_consumed_in_order() {
        let broker = MockBroker::new();
        broker.fail_next_sends("a:9092", 1);
        let publisher = broker.connect_endpoint("a:9092").await.expect("connect");

        let first = publisher
            .send("t", None, Bytes::from_static(b"one"))
            .await;
        assert!(first.is_err());
        publisher
            .send("t", Some(&b"k"[..]), Bytes::from_static(b"two"))
            .await
            .expect("second send");

        let sent = broker.sent_to("a:9092");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key.as_deref(), Some(&b"k"[..]));
    }

    #[tokio::test]
    async fn closed_handles_reject_sends() {
        let broker = MockBroker::new();
        let publisher = broker.connect_endpoint("a:9092").await.expect("connect");
        publisher.close().await.expect("close");

        assert!(broker.is_closed("a:9092"));
        let err = publisher
            .send("t", None, Bytes::from_static(b"late"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
        assert!(broker.sent().is_empty());
    }

    #[tokio::test]
    async fn standalone_handles_count_sends_without_keeping_payloads() {
        let broker = MockBroker::new();
        let publisher = broker.open("dry:9092", false).expect("connect");
        for _ in 0..3 {
            publisher
                .send("t", Some(&b"k"[..]), Bytes::from_static(b"payload"))
                .await
                .expect("send");
        }

        assert_eq!(broker.send_count("dry:9092"), 3);
        assert!(broker.sent().is_empty());
    }
}
