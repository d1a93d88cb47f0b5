//! Kafka adapter (feature `transport-kafka`), using rdkafka's `FutureProducer`.
//!
//! Sends only enqueue into librdkafka's buffer; delivery reports are tallied
//! in the background and a non-zero tally fails the next flush.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::debug;

use crate::transport::{ConnectOptions, EventPublisher, TransportError};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect(
    endpoint: &str,
    opts: &ConnectOptions,
) -> Result<Box<dyn EventPublisher>, TransportError> {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", endpoint);
    for (k, v) in &opts.params {
        config.set(k, v);
    }
    let producer: FutureProducer = config
        .create()
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    // Producer creation never touches the network; probe the cluster so an
    // unreachable endpoint fails here instead of on the first send.
    let probe = producer.clone();
    tokio::task::spawn_blocking(move || {
        probe
            .client()
            .fetch_metadata(None, METADATA_TIMEOUT)
            .map(|_| ())
    })
    .await
    .map_err(|e| TransportError::Connect(e.to_string()))?
    .map_err(|e| TransportError::Connect(e.to_string()))?;

    Ok(Box::new(KafkaPublisher {
        producer,
        failed_deliveries: Arc::new(AtomicU64::new(0)),
    }))
}

struct KafkaPublisher {
    producer: FutureProducer,
    failed_deliveries: Arc<AtomicU64>,
}

impl KafkaPublisher {
    async fn flush_blocking(&self, timeout: Duration) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
            .map_err(|e| TransportError::Flush(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EventPublisher for KafkaPublisher {
    async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: Bytes,
    ) -> Result<(), TransportError> {
        let record = FutureRecord::<[u8], [u8]>::to(topic).payload(value.as_ref());
        let record = match key {
            Some(k) => record.key(k),
            None => record,
        };
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| TransportError::Publish(e.to_string()))?;

        let failed = Arc::clone(&self.failed_deliveries);
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((e, _))) => {
                    debug!(error = %e, "kafka delivery failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), TransportError> {
        self.flush_blocking(timeout).await?;
        let failed = self.failed_deliveries.swap(0, Ordering::Relaxed);
        if failed > 0 {
            return Err(TransportError::Flush(format!(
                "{failed} delivery report(s) failed since last flush"
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.flush_blocking(CLOSE_FLUSH_TIMEOUT)
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
