//! MQTT adapter (feature `transport-mqtt`), using rumqttc (async).
//!
//! `acks=all` maps to QoS 1; the in-flight window comes from
//! `max.in.flight.requests.per.connection`. MQTT has no partitions, so the
//! partition key is not transmitted.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::{ConnectOptions, EventPublisher, TransportError};

const DEFAULT_PORT: u16 = 1883;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(30);

pub async fn connect(
    endpoint: &str,
    opts: &ConnectOptions,
) -> Result<Box<dyn EventPublisher>, TransportError> {
    let (host, port) = split_endpoint(endpoint)?;
    let client_id = opts
        .get("client.id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("evgen-{}", uuid::Uuid::new_v4()));
    let qos = qos_for(opts.get("acks"));
    let inflight: u16 = opts
        .get("max.in.flight.requests.per.connection")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_inflight(inflight.max(1));
    let (client, mut eventloop) = AsyncClient::new(options, 100);

    // rumqttc connects lazily; drive the loop until the broker acknowledges.
    tokio::time::timeout(CONNECT_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    })
    .await
    .map_err(|_| TransportError::Timeout)??;

    let pending = Unacked::default();
    let acked = pending.clone();
    let endpoint_tag = endpoint.to_string();
    let poller = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::PubAck(_))) => acked.ack(),
                Ok(_) => {}
                Err(e) => {
                    warn!(endpoint = %endpoint_tag, error = %e, "mqtt event loop error; reconnecting");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    Ok(Box::new(MqttPublisher {
        client,
        qos,
        pending,
        poller,
    }))
}

/// QoS 1 publishes still waiting for a PUBACK.
///
/// A slot is taken before the publish is handed to the client, since the
/// event loop may see the PUBACK before `publish` returns.
#[derive(Clone, Default)]
struct Unacked(Arc<AtomicUsize>);

impl Unacked {
    fn begin(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Releases a slot whose publish never reached the client.
    fn abandon(&self) {
        self.ack();
    }

    fn ack(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn outstanding(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    pending: Unacked,
    poller: JoinHandle<()>,
}

#[async_trait::async_trait]
impl EventPublisher for MqttPublisher {
    async fn send(
        &self,
        topic: &str,
        _key: Option<&[u8]>,
        value: Bytes,
    ) -> Result<(), TransportError> {
        let tracked = self.qos != QoS::AtMostOnce;
        if tracked {
            self.pending.begin();
        }
        let result = self
            .client
            .publish(topic, self.qos, false, value.to_vec())
            .await;
        if let Err(e) = result {
            if tracked {
                self.pending.abandon();
            }
            return Err(TransportError::Publish(e.to_string()));
        }
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let outstanding = self.pending.outstanding();
            if outstanding == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Flush(format!(
                    "{outstanding} publish(es) still unacknowledged after {timeout:?}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| TransportError::Close(e.to_string()));
        self.poller.abort();
        debug!("mqtt publisher closed");
        result
    }
}

fn qos_for(acks: Option<&str>) -> QoS {
    match acks {
        Some("0") | Some("none") => QoS::AtMostOnce,
        _ => QoS::AtLeastOnce,
    }
}

// Helpers
fn split_endpoint(endpoint: &str) -> Result<(String, u16), TransportError> {
    let trimmed = endpoint
        .trim()
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://");
    match trimmed.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| {
                TransportError::Connect(format!("invalid port in endpoint {endpoint:?}"))
            })?;
            Ok((host.to_string(), port))
        }
        None if !trimmed.is_empty() => Ok((trimmed.to_string(), DEFAULT_PORT)),
        None => Err(TransportError::Connect("empty endpoint".into())),
    }
}
