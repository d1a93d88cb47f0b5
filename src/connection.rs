//! Per-destination connection establishment with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::GeneratorError;
use crate::registry::Destination;
use crate::transport::{ConnectOptions, Engine, EventPublisher, TransportBuilder, TransportError};

/// Opens a publisher handle for one destination.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn EventPublisher>, TransportError>;
}

/// Connector backed by a real broker engine.
pub struct BrokerConnector {
    engine: Engine,
    options: ConnectOptions,
}

impl BrokerConnector {
    pub fn new(engine: Engine, options: ConnectOptions) -> Self {
        Self { engine, options }
    }
}

#[async_trait::async_trait]
impl Connector for BrokerConnector {
    async fn connect(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn EventPublisher>, TransportError> {
        TransportBuilder::connect(self.engine.clone(), &destination.endpoint, &self.options).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between attempts; none after the last.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }
}

/// A destination whose handle was established at startup.
#[derive(Clone)]
pub struct LiveDestination {
    pub destination: Destination,
    publisher: Arc<dyn EventPublisher>,
}

impl LiveDestination {
    pub fn id(&self) -> &str {
        &self.destination.id
    }

    pub fn topic(&self) -> &str {
        &self.destination.topic
    }

    pub fn publisher(&self) -> &dyn EventPublisher {
        self.publisher.as_ref()
    }
}

impl std::fmt::Debug for LiveDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveDestination")
            .field("destination", &self.destination)
            .finish()
    }
}

/// Sorted destination ids, for operator-facing log lines.
pub fn sorted_ids(live: &[LiveDestination]) -> Vec<&str> {
    let mut ids: Vec<&str> = live.iter().map(LiveDestination::id).collect();
    ids.sort_unstable();
    ids
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, retry: RetryPolicy) -> Self {
        Self { connector, retry }
    }

    /// Connects one destination, retrying up to the policy's ceiling.
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn establish(
        &self,
        destination: Destination,
    ) -> Result<LiveDestination, TransportError> {
        let max = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.connector.connect(&destination).await {
                Ok(publisher) => {
                    info!(
                        destination = %destination.id,
                        endpoint = %destination.endpoint,
                        topic = %destination.topic,
                        "Connected to broker"
                    );
                    return Ok(LiveDestination {
                        destination,
                        publisher: Arc::from(publisher),
                    });
                }
                Err(e) => {
                    warn!(
                        destination = %destination.id,
                        attempt,
                        max_attempts = max,
                        error = %e,
                        "Connection attempt {attempt}/{max} failed"
                    );
                    if attempt >= max {
                        error!(
                            destination = %destination.id,
                            endpoint = %destination.endpoint,
                            "Failed to connect after all retries"
                        );
                        return Err(e);
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    /// Connects every destination sequentially, in the given order.
    ///
    /// Fails only when no destination could be connected.
    pub async fn establish_all(
        &self,
        destinations: Vec<Destination>,
    ) -> Result<Vec<LiveDestination>, GeneratorError> {
        let configured = destinations.len();
        if configured == 0 {
            return Err(GeneratorError::NoDestinations);
        }
        let mut live = Vec::with_capacity(configured);
        for destination in destinations {
            info!(destination = %destination.id, "Connecting to broker...");
            let id = destination.id.clone();
            match self.establish(destination).await {
                Ok(d) => live.push(d),
                Err(_) => warn!(destination = %id, "Skipping destination - connection failed"),
            }
        }

        info!("Connected to {}/{} destination(s)", live.len(), configured);
        if live.is_empty() {
            return Err(GeneratorError::NoLiveDestinations { configured });
        }
        info!(
            "Successfully connected destinations: {}",
            sorted_ids(&live).join(", ")
        );
        Ok(live)
    }
}
