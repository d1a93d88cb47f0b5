//! Transport abstraction: publisher trait, error type, and builder factory.

pub mod config;
#[cfg(feature = "transport-kafka")]
pub mod kafka;
#[cfg(any(test, feature = "transport-mock"))]
pub mod mock;
#[cfg(feature = "transport-mqtt")]
pub mod mqtt;

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Engine {
    Kafka,
    Mqtt,
    #[cfg(any(test, feature = "transport-mock"))]
    Mock,
}

/// Producer properties applied to every handle at creation.
///
/// Keys follow Kafka client naming (`acks`, `linger.ms`, ...); adapters that
/// are not Kafka map the ones they understand and ignore the rest.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    pub params: BTreeMap<String, String>,
}

impl ConnectOptions {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("publish: {0}")]
    Publish(String),
    #[error("flush: {0}")]
    Flush(String),
    #[error("close: {0}")]
    Close(String),
    #[error("timeout")]
    Timeout,
    #[error("disconnected")]
    Disconnected,
    #[error("other: {0}")]
    Other(String),
}

/// A durable publisher handle bound to one broker endpoint.
///
/// Implementations keep at most one request in flight per connection so that
/// sends to a single destination stay ordered.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn send(&self, topic: &str, key: Option<&[u8]>, value: Bytes)
    -> Result<(), TransportError>;
    async fn flush(&self, timeout: Duration) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

pub struct TransportBuilder;

impl TransportBuilder {
    pub async fn connect(
        engine: Engine,
        endpoint: &str,
        opts: &ConnectOptions,
    ) -> Result<Box<dyn EventPublisher>, TransportError> {
        match engine {
            Engine::Kafka => {
                #[cfg(feature = "transport-kafka")]
                {
                    crate::transport::kafka::connect(endpoint, opts).await
                }
                #[cfg(not(feature = "transport-kafka"))]
                {
                    let _ = (endpoint, opts);
                    Err(TransportError::Connect("kafka feature disabled".into()))
                }
            }
            Engine::Mqtt => {
                #[cfg(feature = "transport-mqtt")]
                {
                    crate::transport::mqtt::connect(endpoint, opts).await
                }
                #[cfg(not(feature = "transport-mqtt"))]
                {
                    let _ = (endpoint, opts);
                    Err(TransportError::Connect("mqtt feature disabled".into()))
                }
            }
            #[cfg(any(test, feature = "transport-mock"))]
            Engine::Mock => crate::transport::mock::connect(endpoint, opts).await,
        }
    }
}
