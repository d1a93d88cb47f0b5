use super::{ConnectOptions, Engine};
use crate::config::ProducerSettings;

pub fn parse_engine(s: &str) -> Option<Engine> {
    match s.to_lowercase().as_str() {
        "kafka" => Some(Engine::Kafka),
        "mqtt" => Some(Engine::Mqtt),
        #[cfg(any(test, feature = "transport-mock"))]
        "mock" => Some(Engine::Mock),
        _ => None,
    }
}

pub fn parse_connect_kv(pairs: &[String]) -> ConnectOptions {
    let mut opts = ConnectOptions::default();
    for p in pairs {
        if let Some((k, v)) = p.split_once('=') {
            opts.params.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    opts
}

/// Handle properties for every destination.
///
/// Durability and ordering settings are fixed; pass-through properties may
/// only add keys, never loosen `acks` or the in-flight cap.
pub fn producer_options(settings: &ProducerSettings) -> ConnectOptions {
    let mut opts = ConnectOptions::default();
    for (k, v) in &settings.properties {
        opts.params.insert(k.clone(), v.clone());
    }
    opts.params.insert("acks".into(), "all".into());
    opts.params
        .insert("max.in.flight.requests.per.connection".into(), "1".into());
    opts.params
        .insert("linger.ms".into(), settings.linger_ms.to_string());
    opts.params
        .insert("batch.size".into(), settings.batch_size.to_string());
    opts
}
