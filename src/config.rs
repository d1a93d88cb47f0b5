//! Generator configuration.
//!
//! Built once at startup, either from CLI flags (each with an environment
//! variable fallback) or from a YAML file, then passed by value into the
//! [`Generator`](crate::lifecycle::Generator).

use std::collections::BTreeMap;
use std::path::Path;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::registry::{TenantEndpoint, TopicNaming};

pub const DEFAULT_STREAMS: &str = "symptom_report,clinic_visit,environmental_conditions";
pub const DEFAULT_REGIONS: &str = "Boston,Cambridge,Somerville,Brookline,Newton";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub linger_ms: u64,
    pub batch_size: usize,
    /// Extra client properties passed through to every handle.
    pub properties: BTreeMap<String, String>,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            linger_ms: 5,
            batch_size: 16_384,
            properties: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Broker engine name (`kafka`, `mqtt`, `mock`).
    pub engine: String,
    pub rate_per_sec: f64,
    /// Documented as "rate applies per team"; pacing ignores it.
    pub rate_per_destination: bool,
    /// Multi-tenant mode, in configuration order.
    pub tenants: Vec<TenantEndpoint>,
    /// Single shared cluster, used only when `tenants` is empty.
    pub shared_endpoint: Option<String>,
    pub topics: TopicNaming,
    pub streams: Vec<String>,
    pub regions: Vec<String>,
    pub seed: Option<u64>,
    pub producer: ProducerSettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            engine: "kafka".into(),
            rate_per_sec: 10.0,
            rate_per_destination: false,
            tenants: Vec::new(),
            shared_endpoint: None,
            topics: TopicNaming::default(),
            streams: split_list(DEFAULT_STREAMS),
            regions: split_list(DEFAULT_REGIONS),
            seed: None,
            producer: ProducerSettings::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, GeneratorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| GeneratorError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&raw).map_err(|e| GeneratorError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.streams.is_empty() {
            return Err(GeneratorError::Config("event stream list is empty".into()));
        }
        if self.regions.is_empty() {
            return Err(GeneratorError::Config("region list is empty".into()));
        }
        if self.rate_per_sec.is_nan() {
            return Err(GeneratorError::Config("event rate is not a number".into()));
        }
        Ok(())
    }
}

/// Operational flags, each backed by the environment variable of the same role.
#[derive(Args, Debug, Clone)]
pub struct GeneratorArgs {
    /// Broker engine (kafka, mqtt, mock)
    #[arg(long, env = "BROKER_ENGINE", default_value = "kafka")]
    pub engine: String,

    /// Events per second
    #[arg(long, env = "EVENT_RATE_PER_SEC", default_value = "10")]
    pub rate: f64,

    /// Document the rate as applying per team (no pacing effect)
    #[arg(long, env = "RATE_PER_TEAM", default_value = "false", action = clap::ArgAction::Set, value_parser = parse_flag)]
    pub rate_per_team: bool,

    /// Multi-tenant mapping: team=host:port,team=host:port
    #[arg(long, env = "TEAM_BOOTSTRAP_SERVERS")]
    pub team_bootstrap_servers: Option<String>,

    /// Single shared cluster endpoint
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub kafka_bootstrap_servers: Option<String>,

    #[arg(long, env = "TOPIC_PREFIX", default_value = "events.team")]
    pub topic_prefix: String,

    #[arg(long, env = "TOPIC_SUFFIX", default_value = ".raw")]
    pub topic_suffix: String,

    /// Explicit topic used for every destination
    #[arg(long, env = "TOPIC")]
    pub topic: Option<String>,

    /// Comma-separated stream types
    #[arg(long, env = "EVENT_STREAMS", default_value = DEFAULT_STREAMS)]
    pub streams: String,

    /// Comma-separated regions
    #[arg(long, env = "REGIONS", default_value = DEFAULT_REGIONS)]
    pub regions: String,

    /// Deterministic seed (integer, or any string)
    #[arg(long, env = "RANDOM_SEED")]
    pub seed: Option<String>,

    #[arg(long, env = "PRODUCER_LINGER_MS", default_value = "5")]
    pub linger_ms: u64,

    #[arg(long, env = "PRODUCER_BATCH_SIZE", default_value = "16384")]
    pub batch_size: usize,

    /// Extra producer properties (key=value), repeatable
    #[arg(long = "producer-opt")]
    pub producer_opts: Vec<String>,
}

impl GeneratorArgs {
    pub fn into_config(self) -> GeneratorConfig {
        let properties = crate::transport::config::parse_connect_kv(&self.producer_opts).params;
        GeneratorConfig {
            engine: self.engine,
            rate_per_sec: self.rate,
            rate_per_destination: self.rate_per_team,
            tenants: self
                .team_bootstrap_servers
                .as_deref()
                .map(parse_tenant_mapping)
                .unwrap_or_default(),
            shared_endpoint: self
                .kafka_bootstrap_servers
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            topics: TopicNaming {
                prefix: self.topic_prefix,
                suffix: self.topic_suffix,
                explicit: self.topic.filter(|t| !t.is_empty()),
            },
            streams: split_list(&self.streams),
            regions: split_list(&self.regions),
            seed: self.seed.as_deref().map(parse_seed),
            producer: ProducerSettings {
                linger_ms: self.linger_ms,
                batch_size: self.batch_size,
                properties,
            },
        }
    }
}

/// Only a case-insensitive `true` enables a flag.
fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

/// Splits a comma-separated list, trimming entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `team=endpoint,team=endpoint`. Entries without `=` are ignored; a
/// repeated team keeps its first position and takes the last endpoint.
pub fn parse_tenant_mapping(raw: &str) -> Vec<TenantEndpoint> {
    let mut tenants: Vec<TenantEndpoint> = Vec::new();
    for entry in raw.split(',') {
        let Some((id, endpoint)) = entry.split_once('=') else {
            continue;
        };
        let (id, endpoint) = (id.trim(), endpoint.trim());
        match tenants.iter_mut().find(|t| t.id == id) {
            Some(existing) => existing.endpoint = endpoint.to_string(),
            None => tenants.push(TenantEndpoint {
                id: id.to_string(),
                endpoint: endpoint.to_string(),
            }),
        }
    }
    tenants
}

/// Integer seeds of any size are reduced modulo 2^64; anything else seeds
/// with the sum of its character code points.
pub fn parse_seed(raw: &str) -> u64 {
    integer_seed(raw.trim()).unwrap_or_else(|| raw.chars().map(|c| c as u64).sum())
}

fn integer_seed(raw: &str) -> Option<u64> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = digits.bytes().fold(0u64, |acc, b| {
        acc.wrapping_mul(10).wrapping_add(u64::from(b - b'0'))
    });
    Some(if negative { value.wrapping_neg() } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: GeneratorArgs,
    }

    #[test]
    fn tenant_mapping_keeps_order_and_skips_malformed_entries() {
        let tenants = parse_tenant_mapping("alpha=a:9092, junk ,beta = b:9092,alpha=a2:9092");
        let pairs: Vec<_> = tenants
            .iter()
            .map(|t| (t.id.as_str(), t.endpoint.as_str()))
            .collect();
        assert_eq!(pairs, vec![("alpha", "a2:9092"), ("beta", "b:9092")]);
    }

    #[test]
    fn seeds_fall_back_to_codepoint_sum() {
        assert_eq!(parse_seed("42"), 42);
        assert_eq!(parse_seed("ab"), 97 + 98);
        assert_eq!(parse_seed("4a"), 52 + 97);
    }

    #[test]
    fn integer_seeds_beyond_64_bits_wrap() {
        assert_eq!(parse_seed(" 7 "), 7);
        assert_eq!(parse_seed("-1"), u64::MAX);
        assert_eq!(parse_seed("18446744073709551615"), u64::MAX);
        assert_eq!(parse_seed("18446744073709551617"), 1);
        assert_eq!(parse_seed("+36893488147419103234"), 2);
    }

    #[test]
    fn lists_drop_blank_entries() {
        assert_eq!(split_list(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn cli_flags_build_config() {
        let cli = TestCli::try_parse_from([
            "event-generator",
            "--team-bootstrap-servers",
            "alpha=a:9092,beta=b:9092",
            "--rate",
            "5",
            "--streams",
            "symptom_report",
            "--seed",
            "7",
            "--producer-opt",
            "compression.type=lz4",
        ])
        .expect("parse");
        let config = cli.args.into_config();

        assert_eq!(config.rate_per_sec, 5.0);
        assert_eq!(config.tenants.len(), 2);
        assert_eq!(config.streams, vec!["symptom_report".to_string()]);
        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.producer.properties.get("compression.type").map(String::as_str),
            Some("lz4")
        );
        assert_eq!(config.topics.prefix, "events.team");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = GeneratorConfig::from_yaml_str(
            "engine: mqtt\nshared_endpoint: broker:1883\nrate_per_sec: 2.5\n",
        )
        .expect("yaml");
        assert_eq!(config.engine, "mqtt");
        assert_eq!(config.shared_endpoint.as_deref(), Some("broker:1883"));
        assert_eq!(config.rate_per_sec, 2.5);
        assert_eq!(config.streams.len(), 3);
        assert_eq!(config.producer.linger_ms, 5);
    }

    #[test]
    fn empty_stream_list_is_rejected() {
        let config = GeneratorConfig {
            streams: Vec::new(),
            ..GeneratorConfig::default()
        };
        assert!(matches!(config.validate(), Err(GeneratorError::Config(_))));
    }
}
