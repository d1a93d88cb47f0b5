//! Destination registry: tenant endpoints and topic naming.

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;

/// Identifier of the single destination in shared-cluster mode.
pub const SHARED_DESTINATION: &str = "shared";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantEndpoint {
    pub id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicNaming {
    pub prefix: String,
    pub suffix: String,
    /// Used verbatim for every destination when set.
    pub explicit: Option<String>,
}

impl Default for TopicNaming {
    fn default() -> Self {
        Self {
            prefix: "events.team".into(),
            suffix: ".raw".into(),
            explicit: None,
        }
    }
}

impl TopicNaming {
    pub fn resolve(&self, destination_id: &str) -> String {
        if let Some(topic) = &self.explicit {
            return topic.clone();
        }
        if destination_id == SHARED_DESTINATION {
            return format!("{}{}", self.prefix, self.suffix);
        }
        format!("{}{}{}", self.prefix, destination_id, self.suffix)
    }
}

/// A broker endpoint and topic that receives every produced event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    pub endpoint: String,
    pub topic: String,
}

/// Destinations to attempt, in configuration order.
///
/// The tenant mapping takes precedence over the shared endpoint. An empty
/// result means nothing is configured. Duplicate endpoint/topic pairs are
/// passed through unchanged.
pub fn resolve_destinations(config: &GeneratorConfig) -> Vec<Destination> {
    if !config.tenants.is_empty() {
        return config
            .tenants
            .iter()
            .map(|t| Destination {
                id: t.id.clone(),
                endpoint: t.endpoint.clone(),
                topic: config.topics.resolve(&t.id),
            })
            .collect();
    }
    match &config.shared_endpoint {
        Some(endpoint) => vec![Destination {
            id: SHARED_DESTINATION.to_string(),
            endpoint: endpoint.clone(),
            topic: config.topics.resolve(SHARED_DESTINATION),
        }],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming(explicit: Option<&str>) -> TopicNaming {
        TopicNaming {
            prefix: "events.team".into(),
            suffix: ".raw".into(),
            explicit: explicit.map(str::to_string),
        }
    }

    #[test]
    fn tenant_topic_wraps_id() {
        assert_eq!(naming(None).resolve("acme"), "events.teamacme.raw");
    }

    #[test]
    fn shared_topic_omits_id() {
        assert_eq!(naming(None).resolve(SHARED_DESTINATION), "events.team.raw");
    }

    #[test]
    fn explicit_topic_wins_for_every_destination() {
        let naming = naming(Some("custom.topic"));
        assert_eq!(naming.resolve("acme"), "custom.topic");
        assert_eq!(naming.resolve("beta"), "custom.topic");
        assert_eq!(naming.resolve(SHARED_DESTINATION), "custom.topic");
    }

    #[test]
    fn tenants_take_precedence_over_shared_endpoint() {
        let config = GeneratorConfig {
            tenants: vec![
                TenantEndpoint {
                    id: "beta".into(),
                    endpoint: "b:9092".into(),
                },
                TenantEndpoint {
                    id: "alpha".into(),
                    endpoint: "a:9092".into(),
                },
            ],
            shared_endpoint: Some("shared:9092".into()),
            ..GeneratorConfig::default()
        };
        let destinations = resolve_destinations(&config);
        let ids: Vec<_> = destinations.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["beta", "alpha"]);
        assert_eq!(destinations[1].topic, "events.teamalpha.raw");
        assert!(destinations.iter().all(|d| d.id != SHARED_DESTINATION));
    }

    #[test]
    fn shared_mode_yields_single_sentinel() {
        let config = GeneratorConfig {
            shared_endpoint: Some("shared:9092".into()),
            ..GeneratorConfig::default()
        };
        let destinations = resolve_destinations(&config);
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].id, SHARED_DESTINATION);
        assert_eq!(destinations[0].topic, "events.team.raw");
    }

    #[test]
    fn nothing_configured_yields_nothing() {
        assert!(resolve_destinations(&GeneratorConfig::default()).is_empty());
    }
}
