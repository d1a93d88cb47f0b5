use thiserror::Error;

/// Failures visible to whoever starts the generator.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error(
        "no broker configuration provided; set TEAM_BOOTSTRAP_SERVERS for multi-team or KAFKA_BOOTSTRAP_SERVERS for single-cluster mode"
    )]
    NoDestinations,
    #[error("none of the {configured} configured destination(s) could be connected")]
    NoLiveDestinations { configured: usize },
    #[error("generator has already been started")]
    AlreadyStarted,
    #[error("unknown broker engine {0:?}")]
    UnknownEngine(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to load config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },
}
