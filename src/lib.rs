//! Synthetic health event generator.
//!
//! Resolves broker destinations, connects each with bounded retry, and runs
//! a paced production loop that fans every generated event out to all live
//! destinations.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod production;
pub mod rate;
pub mod registry;
pub mod synth;
pub mod transport;

pub use config::GeneratorConfig;
pub use error::GeneratorError;
pub use lifecycle::Generator;
