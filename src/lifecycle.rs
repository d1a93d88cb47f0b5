//! Start/stop orchestration for the generator.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::GeneratorConfig;
use crate::connection::{ConnectionManager, Connector, LiveDestination, RetryPolicy};
use crate::error::GeneratorError;
use crate::metrics::stats::{self, ProductionStats, StatsReceiver};
use crate::production::{ProductionLoop, RunFlag};
use crate::rate::RateController;
use crate::registry;
use crate::synth::Synthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Stopped,
}

/// Owns the live destinations and the background production task.
///
/// A generator runs once: `Idle → Running → Stopped`.
pub struct Generator {
    config: GeneratorConfig,
    connections: ConnectionManager,
    run: RunFlag,
    state: State,
    live: Arc<[LiveDestination]>,
    task: Option<JoinHandle<()>>,
    stats: Option<StatsReceiver>,
}

impl Generator {
    pub fn new(config: GeneratorConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_retry(config, connector, RetryPolicy::default())
    }

    pub fn with_retry(
        config: GeneratorConfig,
        connector: Arc<dyn Connector>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            connections: ConnectionManager::new(connector, retry),
            run: RunFlag::new(),
            state: State::Idle,
            live: Arc::from(Vec::new()),
            task: None,
            stats: None,
        }
    }

    /// Connects every configured destination and launches production.
    ///
    /// Returns once the loop is spawned; fails without spawning it when no
    /// destination could be connected.
    pub async fn start(&mut self) -> Result<(), GeneratorError> {
        if self.state != State::Idle {
            return Err(GeneratorError::AlreadyStarted);
        }
        self.config.validate()?;

        let destinations = registry::resolve_destinations(&self.config);
        if destinations.is_empty() {
            error!("No broker configuration provided");
            return Err(GeneratorError::NoDestinations);
        }
        let live: Arc<[LiveDestination]> = match self.connections.establish_all(destinations).await
        {
            Ok(live) => live.into(),
            Err(e) => {
                error!(error = %e, "Cannot start generator without at least one broker connection");
                return Err(e);
            }
        };

        let (tx, rx) = stats::channel(live.len());
        let production = ProductionLoop::new(
            Arc::clone(&live),
            Synthesizer::new(self.config.regions.clone(), self.config.seed),
            self.config.streams.clone(),
            RateController::new(self.config.rate_per_sec, self.config.rate_per_destination),
            self.run.clone(),
            tx,
        );

        self.run.start();
        self.task = Some(tokio::spawn(production.run()));
        self.live = live;
        self.stats = Some(rx);
        self.state = State::Running;
        info!("Event generator started");
        Ok(())
    }

    /// Signals the loop, waits for its current iteration, then closes every
    /// handle. Close failures are logged and do not stop the remaining closes.
    ///
    /// Does nothing unless the generator is running.
    pub async fn stop(&mut self) {
        if self.state != State::Running {
            return;
        }
        self.run.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Production task ended abnormally");
            }
        }
        for destination in self.live.iter() {
            let id = destination.id();
            match destination.publisher().close().await {
                Ok(()) => info!(destination = %id, "Closed producer for {id}"),
                Err(e) => error!(destination = %id, error = %e, "Error closing producer for {id}"),
            }
        }
        self.state = State::Stopped;
        info!("Event generator stopped");
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running && self.run.is_running()
    }

    pub fn live_destinations(&self) -> Vec<&str> {
        crate::connection::sorted_ids(&self.live)
    }

    /// Latest production snapshot, once started.
    pub fn stats(&self) -> Option<ProductionStats> {
        self.stats.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn subscribe(&self) -> Option<StatsReceiver> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TenantEndpoint;
    use crate::transport::mock::MockBroker;

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            engine: "mock".into(),
            rate_per_sec: 10.0,
            tenants: vec![TenantEndpoint {
                id: "alpha".into(),
                endpoint: "a:9092".into(),
            }],
            seed: Some(5),
            ..GeneratorConfig::default()
        }
    }

    #[tokio::test]
    async fn nothing_configured_fails_before_connecting() {
        let broker = MockBroker::new();
        let mut generator = Generator::new(
            GeneratorConfig::default(),
            Arc::new(broker.clone()),
        );
        let err = generator.start().await.unwrap_err();
        assert!(matches!(err, GeneratorError::NoDestinations));
        assert_eq!(generator.state(), State::Idle);
        assert!(generator.stats().is_none());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let broker = MockBroker::new();
        let mut generator = Generator::new(
            GeneratorConfig {
                regions: Vec::new(),
                ..config()
            },
            Arc::new(broker.clone()),
        );
        assert!(matches!(
            generator.start().await,
            Err(GeneratorError::Config(_))
        ));
        assert_eq!(broker.connect_attempts("a:9092"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn generator_runs_once() {
        let broker = MockBroker::new();
        let mut generator = Generator::new(config(), Arc::new(broker.clone()));

        generator.start().await.expect("start");
        assert!(generator.is_running());
        assert!(matches!(
            generator.start().await,
            Err(GeneratorError::AlreadyStarted)
        ));

        generator.stop().await;
        assert_eq!(generator.state(), State::Stopped);
        assert!(!generator.is_running());
        assert!(matches!(
            generator.start().await,
            Err(GeneratorError::AlreadyStarted)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn close_failure_does_not_skip_other_handles() {
        let broker = MockBroker::new();
        broker.fail_close("a:9092");
        let mut generator = Generator::new(
            GeneratorConfig {
                tenants: vec![
                    TenantEndpoint {
                        id: "alpha".into(),
                        endpoint: "a:9092".into(),
                    },
                    TenantEndpoint {
                        id: "beta".into(),
                        endpoint: "b:9092".into(),
                    },
                ],
                ..config()
            },
            Arc::new(broker.clone()),
        );

        generator.start().await.expect("start");
        generator.stop().await;

        assert!(!broker.is_closed("a:9092"));
        assert!(broker.is_closed("b:9092"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_stop_closes_nothing() {
        let broker = MockBroker::new();
        let mut generator = Generator::new(config(), Arc::new(broker.clone()));

        generator.start().await.expect("start");
        generator.stop().await;
        generator.stop().await;

        assert_eq!(broker.close_count("a:9092"), 1);
        assert_eq!(generator.state(), State::Stopped);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let broker = MockBroker::new();
        let mut generator = Generator::new(config(), Arc::new(broker.clone()));

        generator.stop().await;

        assert_eq!(generator.state(), State::Idle);
        assert_eq!(broker.connect_attempts("a:9092"), 0);
    }
}
