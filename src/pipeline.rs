//! Wiring of the complete actor system

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::actors::{
    channel::Directory, decision::DecisionHandle, fallback::FallbackHandle,
    monitor::MonitorHandle, reporter::ReporterHandle, sensor::SensorHandle,
};
use crate::config::{Config, SinkConfig};
use crate::learning::QLearning;
use crate::random::SeededRandom;
use crate::sink::{JsonLinesSink, LogSink, ResponseSink};

/// Build the sink described by the configuration
pub fn build_sink(config: &SinkConfig) -> Option<Arc<dyn ResponseSink>> {
    match config {
        SinkConfig::None => None,
        SinkConfig::Log => Some(Arc::new(LogSink)),
        SinkConfig::JsonLines { path } => Some(Arc::new(JsonLinesSink::new(path))),
    }
}

/// Handles to every actor of a running pipeline
#[derive(Clone)]
pub struct Pipeline {
    pub directory: Directory,
    pub sensor: SensorHandle,
    pub monitor: MonitorHandle,
    pub decision: DecisionHandle,
    pub fallback: FallbackHandle,
    pub reporter: Option<ReporterHandle>,
}

impl Pipeline {
    /// Spawn all actors with the sink from the configuration
    pub fn spawn(config: &Config) -> Result<Self> {
        Self::spawn_with_sink(config, build_sink(&config.sink))
    }

    /// Spawn all actors, emitting samples to `sink`
    pub fn spawn_with_sink(config: &Config, sink: Option<Arc<dyn ResponseSink>>) -> Result<Self> {
        Self::spawn_in(Directory::new(), config, sink)
    }

    /// Spawn all actors into an existing directory
    ///
    /// Actors are started leaf-first so that every receiver is registered
    /// before the sensor sends its first reading. If a later actor cannot be
    /// registered, the handles spawned so far are dropped, which stops their
    /// actors and frees their names.
    pub fn spawn_in(
        directory: Directory,
        config: &Config,
        sink: Option<Arc<dyn ResponseSink>>,
    ) -> Result<Self> {
        let names = config.names.clone();

        let reporter = sink.map(ReporterHandle::spawn);

        let fallback = FallbackHandle::spawn(
            &directory,
            names.fallback.clone(),
            Duration::from_millis(config.fallback.delay_ms),
        )?;

        let decision = DecisionHandle::spawn(
            &directory,
            names.clone(),
            QLearning::with_seed(config.decision.policy_seed),
            Box::new(SeededRandom::from_seed(config.decision.escalation_seed)),
            reporter.clone(),
        )?;

        let monitor = MonitorHandle::spawn(&directory, names.clone())?;

        let sensor = SensorHandle::spawn(
            &directory,
            &names,
            &config.sensor,
            Box::new(SeededRandom::from_seed(config.sensor.seed)),
        )?;

        info!("pipeline started: {directory:?}");

        Ok(Self {
            directory,
            sensor,
            monitor,
            decision,
            fallback,
            reporter,
        })
    }

    /// Shut every actor down, producer first
    pub async fn shutdown(&self) {
        debug!("shutting down pipeline");

        self.sensor.shutdown().await;
        self.monitor.shutdown().await;
        self.decision.shutdown().await;
        self.fallback.shutdown().await;

        if let Some(reporter) = &self.reporter {
            let _ = reporter.flush().await;
            reporter.shutdown().await;
        }
    }
}
