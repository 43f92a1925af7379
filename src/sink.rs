//! Destinations for response-latency samples
//!
//! The decision actor periodically hands its accumulated samples to the
//! [`ReporterActor`](crate::actors::reporter::ReporterActor), which forwards
//! them to a [`ResponseSink`]. Sinks never talk back to the protocol: an error
//! is logged by the reporter and otherwise ignored.
//!
//! ## Implementations
//!
//! - [`LogSink`]: writes a summary of the series through `tracing`
//! - [`JsonLinesSink`]: appends one JSON document per emission to a file, the
//!   input format for an external chart renderer
//! - [`MemorySink`]: keeps every emission in memory (tests, embedding)

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::actors::messages::ResponseSample;

/// Name of the emitted series
pub const SERIES_NAME: &str = "Response Times";

/// Trait for consumers of response samples
///
/// Implementations must be `Send + Sync` as they are driven from the
/// reporter's task.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Receive every sample recorded so far, in recording order
    async fn emit(&self, samples: &[ResponseSample]) -> Result<()>;
}

/// One emission as written by [`JsonLinesSink`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emission {
    pub series: String,
    pub emitted_at: DateTime<Utc>,
    pub samples: Vec<ResponseSample>,
}

/// Sink that reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ResponseSink for LogSink {
    async fn emit(&self, samples: &[ResponseSample]) -> Result<()> {
        let count = samples.len();
        let mean = if count == 0 {
            0.0
        } else {
            samples.iter().map(|s| s.latency_ms as f64).sum::<f64>() / count as f64
        };

        info!("{SERIES_NAME}: {count} samples, mean latency {mean:.1} ms");

        for sample in samples {
            debug!("state {} -> {} ms", sample.state, sample.latency_ms);
        }

        Ok(())
    }
}

/// Sink that appends JSON lines to a file
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResponseSink for JsonLinesSink {
    async fn emit(&self, samples: &[ResponseSample]) -> Result<()> {
        let emission = Emission {
            series: SERIES_NAME.to_string(),
            emitted_at: Utc::now(),
            samples: samples.to_vec(),
        };

        let mut line = serde_json::to_string(&emission).context("failed to serialize samples")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        file.flush().await?;

        debug!("appended {} samples to {}", samples.len(), self.path.display());
        Ok(())
    }
}

/// Sink that keeps every emission in memory
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    emissions: Arc<Mutex<Vec<Vec<ResponseSample>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emission received so far, oldest first
    pub fn emissions(&self) -> Vec<Vec<ResponseSample>> {
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn emit(&self, samples: &[ResponseSample]) -> Result<()> {
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(samples.to_vec());
        Ok(())
    }
}
