//! ReporterActor - Forwards response samples to a sink
//!
//! Emissions are queued on a bounded channel with `try_send`, so the decision
//! actor never waits on the sink. If the queue is full the emission is dropped
//! with a warning; the next emission carries the full history anyway.
//!
//! ## Message Flow
//!
//! ```text
//! DecisionActor → Emit { samples } → ReporterActor → ResponseSink::emit
//!                                        ↑
//!                                        └─── Commands (Flush, GetStats, Shutdown)
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::sink::ResponseSink;

use super::messages::{ReporterCommand, ReporterStats, ResponseSample};

/// Capacity of the reporter's command queue
const QUEUE_CAPACITY: usize = 32;

/// Actor that owns the response sink
pub struct ReporterActor {
    /// Destination of every emission
    sink: Arc<dyn ResponseSink>,

    /// Command receiver
    command_rx: mpsc::Receiver<ReporterCommand>,

    /// Counters reported through `GetStats`
    stats: ReporterStats,
}

impl ReporterActor {
    pub fn new(sink: Arc<dyn ResponseSink>, command_rx: mpsc::Receiver<ReporterCommand>) -> Self {
        Self {
            sink,
            command_rx,
            stats: ReporterStats::default(),
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting reporter actor");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                ReporterCommand::Emit { samples } => self.emit(samples).await,

                ReporterCommand::Flush { respond_to } => {
                    let _ = respond_to.send(());
                }

                ReporterCommand::GetStats { respond_to } => {
                    let _ = respond_to.send(self.stats.clone());
                }

                ReporterCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("reporter actor stopped");
    }

    async fn emit(&mut self, samples: Vec<ResponseSample>) {
        match self.sink.emit(&samples).await {
            Ok(()) => {
                self.stats.emitted += 1;
                trace!("emitted {} samples", samples.len());
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("failed to emit response samples: {:#}", e);
            }
        }
    }
}

/// Handle for controlling the ReporterActor
#[derive(Clone)]
pub struct ReporterHandle {
    sender: mpsc::Sender<ReporterCommand>,
}

impl ReporterHandle {
    /// Spawn a new reporter actor
    pub fn spawn(sink: Arc<dyn ResponseSink>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(QUEUE_CAPACITY);

        let actor = ReporterActor::new(sink, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Queue an emission without waiting
    ///
    /// Returns `false` if the emission was dropped.
    pub fn publish(&self, samples: Vec<ResponseSample>) -> bool {
        match self.sender.try_send(ReporterCommand::Emit { samples }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("reporter queue full, dropping emission");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("reporter stopped, dropping emission");
                false
            }
        }
    }

    /// Wait until all queued emissions have been handed to the sink
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReporterCommand::Flush { respond_to: tx })
            .await
            .context("failed to send Flush command")?;

        rx.await.context("failed to receive flush response")?;
        Ok(())
    }

    /// Get reporter statistics
    pub async fn get_stats(&self) -> Option<ReporterStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReporterCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the reporter actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ReporterCommand::Shutdown).await;
    }
}
