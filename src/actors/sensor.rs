//! SensorActor - Synthetic periodic producer of readings
//!
//! ## Message Flow
//!
//! ```text
//! start → reading → wait for ack → interval → reading → wait for ack → ...
//! ```
//!
//! Readings are uniform integers in `[0, 100)`. There is no retry and no
//! timeout: a reading that is never acknowledged stalls the sensor.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ActorNames, SensorConfig};
use crate::random::RandomSource;

use super::channel::{Courier, Directory, Mailbox};
use super::messages::{ActorId, Message, Performative, SensorCommand, SensorStats};

/// Exclusive upper bound of synthetic readings
pub const READING_UPPER_BOUND: usize = 100;

/// Actor that feeds readings to the monitor
pub struct SensorActor {
    /// Receiver of every reading
    monitor: ActorId,

    /// Inbox for acknowledgments
    mailbox: Mailbox,

    /// Outbound messages, sent as the sensor
    courier: Courier,

    /// Command receiver
    command_rx: mpsc::Receiver<SensorCommand>,

    /// Source of synthetic readings
    random: Box<dyn RandomSource>,

    /// Delay between an acknowledgment and the next reading
    interval: Duration,

    /// Stop once this many readings are acknowledged (None = run forever)
    max_readings: Option<u64>,

    /// Counters reported through `GetStats`
    stats: SensorStats,

    /// Flipped to `true` once `max_readings` are acknowledged
    finished_tx: watch::Sender<bool>,
}

impl SensorActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        monitor: ActorId,
        mailbox: Mailbox,
        courier: Courier,
        command_rx: mpsc::Receiver<SensorCommand>,
        random: Box<dyn RandomSource>,
        interval: Duration,
        max_readings: Option<u64>,
        finished_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            monitor,
            mailbox,
            courier,
            command_rx,
            random,
            interval,
            max_readings,
            stats: SensorStats::default(),
            finished_tx,
        }
    }

    /// Run the actor's main loop
    ///
    /// Sends the first reading immediately, then one reading per acknowledgment.
    #[instrument(skip(self), fields(actor = %self.courier.id()))]
    pub async fn run(mut self) {
        debug!("starting sensor actor");

        if self.max_readings == Some(0) {
            self.finish();
        } else {
            self.send_reading();
        }

        loop {
            tokio::select! {
                received = self.mailbox.receive() => {
                    match received {
                        Some(message) => self.handle_ack(message).await,
                        None => {
                            warn!("mailbox closed, shutting down");
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    // Every handle has been dropped
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        SensorCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        SensorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("sensor actor stopped");
    }

    fn send_reading(&mut self) {
        let value = self.random.next_index(READING_UPPER_BOUND);

        info!("sending reading {value} to {}", self.monitor);
        match self
            .courier
            .send(&self.monitor, Performative::Inform, value.to_string())
        {
            Ok(()) => self.stats.readings_sent += 1,
            Err(e) => error!("failed to send reading: {e}"),
        }
    }

    async fn handle_ack(&mut self, message: Message) {
        self.stats.acks_received += 1;
        info!(
            "received response from {}: {}",
            message.sender(),
            message.content()
        );

        if self.stats.finished {
            return;
        }

        if self
            .max_readings
            .is_some_and(|max| self.stats.acks_received >= max)
        {
            self.finish();
            return;
        }

        tokio::time::sleep(self.interval).await;
        self.send_reading();
    }

    fn finish(&mut self) {
        info!(
            "all {} readings acknowledged, sensor finished",
            self.stats.readings_sent
        );
        self.stats.finished = true;
        let _ = self.finished_tx.send(true);
    }
}

/// Handle for controlling the SensorActor
#[derive(Clone)]
pub struct SensorHandle {
    sender: mpsc::Sender<SensorCommand>,

    finished: watch::Receiver<bool>,
}

impl SensorHandle {
    /// Register the sensor under `names.sensor` and spawn it
    ///
    /// The first reading is sent as soon as the actor starts, so the monitor
    /// must already be registered.
    pub fn spawn(
        directory: &Directory,
        names: &ActorNames,
        config: &SensorConfig,
        random: Box<dyn RandomSource>,
    ) -> Result<Self> {
        let mailbox = directory
            .register(names.sensor.clone())
            .context("failed to register sensor")?;
        let courier = directory.courier(names.sensor.clone());

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (finished_tx, finished_rx) = watch::channel(false);

        let actor = SensorActor::new(
            names.monitor.clone(),
            mailbox,
            courier,
            cmd_rx,
            random,
            Duration::from_millis(config.interval_ms),
            config.max_readings,
            finished_tx,
        );
        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            finished: finished_rx,
        })
    }

    pub async fn get_stats(&self) -> Option<SensorStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SensorCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Wait until the configured number of readings has been acknowledged
    ///
    /// Returns `false` if the sensor stopped before finishing.
    pub async fn wait_finished(&self) -> bool {
        let mut finished = self.finished.clone();
        finished.wait_for(|done| *done).await.is_ok()
    }

    /// Shutdown the sensor actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SensorCommand::Shutdown).await;
    }
}
