//! MonitorActor - Classifies sensor readings and escalates faults
//!
//! ## State Machine
//!
//! ```text
//! Idle:
//!   reading <= 50            → ack sensor, stay Idle
//!   reading >  50            → fault notice to decision actor → AwaitingDecision
//!   reading malformed        → log and drop, stay Idle
//!
//! AwaitingDecision:
//!   message from decision    → "Fault processed: ..." to sensor → Idle
//!   anything else            → left queued until Idle again
//! ```
//!
//! While a fault is outstanding the monitor only listens to the decision
//! actor, so a new reading is never processed before the previous fault has
//! been resolved.

use std::num::ParseIntError;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ActorNames;

use super::channel::{Courier, Directory, Mailbox};
use super::messages::{
    ACKNOWLEDGED, ActorId, Message, MonitorCommand, MonitorState, MonitorStats, Performative,
    fault_notice,
};

/// Readings above this value are treated as faults
pub const FAULT_THRESHOLD: i64 = 50;

/// Whether a reading must be escalated
pub fn is_fault(value: i64) -> bool {
    value > FAULT_THRESHOLD
}

/// Parse the content of a sensor reading
pub fn parse_reading(content: &str) -> Result<i64, ParseIntError> {
    content.trim().parse()
}

/// Content the monitor sends to the sensor once a fault has been resolved
pub fn fault_processed(resolution: &str) -> String {
    format!("Fault processed: {resolution}")
}

/// Actor that gates sensor readings on outstanding fault escalations
pub struct MonitorActor {
    /// Names of the sensor and decision actors
    names: ActorNames,

    /// Inbox for readings and resolutions
    mailbox: Mailbox,

    /// Outbound messages, sent as the monitor
    courier: Courier,

    /// Command receiver
    command_rx: mpsc::Receiver<MonitorCommand>,

    /// The reading whose fault is being resolved (the wait-flag)
    pending: Option<Message>,

    /// Readings acknowledged without escalation
    direct_acks: u64,

    /// Fault notices sent to the decision actor
    escalations: u64,

    /// Readings dropped because they were not numbers
    malformed: u64,
}

impl MonitorActor {
    pub fn new(
        names: ActorNames,
        mailbox: Mailbox,
        courier: Courier,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        Self {
            names,
            mailbox,
            courier,
            command_rx,
            pending: None,
            direct_acks: 0,
            escalations: 0,
            malformed: 0,
        }
    }

    fn state(&self) -> MonitorState {
        if self.pending.is_some() {
            MonitorState::AwaitingDecision
        } else {
            MonitorState::Idle
        }
    }

    fn stats(&self) -> MonitorStats {
        MonitorStats {
            state: self.state(),
            direct_acks: self.direct_acks,
            escalations: self.escalations,
            malformed: self.malformed,
        }
    }

    async fn next_message(mailbox: &mut Mailbox, awaiting: Option<&ActorId>) -> Option<Message> {
        match awaiting {
            Some(decision) => mailbox.receive_from(decision).await,
            None => mailbox.receive().await,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or the mailbox is closed.
    #[instrument(skip(self), fields(actor = %self.courier.id()))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        loop {
            let awaiting = self.pending.as_ref().map(|_| &self.names.decision);

            tokio::select! {
                received = Self::next_message(&mut self.mailbox, awaiting) => {
                    match received {
                        Some(message) => self.handle_message(message),
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
                        MonitorCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats());
                        }

                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("monitor actor stopped");
    }

    fn handle_message(&mut self, message: Message) {
        match self.pending.take() {
            None => self.handle_reading(message),
            Some(reading) => self.resolve(reading, message),
        }
    }

    fn handle_reading(&mut self, message: Message) {
        info!(
            "received reading from {}: {}",
            message.sender(),
            message.content()
        );

        let value = match parse_reading(message.content()) {
            Ok(value) => value,
            Err(e) => {
                self.malformed += 1;
                warn!(
                    "dropping malformed reading {:?} from {}: {e}",
                    message.content(),
                    message.sender()
                );
                return;
            }
        };

        if !is_fault(value) {
            self.direct_acks += 1;
            if let Err(e) = self
                .courier
                .reply(&message, Performative::Inform, ACKNOWLEDGED)
            {
                error!("failed to acknowledge reading: {e}");
            }
            return;
        }

        info!("sending fault reading to decision actor and waiting for response");
        match self.courier.send(
            &self.names.decision,
            Performative::Inform,
            fault_notice(value),
        ) {
            Ok(()) => {
                self.escalations += 1;
                self.pending = Some(message);
            }
            Err(e) => error!("failed to escalate fault: {e}"),
        }
    }

    fn resolve(&mut self, reading: Message, resolution: Message) {
        info!("received response from decision actor: {}", resolution.content());

        if let Err(e) = self.courier.reply(
            &reading,
            Performative::Inform,
            fault_processed(resolution.content()),
        ) {
            error!("failed to send resolution to sensor: {e}");
        }
    }
}

/// Handle for controlling the MonitorActor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Register the monitor under `names.monitor` and spawn it
    pub fn spawn(directory: &Directory, names: ActorNames) -> Result<Self> {
        let mailbox = directory
            .register(names.monitor.clone())
            .context("failed to register monitor")?;
        let courier = directory.courier(names.monitor.clone());

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = MonitorActor::new(names, mailbox, courier, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Get the current state and counters
    pub async fn get_stats(&self) -> Option<MonitorStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the monitor actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }
}
