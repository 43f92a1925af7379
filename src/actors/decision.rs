//! DecisionActor - Resolves fault notices with Q-learning or the fallback actor
//!
//! ## Decision Flow
//!
//! ```text
//! fault notice → bucket reading → choose_action(state)
//!   no action, or coin < 0.5:
//!     REQUEST fallback → wait for fallback only → reply to monitor → record latency sample
//!   otherwise:
//!     reward(action) → update_q_table(state, action, reward, state) → reply to monitor
//!
//! every 10th notice → hand all samples so far to the reporter
//! ```
//!
//! The escalation coin is drawn for every notice, independent of whether the
//! policy produced an action, so roughly half of all faults go to the fallback
//! actor even when a learned action is available.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::ActorNames;
use crate::learning::{Action, QLearning, State, reward_for};
use crate::random::RandomSource;

use super::channel::{Courier, Directory, Mailbox};
use super::messages::{
    DecisionCommand, DecisionStats, Message, Performative, ResponseSample,
};
use super::reporter::ReporterHandle;

/// Probability of asking the fallback actor even when an action is available
pub const ESCALATION_PROBABILITY: f64 = 0.5;

/// Samples are emitted after every this many fault notices
pub const EMIT_EVERY: u64 = 10;

static READING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("reading pattern is a valid regex"));

/// Extract the reading from a fault notice
///
/// The last number in the content is taken as the value.
pub fn extract_reading(content: &str) -> Option<i64> {
    READING.find_iter(content).last()?.as_str().parse().ok()
}

/// Content of a help request for a state
pub fn help_request(state: State) -> String {
    format!("Need help with state: {state}")
}

/// Actor that owns the Q-learning engine
pub struct DecisionActor {
    /// Name of the fallback actor to escalate to
    names: ActorNames,

    /// Inbox for fault notices and fallback solutions
    mailbox: Mailbox,

    /// Outbound messages, sent as the decision actor
    courier: Courier,

    /// Command receiver
    command_rx: mpsc::Receiver<DecisionCommand>,

    /// Q-table and exploration policy, owned by this actor only
    engine: QLearning,

    /// Source for the escalation coin-flip
    coin: Box<dyn RandomSource>,

    /// Destination for sample emissions (None = samples are only kept)
    reporter: Option<ReporterHandle>,

    /// Latency of every escalation so far, oldest first
    samples: Vec<ResponseSample>,

    /// Fault notices handled (drives the every-10th emission)
    faults_processed: u64,

    /// Notices resolved by the fallback actor
    escalations: u64,

    /// Notices resolved with a learned action
    direct_actions: u64,

    /// Emissions accepted by the reporter
    emissions: u64,
}

impl DecisionActor {
    pub fn new(
        names: ActorNames,
        mailbox: Mailbox,
        courier: Courier,
        command_rx: mpsc::Receiver<DecisionCommand>,
        engine: QLearning,
        coin: Box<dyn RandomSource>,
        reporter: Option<ReporterHandle>,
    ) -> Self {
        Self {
            names,
            mailbox,
            courier,
            command_rx,
            engine,
            coin,
            reporter,
            samples: Vec::new(),
            faults_processed: 0,
            escalations: 0,
            direct_actions: 0,
            emissions: 0,
        }
    }

    fn stats(&self) -> DecisionStats {
        DecisionStats {
            faults_processed: self.faults_processed,
            escalations: self.escalations,
            direct_actions: self.direct_actions,
            emissions: self.emissions,
            samples: self.samples.clone(),
            q_table: self.engine.snapshot(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self), fields(actor = %self.courier.id()))]
    pub async fn run(mut self) {
        debug!("starting decision actor");

        loop {
            tokio::select! {
                received = self.mailbox.receive() => {
                    match received {
                        Some(message) => self.handle_message(message).await,
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
                        DecisionCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats());
                        }

                        DecisionCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!(q_table = ?self.engine.snapshot(), "decision actor stopped");
    }

    async fn handle_message(&mut self, message: Message) {
        if !message.is_fault_notice() {
            trace!("ignoring non-fault message from {}", message.sender());
            return;
        }

        info!(
            "received fault reading from {}: {}",
            message.sender(),
            message.content()
        );

        let Some(value) = extract_reading(message.content()) else {
            warn!("dropping fault notice without a reading: {:?}", message.content());
            return;
        };

        self.faults_processed += 1;

        let state = State::from_reading(value);
        let action = self.engine.choose_action(state);
        let draw = self.coin.next_unit();
        debug!(%state, ?action, draw, "policy consulted");

        match action {
            Some(action) if draw >= ESCALATION_PROBABILITY => {
                self.apply_action(state, action, &message);
            }
            _ => self.escalate(state, &message).await,
        }

        if self.faults_processed % EMIT_EVERY == 0 {
            self.emit_samples();
        }
    }

    fn apply_action(&mut self, state: State, action: Action, notice: &Message) {
        let reward = reward_for(Some(action));

        // The next state is taken to be the current one
        self.engine.update_q_table(state, action, reward, state);
        self.direct_actions += 1;

        match self.courier.reply(
            notice,
            Performative::Inform,
            format!("Action taken: {action}"),
        ) {
            Ok(()) => debug!(%state, %action, reward, "applied learned action"),
            Err(e) => error!("failed to reply to monitor: {e}"),
        }
    }

    async fn escalate(&mut self, state: State, notice: &Message) {
        let started = Instant::now();

        info!("asking {} for help with state {state}", self.names.fallback);
        if let Err(e) = self.courier.send(
            &self.names.fallback,
            Performative::Request,
            help_request(state),
        ) {
            error!("failed to send help request: {e}");
            return;
        }

        // Only the fallback's answer ends the wait; other messages stay queued
        let Some(response) = self.mailbox.receive_from(&self.names.fallback).await else {
            warn!("mailbox closed while waiting for fallback");
            return;
        };

        if let Err(e) = self.courier.reply(
            notice,
            Performative::Inform,
            format!("Action taken based on help: {}", response.content()),
        ) {
            error!("failed to forward solution to monitor: {e}");
        }

        self.escalations += 1;

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.samples.push(ResponseSample {
            state: state.numeric(),
            latency_ms,
            recorded_at: Utc::now(),
        });
        debug!(%state, latency_ms, "recorded response sample");
    }

    fn emit_samples(&mut self) {
        let Some(reporter) = &self.reporter else {
            trace!("no reporter configured, keeping {} samples", self.samples.len());
            return;
        };

        if reporter.publish(self.samples.clone()) {
            self.emissions += 1;
            debug!("emitted {} response samples", self.samples.len());
        }
    }
}

/// Handle for controlling the DecisionActor
#[derive(Clone)]
pub struct DecisionHandle {
    sender: mpsc::Sender<DecisionCommand>,
}

impl DecisionHandle {
    /// Register the decision actor under `names.decision` and spawn it
    ///
    /// # Arguments
    /// - `engine`: Q-learning engine, possibly pre-seeded
    /// - `coin`: random source for the escalation coin-flip
    /// - `reporter`: where every 10th notice sends the accumulated samples
    pub fn spawn(
        directory: &Directory,
        names: ActorNames,
        engine: QLearning,
        coin: Box<dyn RandomSource>,
        reporter: Option<ReporterHandle>,
    ) -> Result<Self> {
        let mailbox = directory
            .register(names.decision.clone())
            .context("failed to register decision actor")?;
        let courier = directory.courier(names.decision.clone());

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = DecisionActor::new(names, mailbox, courier, cmd_rx, engine, coin, reporter);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Get counters, samples and a copy of the Q-table
    pub async fn get_stats(&self) -> Option<DecisionStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(DecisionCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the decision actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(DecisionCommand::Shutdown).await;
    }
}
