//! FallbackActor - Answers help requests from the decision actor
//!
//! ## Message Flow
//!
//! ```text
//! REQUEST "<problem>" → simulated search (delay) → INFORM "Solution for <problem>"
//! ```
//!
//! Requests are served one at a time; anything that is not a REQUEST is ignored.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use super::channel::{Courier, Directory, Mailbox};
use super::messages::{ActorId, FallbackCommand, FallbackStats, Message, Performative};

/// Solution text for a help request
pub fn solution_for(request: &str) -> String {
    format!("Solution for {request}")
}

/// Actor that synthesizes solutions for escalated faults
pub struct FallbackActor {
    /// Inbox for help requests
    mailbox: Mailbox,

    /// Outbound messages, sent as the fallback actor
    courier: Courier,

    /// Command receiver
    command_rx: mpsc::Receiver<FallbackCommand>,

    /// Simulated search time per request
    delay: Duration,

    /// Counters reported through `GetStats`
    stats: FallbackStats,
}

impl FallbackActor {
    pub fn new(
        mailbox: Mailbox,
        courier: Courier,
        command_rx: mpsc::Receiver<FallbackCommand>,
        delay: Duration,
    ) -> Self {
        Self {
            mailbox,
            courier,
            command_rx,
            delay,
            stats: FallbackStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self), fields(actor = %self.courier.id()))]
    pub async fn run(mut self) {
        debug!("starting fallback actor");

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
                        FallbackCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        FallbackCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("fallback actor stopped");
    }

    async fn handle_message(&mut self, message: Message) {
        if message.performative() != Performative::Request {
            self.stats.ignored += 1;
            trace!(
                "ignoring {:?} from {}",
                message.performative(),
                message.sender()
            );
            return;
        }

        info!(
            "request received from {}: {}",
            message.sender(),
            message.content()
        );

        let solution = solution_for(message.content());

        debug!("searching for solution ({:?})", self.delay);
        tokio::time::sleep(self.delay).await;

        info!("sending the solution back to {}", message.sender());
        match self
            .courier
            .reply(&message, Performative::Inform, solution)
        {
            Ok(()) => self.stats.requests_served += 1,
            Err(e) => error!("failed to send solution: {e}"),
        }
    }
}

/// Handle for controlling the FallbackActor
#[derive(Clone)]
pub struct FallbackHandle {
    sender: mpsc::Sender<FallbackCommand>,
}

impl FallbackHandle {
    /// Register the fallback actor under `name` and spawn it
    pub fn spawn(directory: &Directory, name: ActorId, delay: Duration) -> Result<Self> {
        let mailbox = directory
            .register(name.clone())
            .context("failed to register fallback actor")?;
        let courier = directory.courier(name);

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = FallbackActor::new(mailbox, courier, cmd_rx, delay);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    pub async fn get_stats(&self) -> Option<FallbackStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(FallbackCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the fallback actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(FallbackCommand::Shutdown).await;
    }
}
