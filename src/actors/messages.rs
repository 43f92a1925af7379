//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Protocol messages**: [`Message`] values travel between actors through
//!    their mailboxes and are consumed exactly once by the addressed receiver
//! 2. **Commands**: each actor also has an mpsc command channel for control
//!    messages (state queries, shutdown) driven through its handle
//! 3. **Request/Response**: oneshot channels for synchronous queries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::learning::QTableSnapshot;

/// Prefix of the content the monitor sends for a suspected fault
pub const FAULT_NOTICE_PREFIX: &str = "Check for fault";

/// Content of a plain acknowledgment
pub const ACKNOWLEDGED: &str = "acknowledged";

/// Stable, unique name of an actor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ActorId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Communicative intent of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Performative {
    Inform,
    Request,
}

/// A single protocol message
///
/// Fields are private so a message cannot change once it has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: ActorId,
    receiver: ActorId,
    performative: Performative,
    content: String,
}

impl Message {
    pub fn new(
        sender: ActorId,
        receiver: ActorId,
        performative: Performative,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            receiver,
            performative,
            content: content.into(),
        }
    }

    /// Build a reply addressed back to this message's sender
    pub fn reply(&self, performative: Performative, content: impl Into<String>) -> Message {
        Message::new(
            self.receiver.clone(),
            self.sender.clone(),
            performative,
            content,
        )
    }

    pub fn sender(&self) -> &ActorId {
        &self.sender
    }

    pub fn receiver(&self) -> &ActorId {
        &self.receiver
    }

    pub fn performative(&self) -> Performative {
        self.performative
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether this is a monitor-to-decision fault notice
    pub fn is_fault_notice(&self) -> bool {
        self.content.contains(FAULT_NOTICE_PREFIX)
    }
}

/// Content of a fault notice for a reading
pub fn fault_notice(value: i64) -> String {
    format!("{FAULT_NOTICE_PREFIX}: Value is {value}")
}

/// One response-latency data point
///
/// Recorded by the decision actor for every escalation to the fallback actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSample {
    /// Numeric encoding of the state (see [`State::numeric`](crate::learning::State::numeric))
    pub state: i32,

    /// Wall-clock duration of the escalation in milliseconds
    pub latency_ms: u64,

    /// When the sample was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Logical state of the monitor actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    /// Accepting sensor readings
    Idle,

    /// One fault escalation outstanding with the decision actor
    AwaitingDecision,
}

/// Commands that can be sent to the MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Get the current state and counters
    GetStats {
        respond_to: oneshot::Sender<MonitorStats>,
    },

    /// Gracefully shut down the monitor
    Shutdown,
}

/// Monitor counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    pub state: MonitorState,

    /// Readings acknowledged directly (value <= 50)
    pub direct_acks: u64,

    /// Fault notices sent to the decision actor
    pub escalations: u64,

    /// Readings that could not be parsed and were dropped
    pub malformed: u64,
}

/// Commands that can be sent to the DecisionActor
#[derive(Debug)]
pub enum DecisionCommand {
    /// Get counters and a copy of the Q-table
    GetStats {
        respond_to: oneshot::Sender<DecisionStats>,
    },

    /// Gracefully shut down the decision actor
    Shutdown,
}

/// Decision actor counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionStats {
    /// Fault notices processed over the actor's lifetime
    pub faults_processed: u64,

    /// Notices resolved through the fallback actor
    pub escalations: u64,

    /// Notices resolved with a learned action
    pub direct_actions: u64,

    /// Emissions handed to the reporter
    pub emissions: u64,

    /// Latency samples recorded so far
    pub samples: Vec<ResponseSample>,

    pub q_table: QTableSnapshot,
}

/// Commands that can be sent to the FallbackActor
#[derive(Debug)]
pub enum FallbackCommand {
    GetStats {
        respond_to: oneshot::Sender<FallbackStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackStats {
    /// Help requests answered
    pub requests_served: u64,

    /// Non-request messages ignored
    pub ignored: u64,
}

/// Commands that can be sent to the SensorActor
#[derive(Debug)]
pub enum SensorCommand {
    GetStats {
        respond_to: oneshot::Sender<SensorStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorStats {
    /// Readings sent to the monitor
    pub readings_sent: u64,

    /// Acknowledgments received
    pub acks_received: u64,

    /// Whether the configured number of readings has been fully acknowledged
    pub finished: bool,
}

/// Commands that can be sent to the ReporterActor
#[derive(Debug)]
pub enum ReporterCommand {
    /// Hand all samples recorded so far to the sink
    Emit { samples: Vec<ResponseSample> },

    /// Wait until every previously queued emission has been handled
    Flush { respond_to: oneshot::Sender<()> },

    /// Get reporter statistics
    GetStats {
        respond_to: oneshot::Sender<ReporterStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterStats {
    /// Successful sink emissions
    pub emitted: u64,

    /// Sink emissions that returned an error
    pub failed: u64,
}
