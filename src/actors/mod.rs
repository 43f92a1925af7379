//! Actor-based fault-handling pipeline
//!
//! Each actor runs as an independent tokio task with private state. Actors
//! talk to each other only through named mailboxes (see [`channel`]); every
//! actor additionally has a command channel driven through its handle.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌──────────┐  reading   ┌──────────┐  fault notice  ┌────────────┐  REQUEST  ┌────────────┐
//!   │  Sensor  │ ─────────▶ │ Monitor  │ ─────────────▶ │  Decision  │ ────────▶ │  Fallback  │
//!   │          │ ◀───────── │          │ ◀───────────── │ (Q-learn)  │ ◀──────── │            │
//!   └──────────┘    ack     └──────────┘   resolution   └─────┬──────┘  solution └────────────┘
//!                                                             │ every 10th notice
//!                                                       ┌─────▼──────┐
//!                                                       │  Reporter  │ → ResponseSink
//!                                                       └────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **SensorActor**: emits synthetic readings, one per acknowledgment
//! - **MonitorActor**: acknowledges normal readings, escalates faults and
//!   waits for their resolution
//! - **DecisionActor**: picks a remedial action with Q-learning or asks the
//!   fallback actor, records response latencies
//! - **FallbackActor**: answers help requests after a simulated search
//! - **ReporterActor**: hands latency samples to the configured sink
//!
//! ## Communication Patterns
//!
//! 1. **Protocol messages**: [`messages::Message`] through [`channel::Directory`]
//! 2. **Commands**: each actor has an mpsc command channel for control messages
//! 3. **Request/Response**: oneshot channels for state queries

pub mod channel;
pub mod decision;
pub mod fallback;
pub mod messages;
pub mod monitor;
pub mod reporter;
pub mod sensor;
