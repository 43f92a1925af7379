//! Helper functions for integration tests

use std::time::Duration;

use fault_agents::actors::channel::{Courier, Directory, Mailbox};
use fault_agents::actors::messages::{ActorId, Message, Performative};
use fault_agents::config::ActorNames;
use fault_agents::learning::QLearning;
use fault_agents::random::{RandomSource, ScriptedRandom};

/// Coin value that always takes the escalation path
pub const ESCALATE: f64 = 0.0;

/// Coin value that always takes the direct path
pub const DIRECT: f64 = 0.9;

/// How long a probe waits for an expected message
const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A hand-driven stand-in for an actor
pub struct Probe {
    pub mailbox: Mailbox,
    pub courier: Courier,
}

impl Probe {
    pub fn register(directory: &Directory, name: &ActorId) -> Self {
        Self {
            mailbox: directory.register(name.clone()).unwrap(),
            courier: directory.courier(name.clone()),
        }
    }

    pub fn inform(&self, to: &ActorId, content: &str) {
        self.courier.send(to, Performative::Inform, content).unwrap();
    }

    pub fn reply(&self, to: &Message, content: &str) {
        self.courier
            .reply(to, Performative::Inform, content)
            .unwrap();
    }

    pub async fn expect_message(&mut self) -> Message {
        tokio::time::timeout(EXPECT_TIMEOUT, self.mailbox.receive())
            .await
            .expect("timed out waiting for message")
            .expect("mailbox closed")
    }

    pub async fn expect_silence(&mut self, millis: u64) {
        let result =
            tokio::time::timeout(Duration::from_millis(millis), self.mailbox.receive()).await;

        if let Ok(message) = result {
            panic!("expected no message, got {message:?}");
        }
    }
}

/// Wait until no live actor is registered under `name`
pub async fn wait_unregistered(directory: &Directory, name: &ActorId) -> bool {
    for _ in 0..200 {
        if !directory.contains(name) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    false
}

pub fn test_names() -> ActorNames {
    ActorNames::default()
}

/// Engine whose policy always exploits
pub fn exploiting_engine() -> QLearning {
    QLearning::new(Box::new(ScriptedRandom::constant(0.0)))
}

pub fn coin(value: f64) -> Box<dyn RandomSource> {
    Box::new(ScriptedRandom::constant(value))
}
