//! Q-learning decision engine
//!
//! The engine owns a state-action value table over a small, static universe:
//! two modeled reading buckets and two remedial actions. It is synchronous and
//! performs no I/O; the [`DecisionActor`](crate::actors::decision::DecisionActor)
//! owns the only instance and serializes all access to it.
//!
//! ## Policy
//!
//! ```text
//! state unmodeled         → DEFAULT_ACTION
//! unit <  EXPLOIT_PROB    → argmax_a Q(state, a)   (ties: declaration order)
//! unit >= EXPLOIT_PROB    → uniform over the state's actions
//! ```
//!
//! ## Update rule
//!
//! ```text
//! Q(s,a) ← Q(s,a) + α · (r + γ · max_a' Q(s',a') − Q(s,a))
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::random::{RandomSource, SeededRandom};

/// Learning rate
pub const ALPHA: f64 = 0.1;

/// Discount factor
pub const GAMMA: f64 = 0.9;

/// Probability of exploiting the best known action
pub const EXPLOIT_PROBABILITY: f64 = 0.8;

/// Action returned for states that are not in the table
pub const DEFAULT_ACTION: Action = Action::Action1;

/// Discretized reading bucket used as the learning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    #[serde(rename = "51-60")]
    Range51To60,
    #[serde(rename = "61-70")]
    Range61To70,
    #[serde(rename = "unknown")]
    Unknown,
}

impl State {
    /// States that have a table entry from the start
    pub const MODELED: [State; 2] = [State::Range51To60, State::Range61To70];

    /// Bucket a raw reading
    ///
    /// `51..=60` and `61..=99` are modeled; everything else (including values
    /// the synthetic sensor can never produce) falls into [`State::Unknown`].
    pub fn from_reading(value: i64) -> Self {
        match value {
            51..=60 => State::Range51To60,
            61..=99 => State::Range61To70,
            _ => State::Unknown,
        }
    }

    /// Human-readable bucket label
    pub fn label(&self) -> &'static str {
        match self {
            State::Range51To60 => "51-60",
            State::Range61To70 => "61-70",
            State::Unknown => "unknown",
        }
    }

    /// Numeric encoding used for response samples
    pub fn numeric(&self) -> i32 {
        match self {
            State::Range51To60 => 1,
            State::Range61To70 => 2,
            State::Unknown => 0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Remedial action the learner can take
///
/// Declaration order is the canonical order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Action1,
    Action2,
}

impl Action {
    /// All known actions in canonical order
    pub const ALL: [Action; 2] = [Action::Action1, Action::Action2];

    /// Fixed training reward for taking this action
    pub fn reward(&self) -> f64 {
        match self {
            Action::Action1 => 5.0,
            Action::Action2 => 3.0,
        }
    }

    /// Label used in replies and Q-table snapshots
    pub fn name(&self) -> &'static str {
        match self {
            Action::Action1 => "Action1",
            Action::Action2 => "Action2",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reward for an optional action; no action earns nothing
pub fn reward_for(action: Option<Action>) -> f64 {
    action.map_or(0.0, |action| action.reward())
}

/// Serializable copy of the Q-table, keyed by labels
pub type QTableSnapshot = BTreeMap<String, BTreeMap<String, f64>>;

/// Tabular Q-learning engine
pub struct QLearning {
    table: HashMap<State, BTreeMap<Action, f64>>,
    random: Box<dyn RandomSource>,
}

impl QLearning {
    /// Create an engine drawing from the given random source
    pub fn new(random: Box<dyn RandomSource>) -> Self {
        let table = State::MODELED
            .iter()
            .map(|state| (*state, Self::fresh_entry()))
            .collect();

        Self { table, random }
    }

    /// Create an engine with a seeded (or entropy-seeded) source
    pub fn with_seed(seed: Option<u64>) -> Self {
        Self::new(Box::new(SeededRandom::from_seed(seed)))
    }

    fn fresh_entry() -> BTreeMap<Action, f64> {
        Action::ALL.iter().map(|action| (*action, 0.0)).collect()
    }

    /// Whether `state` has an entry in the table
    pub fn is_modeled(&self, state: State) -> bool {
        self.table.contains_key(&state)
    }

    /// Current value of `(state, action)`, if the state is modeled
    pub fn q_value(&self, state: State, action: Action) -> Option<f64> {
        self.table.get(&state)?.get(&action).copied()
    }

    /// Overwrite a single value, creating the state entry if needed
    pub fn set_q_value(&mut self, state: State, action: Action, value: f64) {
        self.table
            .entry(state)
            .or_insert_with(Self::fresh_entry)
            .insert(action, value);
    }

    /// Select an action for `state`
    ///
    /// Unmodeled states get [`DEFAULT_ACTION`]. `None` is returned only when a
    /// modeled state has no actions at all.
    pub fn choose_action(&mut self, state: State) -> Option<Action> {
        let Some(actions) = self.table.get(&state) else {
            trace!(%state, "state not modeled, using default action");
            return Some(DEFAULT_ACTION);
        };

        if actions.is_empty() {
            return None;
        }

        if self.random.next_unit() < EXPLOIT_PROBABILITY {
            let mut best: Option<(Action, f64)> = None;
            for (action, value) in actions {
                match best {
                    Some((_, best_value)) if *value <= best_value => {}
                    _ => best = Some((*action, *value)),
                }
            }

            trace!(%state, ?best, "exploiting");
            best.map(|(action, _)| action)
        } else {
            let index = self.random.next_index(actions.len());
            let action = actions.keys().nth(index).copied();

            trace!(%state, ?action, "exploring");
            action
        }
    }

    fn max_q_value(&self, state: State) -> f64 {
        self.table
            .get(&state)
            .and_then(|actions| actions.values().copied().reduce(f64::max))
            .unwrap_or(0.0)
    }

    /// Apply the Q-learning update for one transition
    pub fn update_q_table(&mut self, state: State, action: Action, reward: f64, next_state: State) {
        let max_next = self.max_q_value(next_state);

        let entry = self.table.entry(state).or_insert_with(Self::fresh_entry);
        let old = entry.get(&action).copied().unwrap_or(0.0);
        let new = old + ALPHA * (reward + GAMMA * max_next - old);
        entry.insert(action, new);

        trace!(%state, %action, reward, old, new, "updated q-value");
    }

    /// Copy of the table for logging and inspection
    pub fn snapshot(&self) -> QTableSnapshot {
        self.table
            .iter()
            .map(|(state, actions)| {
                let actions = actions
                    .iter()
                    .map(|(action, value)| (action.name().to_string(), *value))
                    .collect();
                (state.label().to_string(), actions)
            })
            .collect()
    }
}

impl fmt::Debug for QLearning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QLearning")
            .field("table", &self.table)
            .finish()
    }
}
