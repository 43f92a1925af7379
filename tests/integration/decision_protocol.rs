//! Decision actor behavior against hand-driven monitor and fallback probes

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use fault_agents::actors::channel::Directory;
use fault_agents::actors::decision::DecisionHandle;
use fault_agents::actors::fallback::FallbackHandle;
use fault_agents::actors::messages::{Performative, ResponseSample, fault_notice};
use fault_agents::actors::reporter::ReporterHandle;
use fault_agents::learning::{Action, QLearning, State};
use fault_agents::random::RandomSource;
use fault_agents::sink::{MemorySink, ResponseSink};
use pretty_assertions::assert_eq;

use crate::helpers::{DIRECT, ESCALATE, Probe, coin, exploiting_engine, test_names};

fn spawn_decision(
    directory: &Directory,
    engine: QLearning,
    coin: Box<dyn RandomSource>,
    reporter: Option<ReporterHandle>,
) -> DecisionHandle {
    DecisionHandle::spawn(directory, test_names(), engine, coin, reporter).unwrap()
}

#[tokio::test]
async fn test_exploited_action_updates_q_value() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let mut fallback = Probe::register(&directory, &names.fallback);

    let mut engine = exploiting_engine();
    engine.set_q_value(State::Range51To60, Action::Action1, 2.0);
    engine.set_q_value(State::Range51To60, Action::Action2, 1.0);

    let decision = spawn_decision(&directory, engine, coin(DIRECT), None);

    monitor.inform(&names.decision, &fault_notice(55));

    let reply = monitor.expect_message().await;
    assert_eq!(reply.content(), "Action taken: Action1");
    assert_eq!(reply.sender(), &names.decision);
    fallback.expect_silence(50).await;

    let stats = decision.get_stats().await.unwrap();
    let q = stats.q_table["51-60"]["Action1"];
    assert!((q - 2.48).abs() < 1e-9, "unexpected q-value {q}");
    assert_eq!(stats.q_table["51-60"]["Action2"], 1.0);
    assert_eq!(stats.direct_actions, 1);
    assert_eq!(stats.escalations, 0);
    assert!(stats.samples.is_empty());
}

#[tokio::test]
async fn test_unknown_state_uses_default_action() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let _fallback = Probe::register(&directory, &names.fallback);

    let decision = spawn_decision(&directory, exploiting_engine(), coin(DIRECT), None);

    monitor.inform(&names.decision, &fault_notice(999));

    let reply = monitor.expect_message().await;
    assert_eq!(reply.content(), "Action taken: Action1");

    let stats = decision.get_stats().await.unwrap();
    let q = stats.q_table["unknown"]["Action1"];
    assert!((q - 0.5).abs() < 1e-9, "unexpected q-value {q}");
    assert_eq!(stats.q_table["unknown"]["Action2"], 0.0);
}

#[tokio::test]
async fn test_escalation_forwards_solution() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let mut fallback = Probe::register(&directory, &names.fallback);

    let decision = spawn_decision(&directory, exploiting_engine(), coin(ESCALATE), None);

    monitor.inform(&names.decision, &fault_notice(75));

    let request = fallback.expect_message().await;
    assert_eq!(request.performative(), Performative::Request);
    assert_eq!(request.content(), "Need help with state: 61-70");
    assert_eq!(request.sender(), &names.decision);

    fallback.reply(&request, "restart the pump");

    let reply = monitor.expect_message().await;
    assert_eq!(reply.content(), "Action taken based on help: restart the pump");

    let stats = decision.get_stats().await.unwrap();
    assert_eq!(stats.escalations, 1);
    assert_eq!(stats.direct_actions, 0);
    assert_eq!(stats.samples.len(), 1);
    assert_eq!(stats.samples[0].state, 2);

    // The escalation path leaves the table untouched
    assert_eq!(stats.q_table["61-70"]["Action1"], 0.0);
    assert_eq!(stats.q_table["61-70"]["Action2"], 0.0);
}

#[tokio::test]
async fn test_unrelated_message_not_consumed_while_waiting_for_fallback() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let mut fallback = Probe::register(&directory, &names.fallback);

    let _decision = spawn_decision(&directory, exploiting_engine(), coin(ESCALATE), None);

    monitor.inform(&names.decision, &fault_notice(75));
    let first = fallback.expect_message().await;

    // A second notice arrives while the decision actor is waiting
    monitor.inform(&names.decision, &fault_notice(56));
    monitor.expect_silence(100).await;
    fallback.expect_silence(50).await;

    fallback.reply(&first, "first solution");
    assert_eq!(
        monitor.expect_message().await.content(),
        "Action taken based on help: first solution"
    );

    // The deferred notice is processed next
    let second = fallback.expect_message().await;
    assert_eq!(second.content(), "Need help with state: 51-60");

    fallback.reply(&second, "second solution");
    assert_eq!(
        monitor.expect_message().await.content(),
        "Action taken based on help: second solution"
    );
}

#[tokio::test]
async fn test_missing_fallback_reply_stalls_decision() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let mut fallback = Probe::register(&directory, &names.fallback);

    let decision = spawn_decision(&directory, exploiting_engine(), coin(ESCALATE), None);

    monitor.inform(&names.decision, &fault_notice(60));
    let _request = fallback.expect_message().await;

    monitor.expect_silence(200).await;

    // The actor is suspended in its receive and does not serve commands
    let stats = tokio::time::timeout(Duration::from_millis(100), decision.get_stats()).await;
    assert!(stats.is_err(), "decision actor should still be waiting");
}

#[tokio::test]
async fn test_every_tenth_notice_emits_all_samples() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let fallback = FallbackHandle::spawn(&directory, names.fallback.clone(), Duration::ZERO).unwrap();

    let sink = MemorySink::new();
    let reporter = ReporterHandle::spawn(Arc::new(sink.clone()));
    let decision = spawn_decision(
        &directory,
        exploiting_engine(),
        coin(ESCALATE),
        Some(reporter.clone()),
    );

    for i in 0..20 {
        monitor.inform(&names.decision, &fault_notice(51 + i));
    }

    for _ in 0..20 {
        let reply = monitor.expect_message().await;
        assert!(reply.content().starts_with("Action taken based on help: "));
    }

    let stats = decision.get_stats().await.unwrap();
    assert_eq!(stats.faults_processed, 20);
    assert_eq!(stats.emissions, 2);
    assert_eq!(stats.samples.len(), 20);

    reporter.flush().await.unwrap();
    let emissions = sink.emissions();
    assert_eq!(emissions.len(), 2);
    assert_eq!(emissions[0].len(), 10);
    assert_eq!(emissions[1].len(), 20);
    assert_eq!(emissions[0], emissions[1][..10].to_vec());

    // Readings 51..=60 bucket to 1, 61..=70 to 2
    let states: Vec<i32> = emissions[1].iter().map(|s| s.state).collect();
    assert_eq!(states[..10].to_vec(), vec![1; 10]);
    assert_eq!(states[10..].to_vec(), vec![2; 10]);

    assert_eq!(fallback.get_stats().await.unwrap().requests_served, 20);
}

#[tokio::test]
async fn test_direct_actions_emit_empty_series() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let _fallback = Probe::register(&directory, &names.fallback);

    let sink = MemorySink::new();
    let reporter = ReporterHandle::spawn(Arc::new(sink.clone()));
    let decision = spawn_decision(
        &directory,
        exploiting_engine(),
        coin(DIRECT),
        Some(reporter.clone()),
    );

    for _ in 0..10 {
        monitor.inform(&names.decision, &fault_notice(58));
    }
    for _ in 0..10 {
        monitor.expect_message().await;
    }

    let stats = decision.get_stats().await.unwrap();
    assert_eq!(stats.emissions, 1);
    assert_eq!(stats.direct_actions, 10);

    reporter.flush().await.unwrap();
    assert_eq!(sink.emissions(), vec![Vec::<ResponseSample>::new()]);
}

struct FailingSink;

#[async_trait]
impl ResponseSink for FailingSink {
    async fn emit(&self, _samples: &[ResponseSample]) -> Result<()> {
        bail!("sink unavailable")
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_decision() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let _fallback = Probe::register(&directory, &names.fallback);

    let reporter = ReporterHandle::spawn(Arc::new(FailingSink));
    let decision = spawn_decision(
        &directory,
        exploiting_engine(),
        coin(DIRECT),
        Some(reporter.clone()),
    );

    for _ in 0..11 {
        monitor.inform(&names.decision, &fault_notice(65));
    }
    for _ in 0..11 {
        assert_eq!(
            monitor.expect_message().await.content(),
            "Action taken: Action1"
        );
    }

    let stats = decision.get_stats().await.unwrap();
    assert_eq!(stats.faults_processed, 11);

    reporter.flush().await.unwrap();
    let reporter_stats = reporter.get_stats().await.unwrap();
    assert_eq!(reporter_stats.emitted, 0);
    assert_eq!(reporter_stats.failed, 1);
}

#[tokio::test]
async fn test_non_fault_message_is_ignored() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);
    let mut fallback = Probe::register(&directory, &names.fallback);

    let decision = spawn_decision(&directory, exploiting_engine(), coin(ESCALATE), None);

    monitor.inform(&names.decision, "hello");
    monitor.expect_silence(100).await;
    fallback.expect_silence(50).await;

    let stats = decision.get_stats().await.unwrap();
    assert_eq!(stats.faults_processed, 0);
}
