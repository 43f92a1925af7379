//! Tests for the sensor loop and the fully wired pipeline

use std::sync::Arc;
use std::time::Duration;

use fault_agents::actors::channel::Directory;
use fault_agents::actors::messages::ACKNOWLEDGED;
use fault_agents::actors::sensor::SensorHandle;
use fault_agents::config::{Config, SensorConfig, SinkConfig, parse_config};
use fault_agents::pipeline::{Pipeline, build_sink};
use fault_agents::random::ScriptedRandom;
use fault_agents::sink::MemorySink;
use pretty_assertions::assert_eq;
use tokio::time::timeout;

use crate::helpers::{Probe, test_names, wait_unregistered};

#[tokio::test]
async fn test_sensor_sends_one_reading_per_ack() {
    let directory = Directory::new();
    let names = test_names();
    let mut monitor = Probe::register(&directory, &names.monitor);

    let config = SensorConfig {
        interval_ms: 1,
        max_readings: Some(3),
        seed: None,
    };
    let sensor = SensorHandle::spawn(
        &directory,
        &names,
        &config,
        Box::new(ScriptedRandom::new([0.42, 0.55, 0.3])),
    )
    .unwrap();

    for expected in ["42", "55", "30"] {
        let reading = monitor.expect_message().await;
        assert_eq!(reading.content(), expected);
        assert_eq!(reading.sender(), &names.sensor);

        // No second reading before the acknowledgment
        monitor.expect_silence(30).await;
        monitor.reply(&reading, ACKNOWLEDGED);
    }

    assert!(
        timeout(Duration::from_secs(2), sensor.wait_finished())
            .await
            .unwrap()
    );
    monitor.expect_silence(50).await;

    let stats = sensor.get_stats().await.unwrap();
    assert_eq!(stats.readings_sent, 3);
    assert_eq!(stats.acks_received, 3);
    assert!(stats.finished);
}

fn smoke_config() -> Config {
    parse_config(
        r#"{
            "sensor": { "interval_ms": 1, "max_readings": 30 },
            "fallback": { "delay_ms": 1 },
            "sink": { "kind": "none" }
        }"#,
    )
    .unwrap()
    .with_seed(7)
}

#[tokio::test]
async fn test_pipeline_runs_to_completion() {
    let config = smoke_config();
    let sink = MemorySink::new();

    let pipeline = Pipeline::spawn_with_sink(&config, Some(Arc::new(sink.clone()))).unwrap();

    assert!(
        timeout(Duration::from_secs(10), pipeline.sensor.wait_finished())
            .await
            .unwrap()
    );

    let sensor = pipeline.sensor.get_stats().await.unwrap();
    assert_eq!(sensor.readings_sent, 30);
    assert_eq!(sensor.acks_received, 30);

    let monitor = pipeline.monitor.get_stats().await.unwrap();
    assert_eq!(monitor.direct_acks + monitor.escalations, 30);

    let decision = pipeline.decision.get_stats().await.unwrap();
    assert_eq!(decision.faults_processed, monitor.escalations);
    assert_eq!(
        decision.escalations + decision.direct_actions,
        decision.faults_processed
    );
    assert_eq!(decision.samples.len() as u64, decision.escalations);
    assert_eq!(decision.emissions, decision.faults_processed / 10);

    let fallback = pipeline.fallback.get_stats().await.unwrap();
    assert_eq!(fallback.requests_served, decision.escalations);

    pipeline.shutdown().await;
    assert_eq!(sink.emissions().len() as u64, decision.emissions);
}

#[tokio::test]
async fn test_pipeline_with_same_seed_is_reproducible() {
    let mut runs = Vec::new();

    for _ in 0..2 {
        let pipeline = Pipeline::spawn(&smoke_config()).unwrap();
        assert!(
            timeout(Duration::from_secs(10), pipeline.sensor.wait_finished())
                .await
                .unwrap()
        );

        let monitor = pipeline.monitor.get_stats().await.unwrap();
        let decision = pipeline.decision.get_stats().await.unwrap();
        runs.push((
            monitor.direct_acks,
            monitor.escalations,
            decision.escalations,
            decision.q_table,
        ));

        pipeline.shutdown().await;
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_duplicate_actor_names_are_rejected() {
    let mut config = smoke_config();
    config.names.decision = config.names.monitor.clone();

    assert!(Pipeline::spawn(&config).is_err());
}

#[tokio::test]
async fn test_failed_spawn_stops_already_started_actors() {
    let directory = Directory::new();
    let mut config = smoke_config();
    config.names.monitor = config.names.decision.clone();

    let sink = MemorySink::new();
    let result = Pipeline::spawn_in(directory.clone(), &config, Some(Arc::new(sink)));
    assert!(result.is_err());

    assert!(wait_unregistered(&directory, &config.names.fallback).await);
    assert!(wait_unregistered(&directory, &config.names.decision).await);
    assert!(!directory.contains(&config.names.sensor));
}

#[tokio::test]
async fn test_dropped_pipeline_stops_every_actor() {
    let directory = Directory::new();
    let mut config = smoke_config();
    // No traffic, so no actor is parked waiting on another
    config.sensor.max_readings = Some(0);

    let pipeline = Pipeline::spawn_in(directory.clone(), &config, None).unwrap();
    drop(pipeline);

    for name in [
        &config.names.sensor,
        &config.names.monitor,
        &config.names.decision,
        &config.names.fallback,
    ] {
        assert!(wait_unregistered(&directory, name).await, "{name} still running");
    }
}

#[test]
fn test_build_sink_from_config() {
    assert!(build_sink(&SinkConfig::None).is_none());
    assert!(build_sink(&SinkConfig::Log).is_some());
    assert!(
        build_sink(&SinkConfig::JsonLines {
            path: "samples.jsonl".into()
        })
        .is_some()
    );
}
