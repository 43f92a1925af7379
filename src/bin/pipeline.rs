use clap::Parser;
use fault_agents::{
    config::{Config, read_config_file},
    pipeline::Pipeline,
    util::{get_config_path, get_seed},
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Stop after this many readings have been acknowledged
    #[arg(long)]
    readings: Option<u64>,

    /// Seed for every random source without an explicit seed
    #[arg(long)]
    seed: Option<u64>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("fault_agents", LevelFilter::DEBUG),
        ("fault_pipeline", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match args.file.clone().or_else(get_config_path) {
        Some(path) => read_config_file(&path)?,
        None => Config::default(),
    };

    if let Some(readings) = args.readings {
        config.sensor.max_readings = Some(readings);
    }

    if let Some(seed) = args.seed.or_else(get_seed) {
        config = config.with_seed(seed);
    }

    let pipeline = Pipeline::spawn(&config)?;

    tokio::select! {
        finished = pipeline.sensor.wait_finished() => {
            if !finished {
                warn!("sensor stopped before finishing");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    if let Some(stats) = pipeline.decision.get_stats().await {
        info!(
            "processed {} faults ({} escalated, {} learned), q-table: {:?}",
            stats.faults_processed, stats.escalations, stats.direct_actions, stats.q_table
        );
    }

    pipeline.shutdown().await;

    Ok(())
}
