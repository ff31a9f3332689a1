// Module declarations for the application's core components
pub mod aurora;        // Aurora wire format and TCP client
pub mod command;       // Operation table and value decoders
pub mod config;        // Configuration management
pub mod csv_writer;    // CSV file output
pub mod error;         // Error handling and types
pub mod http_post;     // HTTP POST output
pub mod mqtt;          // MQTT output
pub mod options;       // Command line options parsing
pub mod poller;        // Poll cycle and samples
pub mod prelude;       // Common imports and types
pub mod scheduler;     // Phase-locked scheduling
pub mod sink;          // Sample consumers
pub mod utils;         // Utility functions

pub use error::Error;

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::csv_writer::CsvWriter;
use crate::http_post::HttpPost;
use crate::mqtt::MqttPublisher;
use crate::sink::{Console, JsonWriter, Tee};
use std::io::Write;
use std::time::Duration;

fn init_logging(level: &str) {
    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();
}

/// Builds one sink out of everything enabled under `output`.
pub async fn sinks(output: &config::Output) -> Result<Tee> {
    let mut tee = Tee::default();

    if output.console() {
        tee.push(Box::new(Console::default()));
    }
    if let Some(target) = output.csv() {
        tee.push(Box::new(CsvWriter::open(target)?));
    }
    if let Some(target) = output.json() {
        tee.push(Box::new(JsonWriter::open(target)?));
    }
    if let Some(http) = output.http() {
        tee.push(Box::new(HttpPost::new(http)?));
    }
    if let Some(mqtt) = output.mqtt() {
        tee.push(Box::new(MqttPublisher::connect(mqtt).await?));
    }

    info!("{} output(s) enabled", tee.len());

    Ok(tee)
}

/// True when the error chain says the inverter (or bridge) stopped answering.
pub fn is_unreachable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_unreachable)
}

/// Connects, then polls once or forever depending on `once` and the
/// scheduler settings. Returns on the first protocol error or on Ctrl-C.
pub async fn run(config: &Config, once: bool) -> Result<()> {
    let plan = PollPlan::new(config.operations())?;
    let sink = sinks(config.output()).await?;
    let client = aurora::inverter::connect(config.inverter()).await?;

    let mut job = PollJob::new(client, plan, Box::new(sink));

    if once || config.scheduler().once() {
        return job.run().await;
    }

    let scheduler = Scheduler::new(config.scheduler().interval(), config.scheduler().offset())?;
    info!(
        "polling every {}s at offset {}s",
        scheduler.interval(),
        scheduler.offset()
    );

    let result = tokio::select! {
        r = scheduler.run(&mut job) => r,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received, application will exit");
            Ok(())
        }
    };

    info!("{} cycles completed", job.cycles());
    result
}

/// Main application entry point
pub async fn app(options: Options) -> Result<()> {
    let config = Config::new(&options.config_file)?;

    init_logging(config.loglevel());
    info!(
        "aurora-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();

    let work = run(&config, options.once);
    let result = match options.runtime {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), work).await {
            Ok(r) => r,
            Err(_) => {
                info!("runtime limit of {}s reached, application will exit", secs);
                Ok(())
            }
        },
        None => work.await,
    };

    match result {
        // usually the inverter off for the night with the bridge still up
        Err(e) if is_unreachable(&e) => {
            error!("{:#}, application will exit", e);
            if !config.backoff().is_zero() {
                info!("sleeping {:?} before exit", config.backoff());
                tokio::time::sleep(config.backoff()).await;
            }
            Ok(())
        }
        r => r,
    }
}
