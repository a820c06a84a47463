//! beacon - command line tools for the mobile telemetry pipeline
//!
//! This tool provides commands for:
//! - Checking pipeline configuration and readiness
//! - Probing the collection server
//! - Sending a one-off custom event
//! - Replaying a recorded touch trace through the gesture classifier
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/beacon/config.toml (~/.config/beacon/config.toml)
//! - Logs: $XDG_STATE_HOME/beacon/beacon.log (~/.local/state/beacon/beacon.log)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use beacon_core::gesture::GestureClassifier;
use beacon_core::{Config, CustomEvent, HttpTransport, Pipeline, Record, SessionContext};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Inspect and exercise the beacon telemetry pipeline")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to the state directory
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show pipeline configuration and readiness
    Status,

    /// Check that the collection server answers its health endpoint
    Ping,

    /// Send one custom event and flush
    Send {
        /// Event name
        name: String,

        /// Event properties as a JSON object
        #[arg(short, long)]
        props: Option<String>,
    },

    /// Replay a JSONL touch trace and print the interaction records it yields
    Replay {
        /// Trace file, one sample per line
        file: PathBuf,

        /// Seed for touch sampling (default: random)
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Ping => "ping",
            Command::Send { .. } => "send",
            Command::Replay { .. } => "replay",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let _log_guard = if args.verbose {
        Some(beacon_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    tracing::info!(command = args.command.name(), "beacon command started");

    match args.command {
        Command::Status => cmd_status(&config, args.config.as_deref()),
        Command::Ping => cmd_ping(&config).await,
        Command::Send { name, props } => cmd_send(&config, name, props.as_deref()).await,
        Command::Replay { file, seed } => cmd_replay(&config, &file, seed),
    }
}

fn cmd_status(config: &Config, path: Option<&Path>) -> Result<()> {
    println!("Beacon Pipeline Configuration");
    println!("=============================");
    println!();

    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    println!("Config File:     {}", config_path.display());
    println!(
        "Log File:        {}",
        beacon_core::logging::log_file_path(&config.logging).display()
    );

    let pipeline = &config.pipeline;
    println!("Enabled:         {}", pipeline.enabled);

    if !pipeline.enabled {
        println!();
        println!("Pipeline is disabled. Enable it in config.toml:");
        println!();
        println!("  [pipeline]");
        println!("  enabled = true");
        println!("  server_url = \"https://collect.example.com\"");
        println!("  api_key = \"bk_live_xxxxxxxxxxxx\"");
        println!("  application_id = \"com.example.app\"");
        return Ok(());
    }

    println!(
        "Server URL:      {}",
        pipeline.server_url.as_deref().unwrap_or("<not set>")
    );
    println!(
        "Application ID:  {}",
        pipeline.application_id.as_deref().unwrap_or("<not set>")
    );
    println!(
        "API Key:         {}",
        if pipeline.api_key.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("Flush Interval:  {}ms", pipeline.flush_interval_ms);
    println!("Max Queue Size:  {}", pipeline.max_queue_size);
    println!("Max Retries:     {}", pipeline.max_retries);
    println!("Timeout:         {}s", pipeline.timeout_secs);

    let gestures = &config.gestures;
    println!();
    println!("Touches:         {}", on_off(gestures.track_touches));
    println!("Gestures:        {}", on_off(gestures.track_gestures));
    println!("Scrolls:         {}", on_off(gestures.track_scrolls));
    println!("Touch Sampling:  {}", gestures.touch_sampling);
    println!("Long Press:      {}ms", gestures.long_press_ms);

    println!();
    if !pipeline.is_ready() {
        println!("Status: Not ready (missing required configuration)");
    } else if let Err(e) = config.validate() {
        println!("Status: Invalid ({})", e);
    } else {
        println!("Status: Ready to send");
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

async fn cmd_ping(config: &Config) -> Result<()> {
    if !config.pipeline.is_ready() {
        println!("Pipeline is not configured. Run 'status' for details.");
        return Ok(());
    }

    let transport = HttpTransport::new(&config.pipeline).context("failed to create transport")?;
    let reachable = transport.health_check().await?;
    tracing::info!(server = ?config.pipeline.server_url, reachable, "Health check finished");

    if reachable {
        println!("Server is reachable");
        Ok(())
    } else {
        bail!("server did not answer its health check");
    }
}

async fn cmd_send(config: &Config, name: String, props: Option<&str>) -> Result<()> {
    if !config.pipeline.is_ready() {
        println!("Pipeline is not configured. Run 'status' for details.");
        return Ok(());
    }

    let properties = match props {
        Some(raw) => serde_json::from_str(raw).context("--props must be valid JSON")?,
        None => serde_json::Value::Null,
    };

    let transport = HttpTransport::new(&config.pipeline).context("failed to create transport")?;
    let pipeline = Pipeline::start(&config.pipeline, Arc::new(transport), None)
        .context("failed to start pipeline")?;

    let session = SessionContext::new();
    pipeline
        .handle()
        .submit(session.record(CustomEvent { name, properties }));

    let stats = pipeline.shutdown().await;
    tracing::info!(
        sent = stats.records_sent,
        requeued = stats.records_requeued,
        api_calls = stats.api_calls,
        api_failures = stats.api_failures,
        "One-off send finished"
    );

    if stats.records_sent > 0 {
        println!("Sent {} record(s)", stats.records_sent);
    } else {
        println!("No records sent");
    }

    println!();
    println!("Stats:");
    println!("  API Calls:  {}", stats.api_calls);
    println!("  Sent:       {}", stats.records_sent);
    println!("  Requeued:   {}", stats.records_requeued);
    println!("  Failures:   {}", stats.api_failures);

    Ok(())
}

/// One line of a touch trace; `t` is milliseconds since the trace began
#[derive(Debug, Deserialize)]
struct TraceSample {
    t: u64,
    #[serde(flatten)]
    input: TraceInput,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TraceInput {
    Down {
        x: f64,
        y: f64,
        #[serde(default)]
        force: Option<f64>,
    },
    Up {
        x: f64,
        y: f64,
    },
    Pinch {
        scale: f64,
        x: f64,
        y: f64,
    },
    Scroll {
        y: f64,
        content: f64,
        viewport: f64,
    },
    Screen {
        name: String,
    },
}

fn cmd_replay(config: &Config, file: &Path, seed: Option<u64>) -> Result<()> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );

    let samples = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|(n, line)| {
            let line = line?;
            serde_json::from_str::<TraceSample>(&line)
                .with_context(|| format!("{}:{}: invalid trace sample", file.display(), n + 1))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(file = %file.display(), samples = samples.len(), "Replaying touch trace");

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut classifier =
        GestureClassifier::with_rng(config.gestures.clone(), SessionContext::new(), rng);

    // Trace times are offsets from an arbitrary origin
    let origin = Instant::now();
    let mut records = Vec::new();

    for sample in samples {
        let at = origin + Duration::from_millis(sample.t);

        // Timer that would have fired between samples
        classifier.fire_long_press(at);

        match sample.input {
            TraceInput::Down { x, y, force } => classifier.touch_start(x, y, force, at),
            TraceInput::Up { x, y } => {
                classifier.touch_end(x, y, at);
            }
            TraceInput::Pinch { scale, x, y } => {
                classifier.pinch(scale, x, y);
            }
            TraceInput::Scroll {
                y,
                content,
                viewport,
            } => {
                classifier.scroll(y, content, viewport);
            }
            TraceInput::Screen { name } => classifier.set_screen(name),
        }

        records.extend(classifier.take_buffer());
    }
    classifier.cancel();
    tracing::info!(records = records.len(), "Replay finished");

    print_records(&records)
}

fn print_records(records: &[Record]) -> Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    eprintln!("{} interaction record(s)", records.len());
    Ok(())
}
