//! iqtap sink host entry point.
//!
//! ```text
//! iqtap-sink                          Stream stdin to TCP per config
//! iqtap-sink --input <path>           Read samples from a file
//! iqtap-sink --tap < in.cf32 > out    Passthrough with frame logging
//! iqtap-sink --config <path>          Load a custom config TOML
//! iqtap-sink --gen-config             Write default config to stdout
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use iqtap_sink::config::SinkHostConfig;
use iqtap_sink::service::SinkService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "iqtap-sink", about = "Frame-gated complex32 TCP sink")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "iqtap-sink.toml")]
    config: PathBuf,

    /// Sample file to read instead of stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pass samples through to stdout instead of streaming them.
    #[arg(long)]
    tap: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SinkHostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let (config, source) = SinkHostConfig::load(&cli.config);

    // Logs go to stderr; stdout may carry samples.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    source.log(&cli.config);

    info!("iqtap-sink v{}", env!("CARGO_PKG_VERSION"));
    info!("role: {}", config.network.role);
    info!("endpoint: {}:{}", config.network.host, config.network.port);
    info!("batch: {} samples", config.batch_samples());

    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let service = SinkService::new(config);
    watch_ctrl_c(service.stop_handle());

    if cli.tap {
        let stdout = BufWriter::new(io::stdout().lock());
        service.run_tap(input, stdout)?;
    } else {
        service.run_sink(input)?;
    }

    Ok(())
}

/// Clear `running` on Ctrl-C. The host loop polls it between batches.
fn watch_ctrl_c(running: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("iqtap-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("signal handler unavailable: {e}");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                info!("Ctrl-C received; shutting down");
                running.store(false, Ordering::SeqCst);
            }
        });
    if let Err(e) = spawned {
        warn!("failed to spawn signal thread: {e}");
    }
}
