use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use minict_lib::command::{Command, Rate};
use minict_lib::packet::Packet;
use minict_lib::state::Mode;
use minict_lib::{Baud, Connector, SerialConnector};

/// Raw line capture from a miniCT serial link, with a timestamp and class per line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the probe is attached to.
    #[arg(short, long)]
    port: String,
    /// Link speed in baud.
    #[arg(short, long, default_value_t = 19200)]
    baud: u32,
    /// Put the probe into continuous mode at this rate (Hz) before capturing.
    #[arg(short, long)]
    rate: Option<u32>,
    /// Disable XON/XOFF flow control.
    #[arg(long)]
    no_flow_control: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run_capture(&cli).await {
        error!("Capture failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run_capture(cli: &Cli) -> Result<()> {
    let baud = Baud::from_bps(cli.baud).context("Unsupported baud rate")?;
    let connector = SerialConnector::new(&cli.port, !cli.no_flow_control);
    let stream = connector
        .connect(baud)
        .with_context(|| format!("Failed to open {}", cli.port))?;
    let (reader, mut writer) = tokio::io::split(stream);

    let mut mode = Mode::Interrupted;
    if let Some(hz) = cli.rate {
        let command = Command::Continuous(Rate::from_hz(hz)?);
        writer.write_all(command.to_line().as_bytes()).await?;
        writer.flush().await?;
        mode = Mode::Continuous;
        info!(rate = hz, "Requested continuous mode");
    }

    info!(port = %cli.port, %baud, "Capturing, Ctrl+C to stop");
    println!("--------------------------------------------------------------------------------");

    let mut lines = BufReader::new(reader).lines();
    let mut count: u64 = 0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim_end();
                    let class = match Packet::classify(line, mode) {
                        Packet::Acknowledgement(code) => format!("ACK #{code:03}"),
                        Packet::InterruptNotice(_) => {
                            mode = Mode::Interrupted;
                            "INTERRUPT".to_string()
                        }
                        Packet::Measurement(_) => "DATA".to_string(),
                        Packet::Unclassified(_) => "TEXT".to_string(),
                    };
                    count += 1;
                    println!("{} {:<9} {}", Local::now().format("%H:%M:%S%.3f"), class, line);
                }
                Ok(None) => {
                    warn!("Port closed");
                    break;
                }
                Err(e) => debug!("Read failed: {}", e),
            },
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, stopping capture.");
                break;
            }
        }
    }

    if mode == Mode::Continuous {
        writer.write_all(Command::Interrupt.to_line().as_bytes()).await?;
        writer.flush().await?;
    }
    info!(lines = count, "Capture finished");
    Ok(())
}
