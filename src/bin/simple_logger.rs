use anyhow::{Context, Result};
use clap::Parser;
use minict_lib::{Baud, DriverConfig, MiniCt, MiniCtError};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// A simple logger that streams conductivity/temperature readings from a miniCT.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the probe is attached to (e.g. /dev/ttyUSB0, COM4).
    #[arg(short, long)]
    port: String,
    /// Link speed in baud.
    #[arg(short, long, default_value_t = 19200)]
    baud: u32,
    /// Sampling rate in Hz (1, 2, 4 or 8).
    #[arg(short, long, default_value_t = 1)]
    rate: u32,
    /// Output format to switch the probe to (3, SB, CSV, RES).
    #[arg(short, long)]
    format: Option<String>,
    /// Run continuously until Ctrl+C is pressed.
    #[arg(short, long)]
    continuous: bool,
    /// Number of samples to log if not running continuously.
    #[arg(short, long, default_value_t = 10)]
    samples: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_target(false).init();

    let baud = Baud::from_bps(cli.baud).context("Unsupported baud rate")?;
    let config = DriverConfig::new(&cli.port).with_baud(baud);
    let mut device = MiniCt::new(config);
    device
        .start()
        .await
        .with_context(|| format!("Failed to open {}", cli.port))?;

    let outcome = tokio::select! {
        res = run(&device, &cli) => res,
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
            Ok(())
        }
    };

    if let Err(e) = device.interrupt().await {
        warn!("Probe did not confirm interrupt: {}", e);
    }
    device.stop().await;

    if let Err(e) = outcome {
        error!("Application failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(device: &MiniCt, cli: &Cli) -> Result<()> {
    if let Some(format) = &cli.format {
        device.set_output_format(format).await.context("Failed to set output format")?;
    }

    device.continuous(cli.rate).await.context("Failed to start streaming")?;
    info!(rate = cli.rate, "--- Streaming ---");

    // A missed sample at the slowest rate still arrives within this
    let wait = Duration::from_secs(3);
    let iterations = if cli.continuous { u32::MAX } else { cli.samples };

    for i in 0..iterations {
        match device.next_measurement(wait).await {
            Ok(values) => info!("[Sample {}] {:?}", i + 1, values),
            Err(MiniCtError::Timeout(_)) => warn!("No reading within {:?}", wait),
            Err(e) => return Err(e).context("Receiver failed"),
        }
    }

    info!("Finished logging.");
    Ok(())
}
