use chrono::Local;
use clap::Parser;
use minict_lib::{Baud, DriverConfig, MiniCt, MiniCtError};
use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Continuous streaming from a miniCT to stdout or a CSV file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 or COM4
    #[arg(short, long)]
    port: String,

    /// Link speed: 2400, 4800, 9600, 19200 or 38400
    #[arg(short, long, default_value = "19200")]
    baud: u32,

    /// Sample rate in Hz
    #[arg(short, long, default_value = "1", value_parser = ["1", "2", "4", "8"])]
    rate: String,

    /// Output format to select on the probe: 3, SB, CSV or RES
    #[arg(short, long)]
    format: Option<String>,

    /// Duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Write rows to this CSV file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .init();

    let rate: u32 = args.rate.parse()?;
    let config = DriverConfig::new(&args.port).with_baud(Baud::from_bps(args.baud)?);
    let mut device = MiniCt::new(config);
    device.start().await?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(sink);

    let result = stream(&device, &args, rate, &mut writer).await;

    if let Err(e) = device.interrupt().await {
        eprintln!("Warning: probe did not confirm interrupt: {}", e);
    }
    device.stop().await;
    writer.flush()?;

    let rows = result?;
    eprintln!("Wrote {} rows", rows);
    Ok(())
}

async fn stream(
    device: &MiniCt,
    args: &Args,
    rate: u32,
    writer: &mut csv::Writer<Box<dyn Write>>,
) -> Result<u64, Box<dyn Error>> {
    if let Some(format) = &args.format {
        device.set_output_format(format).await?;
    }
    device.continuous(rate).await?;
    eprintln!(
        "Streaming at {} Hz ({} format) for {} s...",
        rate,
        device.output_format(),
        args.duration
    );

    writer.write_record(["timestamp", "sample", "values..."])?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut rows: u64 = 0;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let values = match device.next_measurement(remaining).await {
            Ok(values) => values,
            Err(MiniCtError::Timeout(_)) => break,
            Err(e) => return Err(e.into()),
        };

        rows += 1;
        let mut record = vec![Local::now().to_rfc3339(), rows.to_string()];
        record.extend(values.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }

    Ok(rows)
}
