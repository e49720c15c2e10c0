use clap::Parser;
use minict_lib::{Baud, DriverConfig, MiniCt};
use std::error::Error;
use std::time::Duration;

/// Take one reading from a miniCT
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 or COM4
    #[arg(short, long)]
    port: String,

    /// Link speed: 2400, 4800, 9600, 19200 or 38400
    #[arg(short, long, default_value = "19200")]
    baud: u32,

    /// Seconds to wait for the reading
    #[arg(short, long, default_value = "3")]
    timeout: u64,

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
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let config = DriverConfig::new(&args.port).with_baud(Baud::from_bps(args.baud)?);
    let mut device = MiniCt::new(config);
    device.start().await?;
    println!("Connected to miniCT on {}", args.port);

    println!("Requesting a single reading...");
    let result = device.read_single(Duration::from_secs(args.timeout)).await;
    device.stop().await;
    let values = result?;

    println!("Reading ({} format):", device.output_format());
    for (index, value) in values.iter().enumerate() {
        println!("  [{}] {}", index, value);
    }

    Ok(())
}
