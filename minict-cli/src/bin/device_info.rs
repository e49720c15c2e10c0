use clap::Parser;
use minict_lib::{Baud, DriverConfig, MiniCt};
use std::error::Error;
use std::time::Duration;

/// Dump every setting the miniCT reports, as JSON
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 or COM4
    #[arg(short, long)]
    port: String,

    /// Link speed: 2400, 4800, 9600, 19200 or 38400
    #[arg(short, long, default_value = "19200")]
    baud: u32,

    /// Per-command acknowledgement timeout in milliseconds
    #[arg(long, default_value = "2000")]
    ack_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = DriverConfig::new(&args.port)
        .with_baud(Baud::from_bps(args.baud)?)
        .with_ack_timeout(Duration::from_millis(args.ack_timeout_ms));
    let mut device = MiniCt::new(config);
    device.start().await?;
    eprintln!("Connected to miniCT on {}, querying...", args.port);

    let result = device.config().await;
    // Let the reply to the last getter land before the snapshot
    tokio::time::sleep(Duration::from_millis(200)).await;
    let datagram = device.datagram();
    device.stop().await;

    if let Err(e) = result {
        eprintln!("Warning: query incomplete: {}", e);
    }
    println!("{}", datagram.to_json()?);

    Ok(())
}
