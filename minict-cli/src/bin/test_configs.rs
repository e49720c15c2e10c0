use clap::Parser;
use minict_lib::{Baud, DriverConfig, MiniCt, MiniCtError};
use std::error::Error;
use std::time::{Duration, Instant};

/// Walk a miniCT through every setter and getter and report each step
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 or COM4
    #[arg(short, long)]
    port: String,

    /// Link speed to connect at
    #[arg(short, long, default_value = "38400")]
    baud: u32,

    /// Link speed to switch to midway through
    #[arg(long, default_value = "38400")]
    switch_baud: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("{}", "=".repeat(70));
    println!("miniCT Configuration Test");
    println!("{}", "=".repeat(70));
    println!();

    let config = DriverConfig::new(&args.port)
        .with_baud(Baud::from_bps(args.baud)?)
        .with_read_timeout(Duration::from_millis(500));
    let mut device = MiniCt::new(config);
    device.start().await?;

    let mut failures = 0;

    failures += report("Interrupt", timed(device.interrupt()).await);
    failures += report("Continuous 8 Hz", timed(device.continuous(8)).await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    failures += report("Get header", timed(device.get_header()).await);

    failures += report("Output format CSV", timed(device.set_output_format("CSV")).await);
    failures += report("Startup mode ON", timed(device.set_startup_mode(true)).await);
    failures += report("Mode 8 Hz", timed(device.set_mode(8)).await);
    failures += report("Delimiter ','", timed(device.set_delimiter(",")).await);
    failures += report("485 address 2", timed(device.set_485_address(2)).await);
    failures += report("485 mode OFF", timed(device.set_485_mode(false)).await);
    failures += report("Run mode", timed(device.set_run_mode()).await);
    poll_measurements(&device, Duration::from_millis(200)).await;

    failures += report("Interrupt", timed(device.interrupt()).await);
    failures += report(
        &format!("Baud {}", args.switch_baud),
        timed(device.set_baud(args.switch_baud)).await,
    );

    let start = Instant::now();
    match device.config().await {
        Ok(datagram) => {
            println!("{}", "─".repeat(70));
            println!("Configuration ({:?}):", start.elapsed());
            println!("{}", datagram.to_json()?);
        }
        Err(e) => {
            println!("  ❌ Config FAILED: {}", e);
            failures += 1;
        }
    }

    failures += report("Run mode", timed(device.set_run_mode()).await);
    poll_measurements(&device, Duration::ZERO).await;

    failures += report("Interrupt", timed(device.interrupt()).await);
    device.stop().await;

    println!("{}", "=".repeat(70));
    if failures == 0 {
        println!("✅ Testing complete!");
    } else {
        println!("❌ Testing complete with {} failed step(s)", failures);
    }
    println!("{}", "=".repeat(70));

    Ok(())
}

async fn timed<F>(step: F) -> (Result<(), MiniCtError>, Duration)
where
    F: Future<Output = Result<(), MiniCtError>>,
{
    let start = Instant::now();
    let result = step.await;
    (result, start.elapsed())
}

fn report(name: &str, (result, elapsed): (Result<(), MiniCtError>, Duration)) -> u32 {
    match result {
        Ok(()) => {
            println!("  ✅ {:<24} {:?}", name, elapsed);
            0
        }
        Err(e) => {
            println!("  ❌ {:<24} FAILED: {}", name, e);
            1
        }
    }
}

async fn poll_measurements(device: &MiniCt, interval: Duration) {
    for i in 0..10 {
        match device.get_measurements() {
            Some(values) => println!("  [{}] {:?}", i + 1, values),
            None => println!("  [{}] no new data", i + 1),
        }
        tokio::time::sleep(interval).await;
    }
}
