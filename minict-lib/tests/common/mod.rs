//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use minict_lib::error::MiniCtError;
#[allow(unused_imports)]
pub use minict_lib::{Baud, DriverConfig, Mode, MiniCt, OutputFormat};

use minict_lib::Connector;
use minict_lib::state::DriverState;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// How long a test waits for something it expects to happen
#[allow(dead_code)]
pub const STEP: Duration = Duration::from_secs(2);

/// Connector handing the device end of every new link to the test.
pub struct DuplexConnector {
    links: mpsc::UnboundedSender<(Baud, DuplexStream)>,
}

impl Connector for DuplexConnector {
    type Stream = DuplexStream;

    fn connect(&self, baud: Baud) -> Result<DuplexStream, MiniCtError> {
        let (driver_end, device_end) = tokio::io::duplex(4096);
        self.links
            .send((baud, device_end))
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "test dropped the link receiver"))?;
        Ok(driver_end)
    }
}

/// Device end of a link, driven by hand from a test.
pub struct Instrument {
    pub baud: Baud,
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

#[allow(dead_code)]
impl Instrument {
    pub fn new(baud: Baud, stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            baud,
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Next line from the driver, terminator included. `None` once the driver hangs up.
    pub async fn next_raw_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    /// Next line with the terminator stripped; panics if none arrives in time.
    pub async fn expect_line(&mut self) -> String {
        let line = tokio::time::timeout(STEP, self.next_raw_line())
            .await
            .expect("driver did not write a line in time")
            .expect("driver closed the link");
        line.trim_end_matches("\r\n").to_string()
    }

    /// Panics if the driver writes anything within `window`.
    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(line)) = tokio::time::timeout(window, self.next_raw_line()).await {
            panic!("driver wrote unexpected line {line:?}");
        }
    }

    /// Write CRLF-terminated lines in a single write.
    ///
    /// A driver that already hung up is not an error here.
    pub async fn reply(&mut self, lines: &[&str]) {
        let mut out = String::new();
        for line in lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        self.send_raw(out.as_bytes()).await;
    }

    /// Write bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let _ = self.writer.write_all(bytes).await;
        let _ = self.writer.flush().await;
    }
}

/// Route driver logs to the test output; `RUST_LOG=debug` shows wire traffic.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Driver with short timeouts, plus the channel its links come out of.
#[allow(dead_code)]
pub fn test_driver() -> (MiniCt<DuplexConnector>, mpsc::UnboundedReceiver<(Baud, DuplexStream)>) {
    driver_with_config(
        DriverConfig::new("sim")
            .with_read_timeout(Duration::from_millis(50))
            .with_ack_timeout(Duration::from_millis(300))
            .with_baud_settle(Duration::from_millis(10)),
    )
}

#[allow(dead_code)]
pub fn driver_with_config(
    config: DriverConfig,
) -> (MiniCt<DuplexConnector>, mpsc::UnboundedReceiver<(Baud, DuplexStream)>) {
    init_tracing();
    let (links, rx) = mpsc::unbounded_channel();
    (MiniCt::with_connector(config, DuplexConnector { links }), rx)
}

/// Started driver and the instrument on the other end of its link.
#[allow(dead_code)]
pub async fn started() -> (MiniCt<DuplexConnector>, Instrument, mpsc::UnboundedReceiver<(Baud, DuplexStream)>) {
    start_driver(test_driver()).await
}

#[allow(dead_code)]
pub async fn start_driver(
    (mut driver, mut links): (MiniCt<DuplexConnector>, mpsc::UnboundedReceiver<(Baud, DuplexStream)>),
) -> (MiniCt<DuplexConnector>, Instrument, mpsc::UnboundedReceiver<(Baud, DuplexStream)>) {
    driver.start().await.expect("start driver");
    let (baud, stream) = links.recv().await.expect("driver opened a link");
    (driver, Instrument::new(baud, stream), links)
}

/// Wait until the driver state satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_state(driver: &MiniCt<DuplexConnector>, predicate: impl FnMut(&DriverState) -> bool) {
    let mut rx = driver.subscribe();
    tokio::time::timeout(STEP, rx.wait_for(predicate))
        .await
        .expect("state did not change in time")
        .expect("state channel closed");
}

/// Scripted miniCT answering every command the way the real probe does.
///
/// Returns every line it received once the driver hangs up.
#[allow(dead_code)]
pub fn spawn_emulator(mut instrument: Instrument) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut delimiter = "\t".to_string();
        let mut format = "3".to_string();
        let mut streaming = false;

        while let Some(raw) = instrument.next_raw_line().await {
            let line = raw.trim_end_matches("\r\n").to_string();
            seen.push(line.clone());

            if line == "#" {
                if streaming {
                    streaming = false;
                    instrument.reply(&[">"]).await;
                }
                continue;
            }
            if line == "S" {
                instrument.reply(&[&sample(&format, &delimiter)]).await;
                continue;
            }
            if line.starts_with('M') {
                streaming = true;
                instrument.reply(&[&sample(&format, &delimiter)]).await;
                continue;
            }

            let (code, arg) = match line.split_once(';') {
                Some((code, arg)) => (code.to_string(), arg.to_string()),
                None => (line.clone(), String::new()),
            };
            let mut out = vec![code.clone()];
            match code.as_str() {
                "#002" => out.push("2".to_string()),
                "#004" => {
                    out.push("Model: miniCT".to_string());
                    out.push("Serial No: 12345".to_string());
                }
                "#006" => out.push("OFF".to_string()),
                "#015" => out.push("12.5\t1.25\t1500.1".to_string()),
                "#026" => delimiter = arg,
                "#027" => out.push(format!("\"{delimiter}\"")),
                "#028" => {
                    streaming = true;
                    out.push(sample(&format, &delimiter));
                }
                "#029" => out.push("M1".to_string()),
                "#032" => out.push("1.04".to_string()),
                "#034" => out.push("12345".to_string()),
                "#040" => out.push("M1".to_string()),
                "#082" => {
                    delimiter = if arg == "3" { "\t" } else { "," }.to_string();
                    format = arg;
                }
                "#089" => out.push(format.clone()),
                "#103" => out.push("OFF".to_string()),
                _ => {}
            }
            let out: Vec<&str> = out.iter().map(String::as_str).collect();
            instrument.reply(&out).await;
        }
        seen
    })
}

fn sample(format: &str, delimiter: &str) -> String {
    let fields: &[&str] = match format {
        "CSV" => &["12.5", "0", "0", "1.25", "0", "0"],
        "RES" => &["0", "0", "12.5", "1.25", "1500.1"],
        _ => &["12.5", "1.25", "1500.1"],
    };
    fields.join(delimiter)
}
