use crate::state::DriverState;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Background task that reads device lines into the shared state.
pub struct ReceiverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReceiverHandle {
    pub fn spawn<R>(reader: R, state: Arc<watch::Sender<DriverState>>, read_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receive_lines(reader, state, shutdown_rx, read_timeout));
        Self { shutdown, task }
    }

    /// Signal shutdown and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Receiver task ended abnormally: {}", e);
        }
    }
}

async fn receive_lines<R>(
    reader: R,
    state: Arc<watch::Sender<DriverState>>,
    mut shutdown: watch::Receiver<bool>,
    read_timeout: Duration,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Handle dropped without stop()
                    break;
                }
            }
            read = timeout(read_timeout, lines.next_line()) => match read {
                Err(_) => continue,
                Ok(Ok(Some(line))) => {
                    let line = line.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    debug!(line, "Serial Read");
                    state.send_if_modified(|s| s.handle_line(line));
                }
                Ok(Ok(None)) => {
                    debug!("Serial stream closed, waiting for shutdown");
                    let _ = shutdown.wait_for(|stop| *stop).await;
                    break;
                }
                Ok(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                    // The undecodable line is already consumed
                    debug!("Skipping line that is not UTF-8: {}", e);
                }
                Ok(Err(e)) => {
                    debug!("Serial read failed: {}", e);
                    // A dead port keeps failing immediately
                    tokio::time::sleep(read_timeout).await;
                }
            }
        }
    }

    trace!("Receiver exiting");
}
