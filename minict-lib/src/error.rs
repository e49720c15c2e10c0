use std::io;
use thiserror::Error;

/// The primary error type for the `minict-lib` library.
#[derive(Error, Debug)]
pub enum MiniCtError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Driver not started. Call start() first")]
    NotStarted,

    #[error("Driver already started")]
    AlreadyStarted,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Timed out waiting for the device: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Receiver stopped while waiting for the device")]
    ReceiverStopped,
}

pub type Result<T> = std::result::Result<T, MiniCtError>;
