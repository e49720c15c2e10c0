use crate::command::Baud;
use crate::error::MiniCtError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialPortInfo, SerialStream, StopBits};
use tracing::info;

/// A duplex byte stream the driver can talk over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens a [`Transport`] at a given link speed.
///
/// The driver calls this on start and again after every baud change.
pub trait Connector: Send + Sync + 'static {
    type Stream: Transport;

    fn connect(&self, baud: Baud) -> Result<Self::Stream, MiniCtError>;
}

/// Opens the miniCT's serial port: 8 data bits, no parity, 1 stop bit.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    flow_control: bool,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, flow_control: bool) -> Self {
        Self {
            port: port.into(),
            flow_control,
        }
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn connect(&self, baud: Baud) -> Result<SerialStream, MiniCtError> {
        let flow_control = if self.flow_control {
            FlowControl::Software
        } else {
            FlowControl::None
        };
        let stream = tokio_serial::new(&self.port, baud.as_bps())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(flow_control)
            .open_native_async()?;
        info!(port = %self.port, %baud, "Serial port opened");
        Ok(stream)
    }
}

/// Serial ports present on this machine.
pub fn available_ports() -> Result<Vec<SerialPortInfo>, MiniCtError> {
    Ok(tokio_serial::available_ports()?)
}
