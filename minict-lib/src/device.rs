use crate::command::{Baud, Command, Rate, Switch};
use crate::config::DriverConfig;
use crate::datagram::Datagram;
use crate::error::{MiniCtError, Result};
use crate::receiver::ReceiverHandle;
use crate::state::{CommandId, DriverState, Mode, Pending};
use crate::transport::{Connector, SerialConnector};
use crate::values::OutputFormat;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;
use tracing::{debug, info};

/// Driver for a Valeport miniCT CTD probe.
///
/// Construct it, call [`MiniCt::start`] to open the link and spawn the
/// receiver, then issue commands. Replies land in the shared [`Datagram`]
/// and measurements in a single-slot buffer.
pub struct MiniCt<C: Connector = SerialConnector> {
    config: DriverConfig,
    connector: C,
    state: Arc<watch::Sender<DriverState>>,
    writer: Mutex<Option<WriteHalf<C::Stream>>>,
    receiver: Option<ReceiverHandle>,
    command_lock: Mutex<()>,
}

impl MiniCt<SerialConnector> {
    /// Driver for the serial port named in `config`. Nothing is opened until `start`.
    pub fn new(config: DriverConfig) -> Self {
        let connector = SerialConnector::new(config.port.clone(), config.flow_control);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> MiniCt<C> {
    pub fn with_connector(config: DriverConfig, connector: C) -> Self {
        let (state, _) = watch::channel(DriverState::default());
        Self {
            config,
            connector,
            state: Arc::new(state),
            writer: Mutex::new(None),
            receiver: None,
            command_lock: Mutex::new(()),
        }
    }

    /// Open the transport and spawn the receiver task.
    pub async fn start(&mut self) -> Result<()> {
        if self.receiver.is_some() {
            return Err(MiniCtError::AlreadyStarted);
        }

        let stream = self.connector.connect(self.config.baud)?;
        let (reader, writer) = tokio::io::split(stream);
        *self.writer.get_mut() = Some(writer);
        self.receiver = Some(ReceiverHandle::spawn(
            reader,
            Arc::clone(&self.state),
            self.config.read_timeout,
        ));

        info!(baud = %self.config.baud, "miniCT driver started");
        Ok(())
    }

    /// Stop the receiver, wait for it to exit, then release the transport.
    pub async fn stop(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        receiver.stop().await;
        self.writer.get_mut().take();
        info!("miniCT driver stopped");
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(MiniCtError::NotStarted)
        }
    }

    async fn write_command(&self, command: &Command) -> Result<()> {
        let line = command.to_line();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(MiniCtError::NotStarted)?;
        debug!(bytes = hex::encode(line.as_bytes()), line = line.trim_end(), "Serial Write");
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Block until `predicate` holds for the driver state, bounded by the ack timeout.
    async fn wait_until(&self, predicate: impl FnMut(&DriverState) -> bool) -> Result<()> {
        self.wait_for_state(self.config.ack_timeout, predicate).await
    }

    async fn wait_for_state(&self, limit: Duration, predicate: impl FnMut(&DriverState) -> bool) -> Result<()> {
        let mut rx = self.state.subscribe();
        timeout(limit, rx.wait_for(predicate))
            .await?
            .map(|_| ())
            .map_err(|_| MiniCtError::ReceiverStopped)
    }

    async fn transact(&self, command: Command) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.command_lock.lock().await;
        self.transact_locked(command).await
    }

    /// One send-and-wait exchange. Caller holds the command lock.
    async fn transact_locked(&self, command: Command) -> Result<()> {
        let code = command.code();
        if code.is_some() {
            self.interrupt_locked().await?;
        }

        let pending = match (&command, code) {
            (Command::Single, _) => Some(Pending::sent(CommandId::Single)),
            (_, Some(code)) => Some(Pending::sent(CommandId::Code(code.into()))),
            _ => None,
        };
        let raw = code.map(u16::from);
        let mut saved = None;
        let mut echoes_before = 0;
        self.state.send_modify(|s| {
            saved = Some(LocalState::capture(s));
            echoes_before = raw.map_or(0, |raw| s.echo_count(raw));
            apply_local_effects(s, &command);
            s.pending = pending;
        });

        if let Err(e) = self.write_command(&command).await {
            if let Some(saved) = saved {
                self.state.send_modify(|s| saved.restore(s));
            }
            return Err(e);
        }

        if let Some(code) = code.filter(|c| c.awaits_ack()) {
            let raw = u16::from(code);
            self.wait_until(|s| s.echo_count(raw) > echoes_before).await?;
            debug!(%code, "Acknowledged");
        }
        Ok(())
    }

    /// Leave continuous mode. Does nothing if the device is already interrupted.
    pub async fn interrupt(&self) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.command_lock.lock().await;
        self.interrupt_locked().await
    }

    async fn interrupt_locked(&self) -> Result<()> {
        if self.mode() == Mode::Interrupted {
            return Ok(());
        }
        self.write_command(&Command::Interrupt).await?;
        self.wait_until(|s| s.mode == Mode::Interrupted).await
    }

    /// Start streaming at `rate` Hz (1, 2, 4 or 8).
    pub async fn continuous(&self, rate: u32) -> Result<()> {
        let rate = Rate::from_hz(rate)?;
        self.transact(Command::Continuous(rate)).await
    }

    /// Request one reading. It shows up in [`MiniCt::get_measurements`].
    pub async fn single(&self) -> Result<()> {
        self.transact(Command::Single).await
    }

    pub async fn set_485_address(&self, address: u32) -> Result<()> {
        self.transact(Command::SetAddress(address)).await
    }

    pub async fn get_485_address(&self) -> Result<()> {
        self.transact(Command::GetAddress).await
    }

    /// Request the header block. Each `key: value` line is merged into the datagram header.
    pub async fn get_header(&self) -> Result<()> {
        self.transact(Command::GetHeader).await
    }

    pub async fn set_address_mode(&self, enabled: bool) -> Result<()> {
        self.transact(Command::SetAddressMode(Switch::from(enabled))).await
    }

    pub async fn get_address_mode(&self) -> Result<()> {
        self.transact(Command::GetAddressMode).await
    }

    pub async fn get_last_result(&self) -> Result<()> {
        self.transact(Command::GetLastResult).await
    }

    /// Set the field delimiter. Must be exactly one character.
    pub async fn set_delimiter(&self, delimiter: &str) -> Result<()> {
        let mut chars = delimiter.chars();
        let delimiter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(MiniCtError::InvalidArgument(format!(
                    "delimiter must be a single character, got {delimiter:?}"
                )));
            }
        };
        self.transact(Command::SetDelimiter(delimiter)).await
    }

    pub async fn get_delimiter(&self) -> Result<()> {
        self.transact(Command::GetDelimiter).await
    }

    /// Start sampling with the stored mode (see [`MiniCt::set_mode`]).
    pub async fn set_run_mode(&self) -> Result<()> {
        self.transact(Command::SetRunMode).await
    }

    pub async fn get_run_mode(&self) -> Result<()> {
        self.transact(Command::GetRunMode).await
    }

    pub async fn get_version(&self) -> Result<()> {
        self.transact(Command::GetVersion).await
    }

    pub async fn get_serial(&self) -> Result<()> {
        self.transact(Command::GetSerial).await
    }

    /// Store the sampling rate used by run mode without starting it.
    pub async fn set_mode(&self, rate: u32) -> Result<()> {
        let rate = Rate::from_hz(rate)?;
        self.transact(Command::SetMode(rate)).await
    }

    pub async fn get_mode(&self) -> Result<()> {
        self.transact(Command::GetMode).await
    }

    /// Switch the link speed.
    ///
    /// The device is told to change rate, given `baud_settle` to do so, and
    /// the transport is then reopened at the new speed. Decoded replies in the
    /// datagram are kept. Requesting the current rate does nothing.
    pub async fn set_baud(&mut self, bps: u32) -> Result<()> {
        let baud = Baud::from_bps(bps)?;
        if baud == self.config.baud {
            debug!(%baud, "Baud rate unchanged");
            return Ok(());
        }
        self.ensure_running()?;

        self.transact(Command::SetBaud(baud)).await?;
        tokio::time::sleep(self.config.baud_settle).await;
        self.reconnect(baud).await
    }

    async fn reconnect(&mut self, baud: Baud) -> Result<()> {
        info!(from = %self.config.baud, to = %baud, "Reconnecting");
        self.stop().await;
        self.state.send_modify(|s| {
            s.mode = Mode::Interrupted;
            s.pending = None;
        });
        self.config.baud = baud;
        self.start().await
    }

    /// Set the output format: `3`, `SB`, `CSV` or `RES`.
    ///
    /// The local decoder switches to the format and its default delimiter
    /// before the request goes out.
    pub async fn set_output_format(&self, format: &str) -> Result<()> {
        let format: OutputFormat = format.parse()?;
        self.transact(Command::SetOutputFormat(format)).await
    }

    pub async fn get_output_format(&self) -> Result<()> {
        self.transact(Command::GetOutputFormat).await
    }

    pub async fn set_startup_mode(&self, enabled: bool) -> Result<()> {
        self.transact(Command::SetStartupMode(Switch::from(enabled))).await
    }

    pub async fn set_485_mode(&self, enabled: bool) -> Result<()> {
        self.transact(Command::SetBusMode(Switch::from(enabled))).await
    }

    pub async fn get_485_mode(&self) -> Result<()> {
        self.transact(Command::GetBusMode).await
    }

    /// Run every getter in turn and return what the device reported.
    pub async fn config(&self) -> Result<Datagram> {
        self.ensure_running()?;
        self.get_header().await?;
        self.get_485_address().await?;
        self.get_address_mode().await?;
        self.get_last_result().await?;
        self.get_delimiter().await?;
        self.get_run_mode().await?;
        self.get_version().await?;
        self.get_serial().await?;
        self.get_mode().await?;
        self.get_output_format().await?;
        self.get_485_mode().await?;
        Ok(self.datagram())
    }

    /// Latest reading, if one arrived since the last call.
    pub fn get_measurements(&self) -> Option<Vec<f64>> {
        let mut values = None;
        self.state.send_modify(|s| values = s.measurements.take());
        values
    }

    /// Wait for the next reading published after this call.
    ///
    /// Leaves the availability flag of [`MiniCt::get_measurements`] alone.
    pub async fn next_measurement(&self, limit: Duration) -> Result<Vec<f64>> {
        let mut rx = self.state.subscribe();
        let seen = rx.borrow_and_update().measurements.generation();
        let state = timeout(limit, rx.wait_for(|s| s.measurements.generation() != seen))
            .await?
            .map_err(|_| MiniCtError::ReceiverStopped)?;
        Ok(state.measurements.values().to_vec())
    }

    /// Send `S` and wait for the reading it produces.
    pub async fn read_single(&self, limit: Duration) -> Result<Vec<f64>> {
        self.ensure_running()?;
        let _guard = self.command_lock.lock().await;
        let seen = self.state.borrow().measurements.generation();
        self.transact_locked(Command::Single).await?;
        self.wait_for_state(limit, |s| s.measurements.generation() != seen).await?;
        Ok(self.get_measurements().unwrap_or_default())
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn output_format(&self) -> OutputFormat {
        self.state.borrow().output_format
    }

    pub fn delimiter(&self) -> String {
        self.state.borrow().delimiter.clone()
    }

    pub fn datagram(&self) -> Datagram {
        self.state.borrow().datagram.clone()
    }

    pub fn baud(&self) -> Baud {
        self.config.baud
    }

    /// Watch the full driver state; wakes on every change.
    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }
}

/// The parts of [`DriverState`] a command changes before it is written.
struct LocalState {
    mode: Mode,
    pending: Option<Pending>,
    output_format: OutputFormat,
    delimiter: String,
}

impl LocalState {
    fn capture(state: &DriverState) -> Self {
        Self {
            mode: state.mode,
            pending: state.pending,
            output_format: state.output_format,
            delimiter: state.delimiter.clone(),
        }
    }

    /// Undo the local effects of a command that never reached the device.
    fn restore(self, state: &mut DriverState) {
        state.mode = self.mode;
        state.pending = self.pending;
        state.output_format = self.output_format;
        state.delimiter = self.delimiter;
    }
}

/// State changes a command makes before it is written.
fn apply_local_effects(state: &mut DriverState, command: &Command) {
    match command {
        Command::Continuous(_) | Command::SetRunMode => state.mode = Mode::Continuous,
        Command::SetDelimiter(delimiter) => state.delimiter = delimiter.to_string(),
        Command::SetOutputFormat(format) => {
            state.output_format = *format;
            state.delimiter = format.default_delimiter().to_string();
        }
        _ => {}
    }
}
