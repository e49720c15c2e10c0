use crate::datagram::Datagram;
use crate::packet::Packet;
use crate::registry::{self, Field};
use crate::values::{OutputFormat, decode_values};
use std::collections::HashMap;
use strum_macros::Display;
use tracing::{debug, trace};

/// Whether the device is streaming or waiting for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Mode {
    #[default]
    Interrupted,
    Continuous,
}

/// Identifies the request a reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    /// The `S` single reading request, which the device never echoes
    Single,
    /// A numbered command, by its raw code (the device may echo codes the driver does not know)
    Code(u16),
}

/// The most recent request and whether the device has echoed it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub id: CommandId,
    pub acknowledged: bool,
}

impl Pending {
    pub fn sent(id: CommandId) -> Self {
        Self { id, acknowledged: false }
    }

    pub fn echoed(code: u16) -> Self {
        Self {
            id: CommandId::Code(code),
            acknowledged: true,
        }
    }
}

/// Latest decoded reading. Each new line replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementBuffer {
    values: Vec<f64>,
    available: bool,
    generation: u64,
}

impl MeasurementBuffer {
    pub fn publish(&mut self, values: Vec<f64>) {
        self.values = values;
        self.available = true;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Hand out the values once; `None` until the next line is published.
    pub fn take(&mut self) -> Option<Vec<f64>> {
        if !self.available {
            return None;
        }
        self.available = false;
        Some(self.values.clone())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Count of lines published so far
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Everything the receiver and the command API share.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverState {
    pub mode: Mode,
    pub pending: Option<Pending>,
    pub output_format: OutputFormat,
    /// Delimiter the value decoder splits on
    pub delimiter: String,
    pub datagram: Datagram,
    pub measurements: MeasurementBuffer,
    /// Echoes seen per code. Only ever grows, so a waiter cannot miss one.
    pub echoes: HashMap<u16, u64>,
}

impl Default for DriverState {
    fn default() -> Self {
        let output_format = OutputFormat::default();
        Self {
            mode: Mode::default(),
            pending: None,
            output_format,
            delimiter: output_format.default_delimiter().to_string(),
            datagram: Datagram::new(),
            measurements: MeasurementBuffer::default(),
            echoes: HashMap::new(),
        }
    }
}

impl DriverState {
    /// Apply one received line. Returns `true` if anything changed.
    pub fn handle_line(&mut self, line: &str) -> bool {
        match Packet::classify(line, self.mode) {
            Packet::Acknowledgement(code) => {
                trace!(code, "Acknowledgement");
                self.pending = Some(Pending::echoed(code));
                *self.echoes.entry(code).or_default() += 1;
                true
            }
            Packet::InterruptNotice(_) => {
                debug!("Device left continuous mode");
                self.mode = Mode::Interrupted;
                self.pending = None;
                true
            }
            Packet::Measurement(line) => self.publish_values(line),
            Packet::Unclassified(line) => self.route_reply(line),
        }
    }

    fn route_reply(&mut self, line: &str) -> bool {
        if self.mode == Mode::Continuous {
            trace!(line, "Dropping non-measurement line in continuous mode");
            return false;
        }
        match self.pending.map(|p| p.id) {
            Some(CommandId::Single) => self.publish_values(line),
            Some(CommandId::Code(code)) => {
                let Some(field) = registry::lookup(code) else {
                    trace!(code, line, "No registry entry, discarding line");
                    return false;
                };
                match self.datagram.apply(field, line) {
                    Ok(()) => {
                        self.follow_reply(field);
                        true
                    }
                    Err(e) => {
                        debug!(%field, "Discarding reply: {}", e);
                        false
                    }
                }
            }
            None => {
                trace!(line, "No pending command, discarding line");
                false
            }
        }
    }

    /// Keep the value decoder in step with what the device reports.
    fn follow_reply(&mut self, field: Field) {
        match field {
            Field::Delimiter if !self.datagram.delimiter.is_empty() => {
                self.delimiter = self.datagram.delimiter.clone();
            }
            Field::OutputFormat => {
                if let Ok(format) = self.datagram.output_format.parse() {
                    self.output_format = format;
                }
            }
            _ => {}
        }
    }

    fn publish_values(&mut self, line: &str) -> bool {
        match decode_values(line, self.output_format, &self.delimiter) {
            Ok(values) => {
                trace!(?values, "Measurement");
                self.measurements.publish(values);
                true
            }
            Err(e) => {
                debug!("Dropping measurement: {}", e);
                false
            }
        }
    }

    /// How many times the device has echoed `code`.
    pub fn echo_count(&self, code: u16) -> u64 {
        self.echoes.get(&code).copied().unwrap_or(0)
    }
}
