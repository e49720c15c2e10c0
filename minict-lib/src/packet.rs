use crate::constants::INTERRUPT_NOTICE_PREFIX;
use crate::state::Mode;
use regex::Regex;
use std::sync::LazyLock;

// Greedy prefix: when a line carries several echoes the last one wins
static ACK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*#([0-9]{3})").expect("acknowledgement pattern is valid"));

/// A line received from the device, tagged by what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Echo of a numbered command, carrying the three digit code
    Acknowledgement(u16),
    /// The device left continuous mode
    InterruptNotice(&'a str),
    /// A reading streamed in continuous mode
    Measurement(&'a str),
    /// Anything else: a reply to the pending command, or noise
    Unclassified(&'a str),
}

impl<'a> Packet<'a> {
    /// Classify one line with its terminator already stripped.
    ///
    /// Checks run in priority order: acknowledgement, interrupt notice,
    /// measurement, then unclassified.
    pub fn classify(line: &'a str, mode: Mode) -> Self {
        if let Some(code) = acknowledged_code(line) {
            return Packet::Acknowledgement(code);
        }
        if line.starts_with(INTERRUPT_NOTICE_PREFIX) {
            return Packet::InterruptNotice(line);
        }
        if mode == Mode::Continuous && line.starts_with(|c: char| c.is_ascii_digit()) {
            return Packet::Measurement(line);
        }
        Packet::Unclassified(line)
    }
}

/// The code echoed in `line`, if it contains one.
pub fn acknowledged_code(line: &str) -> Option<u16> {
    ACK_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
