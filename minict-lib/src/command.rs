use crate::constants::{ARGUMENT_SEPARATOR, COMMAND_PREFIX, LINE_TERMINATOR, MIN_FRAMED_LEN};
use crate::error::MiniCtError;
use crate::values::OutputFormat;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::Display;

/// Numbered command codes understood by the miniCT.
///
/// On the wire a code is written as `#` followed by three digits, e.g. `#027`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Code {
    SetAddress = 1,
    GetAddress = 2,
    GetHeader = 4,
    SetAddressMode = 5,
    GetAddressMode = 6,
    GetLastResult = 15,
    SetDelimiter = 26,
    GetDelimiter = 27,
    SetRunMode = 28,
    GetRunMode = 29,
    GetVersion = 32,
    GetSerial = 34,
    SetMode = 39,
    GetMode = 40,
    SetBaud = 59,
    SetOutputFormat = 82,
    GetOutputFormat = 89,
    SetStartupMode = 91,
    SetBusMode = 102,
    GetBusMode = 103,
}

impl Code {
    /// Whether the driver blocks until the device echoes this code back.
    ///
    /// Getters always wait. Of the setters only those that change how the
    /// device streams (run mode, mode, output format) wait; the rest are
    /// fire-and-forget. A baud change cannot wait because the link drops.
    pub fn awaits_ack(self) -> bool {
        match self {
            Code::GetAddress
            | Code::GetHeader
            | Code::GetAddressMode
            | Code::GetLastResult
            | Code::GetDelimiter
            | Code::GetRunMode
            | Code::GetVersion
            | Code::GetSerial
            | Code::GetMode
            | Code::GetOutputFormat
            | Code::GetBusMode => true,
            Code::SetRunMode | Code::SetMode | Code::SetOutputFormat => true,
            Code::SetAddress
            | Code::SetAddressMode
            | Code::SetDelimiter
            | Code::SetBaud
            | Code::SetStartupMode
            | Code::SetBusMode => false,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", COMMAND_PREFIX, u16::from(*self))
    }
}

impl FromStr for Code {
    type Err = MiniCtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(COMMAND_PREFIX)
            .ok_or_else(|| MiniCtError::InvalidArgument(format!("'{s}' is not a command code")))?;
        let value: u16 = digits
            .parse()
            .map_err(|_| MiniCtError::InvalidArgument(format!("'{s}' is not a command code")))?;
        Code::try_from(value).map_err(|_| MiniCtError::InvalidArgument(format!("unknown command code {s}")))
    }
}

/// Continuous sampling rate in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Rate {
    #[strum(to_string = "1")]
    Hz1 = 1,
    #[strum(to_string = "2")]
    Hz2 = 2,
    #[strum(to_string = "4")]
    Hz4 = 4,
    #[strum(to_string = "8")]
    Hz8 = 8,
}

impl Rate {
    pub fn from_hz(hz: u32) -> Result<Self, MiniCtError> {
        u8::try_from(hz)
            .ok()
            .and_then(|v| Rate::try_from(v).ok())
            .ok_or_else(|| MiniCtError::InvalidArgument(format!("rate must be one of [1, 2, 4, 8], got {hz}")))
    }
}

/// Serial link speeds the device can be switched to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Default, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum Baud {
    #[strum(to_string = "2400")]
    B2400 = 2400,
    #[strum(to_string = "4800")]
    B4800 = 4800,
    #[strum(to_string = "9600")]
    B9600 = 9600,
    #[default]
    #[strum(to_string = "19200")]
    B19200 = 19200,
    #[strum(to_string = "38400")]
    B38400 = 38400,
}

impl Baud {
    pub fn from_bps(bps: u32) -> Result<Self, MiniCtError> {
        Baud::try_from(bps).map_err(|_| {
            MiniCtError::InvalidArgument(format!(
                "baudrate must be one of [2400, 4800, 9600, 19200, 38400], got {bps}"
            ))
        })
    }

    pub fn as_bps(self) -> u32 {
        self.into()
    }
}

/// ON/OFF argument used by the mode toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Switch {
    #[strum(to_string = "ON")]
    On,
    #[strum(to_string = "OFF")]
    Off,
}

impl From<bool> for Switch {
    fn from(value: bool) -> Self {
        if value { Switch::On } else { Switch::Off }
    }
}

/// A request the driver can send to the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `M<rate>`: start streaming at the given rate
    Continuous(Rate),
    /// `S`: one reading
    Single,
    /// `#`: leave continuous mode
    Interrupt,
    SetAddress(u32),
    GetAddress,
    GetHeader,
    SetAddressMode(Switch),
    GetAddressMode,
    GetLastResult,
    SetDelimiter(char),
    GetDelimiter,
    SetRunMode,
    GetRunMode,
    GetVersion,
    GetSerial,
    SetMode(Rate),
    GetMode,
    SetBaud(Baud),
    SetOutputFormat(OutputFormat),
    GetOutputFormat,
    SetStartupMode(Switch),
    SetBusMode(Switch),
    GetBusMode,
}

impl Command {
    /// The numbered code, if this is a `#NNN` command.
    pub fn code(&self) -> Option<Code> {
        let code = match self {
            Command::Continuous(_) | Command::Single | Command::Interrupt => return None,
            Command::SetAddress(_) => Code::SetAddress,
            Command::GetAddress => Code::GetAddress,
            Command::GetHeader => Code::GetHeader,
            Command::SetAddressMode(_) => Code::SetAddressMode,
            Command::GetAddressMode => Code::GetAddressMode,
            Command::GetLastResult => Code::GetLastResult,
            Command::SetDelimiter(_) => Code::SetDelimiter,
            Command::GetDelimiter => Code::GetDelimiter,
            Command::SetRunMode => Code::SetRunMode,
            Command::GetRunMode => Code::GetRunMode,
            Command::GetVersion => Code::GetVersion,
            Command::GetSerial => Code::GetSerial,
            Command::SetMode(_) => Code::SetMode,
            Command::GetMode => Code::GetMode,
            Command::SetBaud(_) => Code::SetBaud,
            Command::SetOutputFormat(_) => Code::SetOutputFormat,
            Command::GetOutputFormat => Code::GetOutputFormat,
            Command::SetStartupMode(_) => Code::SetStartupMode,
            Command::SetBusMode(_) => Code::SetBusMode,
            Command::GetBusMode => Code::GetBusMode,
        };
        Some(code)
    }

    fn argument(&self) -> Option<String> {
        match self {
            Command::SetAddress(address) => Some(address.to_string()),
            Command::SetAddressMode(state)
            | Command::SetStartupMode(state)
            | Command::SetBusMode(state) => Some(state.to_string()),
            Command::SetDelimiter(delimiter) => Some(delimiter.to_string()),
            Command::SetMode(rate) => Some(format!("M{rate}")),
            Command::SetBaud(baud) => Some(baud.to_string()),
            Command::SetOutputFormat(format) => Some(format.to_string()),
            _ => None,
        }
    }

    /// The command text without line framing.
    pub fn text(&self) -> String {
        match self {
            Command::Continuous(rate) => format!("M{rate}"),
            Command::Single => "S".to_string(),
            Command::Interrupt => COMMAND_PREFIX.to_string(),
            other => {
                // Every remaining variant is numbered
                let code = other.code().map(|c| c.to_string()).unwrap_or_default();
                match other.argument() {
                    Some(arg) => format!("{code}{ARGUMENT_SEPARATOR}{arg}"),
                    None => code,
                }
            }
        }
    }

    /// The command as it goes on the wire, CRLF terminated.
    pub fn to_line(&self) -> String {
        frame_line(&self.text())
    }
}

/// Appends CRLF to anything that is short or not already terminated.
pub fn frame_line(text: &str) -> String {
    let mut line = text.to_string();
    if line.len() < MIN_FRAMED_LEN || !line.ends_with(LINE_TERMINATOR) {
        line.push_str(LINE_TERMINATOR);
    }
    line
}
