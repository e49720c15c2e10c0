//! Maps numbered getter replies onto [`Datagram`] fields.

use crate::command::Code;
use crate::datagram::Datagram;
use crate::error::MiniCtError;
use strum_macros::Display;

/// A field of the [`Datagram`] that a reply can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Header,
    Address,
    AddressMode,
    LastResult,
    Delimiter,
    RunMode,
    SoftwareVersion,
    SerialNumber,
    OperatingMode,
    OutputFormat,
    BusMode,
}

/// How a reply line is turned into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Store the line as is
    Identity,
    /// `name: value`, accumulated into the header map
    Header,
    /// Strip one layer of surrounding quotes
    Delimiter,
}

impl Code {
    /// The field a reply to this code fills, or `None` for codes without a reply.
    pub fn field(self) -> Option<Field> {
        match self {
            Code::GetAddress => Some(Field::Address),
            Code::GetHeader => Some(Field::Header),
            Code::GetAddressMode => Some(Field::AddressMode),
            Code::GetLastResult => Some(Field::LastResult),
            Code::GetDelimiter => Some(Field::Delimiter),
            Code::GetRunMode => Some(Field::RunMode),
            Code::GetVersion => Some(Field::SoftwareVersion),
            Code::GetSerial => Some(Field::SerialNumber),
            Code::GetMode => Some(Field::OperatingMode),
            Code::GetOutputFormat => Some(Field::OutputFormat),
            Code::GetBusMode => Some(Field::BusMode),
            Code::SetAddress
            | Code::SetAddressMode
            | Code::SetDelimiter
            | Code::SetRunMode
            | Code::SetMode
            | Code::SetBaud
            | Code::SetOutputFormat
            | Code::SetStartupMode
            | Code::SetBusMode => None,
        }
    }
}

impl Field {
    pub fn decoder(self) -> Decoder {
        match self {
            Field::Header => Decoder::Header,
            Field::Delimiter => Decoder::Delimiter,
            _ => Decoder::Identity,
        }
    }
}

/// Look up the field for a raw echoed code. Unknown and reply-less codes give `None`.
pub fn lookup(raw_code: u16) -> Option<Field> {
    Code::try_from(raw_code).ok().and_then(Code::field)
}

/// Split a header line at the first `:` into a trimmed key and value.
pub fn parse_header_line(line: &str) -> Result<(String, String), MiniCtError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| MiniCtError::Decode(format!("header line without ':': '{line}'")))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Remove one leading and one trailing `"`.
pub fn strip_quotes(line: &str) -> &str {
    let line = line.strip_prefix('"').unwrap_or(line);
    line.strip_suffix('"').unwrap_or(line)
}

impl Datagram {
    /// Decode `line` with the field's decoder and store the result.
    ///
    /// On a decode error the datagram is left untouched.
    pub fn apply(&mut self, field: Field, line: &str) -> Result<(), MiniCtError> {
        let slot = match field {
            Field::Header => {
                let (name, value) = parse_header_line(line)?;
                self.header.insert(name, value);
                return Ok(());
            }
            Field::Address => &mut self.address,
            Field::AddressMode => &mut self.address_mode,
            Field::LastResult => &mut self.last_result,
            Field::Delimiter => &mut self.delimiter,
            Field::RunMode => &mut self.run_mode,
            Field::SoftwareVersion => &mut self.software_version,
            Field::SerialNumber => &mut self.serial_number,
            Field::OperatingMode => &mut self.operating_mode,
            Field::OutputFormat => &mut self.output_format,
            Field::BusMode => &mut self.bus_mode,
        };
        *slot = match field.decoder() {
            Decoder::Delimiter => strip_quotes(line).to_string(),
            Decoder::Identity | Decoder::Header => line.to_string(),
        };
        Ok(())
    }
}
