use serde::Serialize;
use std::collections::BTreeMap;

/// Configuration reported by the device, filled in from getter replies.
///
/// Every field starts empty and keeps the last reply the device gave for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Datagram {
    /// `name: value` lines of the header block, accumulated across lines
    pub header: BTreeMap<String, String>,
    pub address: String,
    pub address_mode: String,
    pub last_result: String,
    /// Delimiter as reported by the device, quotes removed
    pub delimiter: String,
    pub run_mode: String,
    pub software_version: String,
    pub serial_number: String,
    pub operating_mode: String,
    pub output_format: String,
    pub bus_mode: String,
}

impl Datagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to pretty JSON for display.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
