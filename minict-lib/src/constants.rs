// Protocol constants for the miniCT

use std::time::Duration;

/// Line terminator used in both directions
pub const LINE_TERMINATOR: &str = "\r\n";

/// Commands shorter than this always get a terminator appended
pub const MIN_FRAMED_LEN: usize = 4;

/// Marker that opens every numbered command and its echo
pub const COMMAND_PREFIX: char = '#';

/// First character of the line the device sends when continuous mode stops
pub const INTERRUPT_NOTICE_PREFIX: char = '>';

/// Separator between a numbered command and its argument
pub const ARGUMENT_SEPARATOR: char = ';';

/// Delimiter the device uses for the raw `3` output format
pub const TAB_DELIMITER: &str = "\t";

/// Delimiter the device uses for the CSV, SB and RES output formats
pub const COMMA_DELIMITER: &str = ",";

/// Baud rate the device ships with
pub const DEFAULT_BAUD: u32 = 19200;

/// How long a single read attempt may block before the receiver re-checks for shutdown
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// How long a command waits for its echo or for the mode to change
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between sending a baud change and reopening the port
pub const DEFAULT_BAUD_SETTLE: Duration = Duration::from_secs(1);
