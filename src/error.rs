//! Error handling for the tn3270 engine
//!
//! Structured error types for the data stream codec, the TELNET transport,
//! and session management, with `Display` text suitable for operator-facing
//! status lines.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for tn3270 operations
#[derive(Debug)]
pub enum Tn3270Error {
    /// 3270 data stream errors
    Protocol(ProtocolError),
    /// TELNET transport and negotiation errors
    Telnet(TelnetError),
    /// Configuration errors
    Config(ConfigError),
    /// Underlying socket errors
    Io(io::Error),
}

/// 3270 data stream parsing errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Unrecognized or contextually invalid command byte
    BadCommand { code: u8 },
    /// Buffer address outside the current screen size
    BadAddress { address: u16, buffer_size: usize },
    /// Order operand missing at the end of the record
    Truncated { order: u8, needed: usize, remaining: usize },
    /// Malformed structured field
    BadStructuredField { id: u8, reason: &'static str },
}

/// TELNET transport errors
#[derive(Debug)]
pub enum TelnetError {
    /// The host refused an option the session requires
    NegotiationRefused { option: u8 },
    /// Subnegotiation data did not parse
    MalformedSubnegotiation { option: u8, data: Vec<u8> },
    /// Connection lost during a record
    ConnectionLost { reason: String },
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file could not be parsed
    Parse { message: String },
    /// A setting holds a value outside its valid range
    InvalidValue { setting: &'static str, value: String },
}

impl fmt::Display for Tn3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tn3270Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Tn3270Error::Telnet(e) => write!(f, "telnet error: {}", e),
            Tn3270Error::Config(e) => write!(f, "configuration error: {}", e),
            Tn3270Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BadCommand { code } => {
                write!(f, "unknown 3270 command 0x{:02X}", code)
            }
            ProtocolError::BadAddress { address, buffer_size } => {
                write!(
                    f,
                    "buffer address {} outside screen of {} cells",
                    address, buffer_size
                )
            }
            ProtocolError::Truncated { order, needed, remaining } => {
                write!(
                    f,
                    "order 0x{:02X} needs {} operand bytes, {} remain",
                    order, needed, remaining
                )
            }
            ProtocolError::BadStructuredField { id, reason } => {
                write!(f, "structured field 0x{:02X}: {}", id, reason)
            }
        }
    }
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::NegotiationRefused { option } => {
                write!(f, "host refused required telnet option {}", option)
            }
            TelnetError::MalformedSubnegotiation { option, data } => {
                write!(
                    f,
                    "malformed subnegotiation for option {} ({} bytes)",
                    option,
                    data.len()
                )
            }
            TelnetError::ConnectionLost { reason } => {
                write!(f, "connection lost: {}", reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { message } => write!(f, "parse failure: {}", message),
            ConfigError::InvalidValue { setting, value } => {
                write!(f, "invalid value '{}' for {}", value, setting)
            }
        }
    }
}

impl StdError for Tn3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Tn3270Error::Protocol(e) => Some(e),
            Tn3270Error::Telnet(e) => Some(e),
            Tn3270Error::Config(e) => Some(e),
            Tn3270Error::Io(e) => Some(e),
        }
    }
}

impl StdError for ProtocolError {}
impl StdError for TelnetError {}
impl StdError for ConfigError {}

impl From<ProtocolError> for Tn3270Error {
    fn from(e: ProtocolError) -> Self {
        Tn3270Error::Protocol(e)
    }
}

impl From<TelnetError> for Tn3270Error {
    fn from(e: TelnetError) -> Self {
        Tn3270Error::Telnet(e)
    }
}

impl From<ConfigError> for Tn3270Error {
    fn from(e: ConfigError) -> Self {
        Tn3270Error::Config(e)
    }
}

impl From<io::Error> for Tn3270Error {
    fn from(e: io::Error) -> Self {
        Tn3270Error::Io(e)
    }
}

/// Result alias for engine-wide operations
pub type Tn3270Result<T> = Result<T, Tn3270Error>;

/// Result alias for data stream operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
