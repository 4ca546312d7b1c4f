//! tn3270: an IBM 3270 data stream codec and TN3270/TN3270E session engine
//!
//! The crate is layered the way the wire is: `telnet` frames records and
//! negotiates options, `datastream` and `structured_field` interpret the
//! 3270 protocol against a `screen::ScreenBuffer`, and `session` ties the
//! layers to a socket and an event bus. Everything below the socket is
//! byte-driven and usable without any network.

pub mod codes;
pub mod config;
pub mod datastream;
pub mod ebcdic;
pub mod error;
pub mod field;
pub mod screen;
pub mod session;
pub mod structured_field;
pub mod telnet;

pub use codes::{AidKey, CommandCode, OrderCode};
pub use config::{LineEnding, SessionConfig, TerminalModel};
pub use datastream::{DataStreamCodec, Effect, ReplyMode};
pub use error::{ProtocolError, Tn3270Error, Tn3270Result};
pub use field::{FieldAttribute, FieldIntensity};
pub use screen::{BufferAddress, Cell, ScreenBuffer};
pub use session::{Session, SessionEvent, SessionMode};
pub use structured_field::StructuredFieldProcessor;
pub use telnet::{LineEditor, TelnetTransport, TransportEvent};
