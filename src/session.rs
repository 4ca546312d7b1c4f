//! Session management
//!
//! Owns the TELNET transport, the screen, and both codecs, routes records
//! between them, and tracks the connection mode. Networking is plain
//! `std::net::TcpStream` in non-blocking mode, driven by `pump`; everything
//! below the socket is byte-driven and testable without one.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::codes::AidKey;
use crate::config::SessionConfig;
use crate::datastream::{DataStreamCodec, Effect};
use crate::ebcdic::ascii_to_ebcdic;
use crate::error::Tn3270Result;
use crate::screen::ScreenBuffer;
use crate::structured_field::StructuredFieldProcessor;
use crate::telnet::{
    LineEditor, LineEvent, TelnetTransport, TransportEvent, IAC, TN3270E_DT_3270_DATA,
    TN3270E_DT_BIND_IMAGE, TN3270E_DT_NVT_DATA, TN3270E_DT_SCS_DATA, TN3270E_DT_SSCP_LU_DATA,
    TN3270E_DT_UNBIND, TN3270E_HEADER_LEN,
};

/// Connection mode, refined as negotiation and the host's data stream
/// progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    NotConnected,
    /// Connect in progress
    Pending,
    /// Socket up, options still settling
    ConnectedInitial,
    /// Classic TELNET line mode
    ConnectedNvt,
    /// Binary + EOR both ways: full 3270 data stream
    Connected3270,
    /// TN3270E negotiated, no session bound yet
    ConnectedInitialE,
    /// NVT data inside TN3270E framing
    ConnectedNvtE,
    /// SSCP-LU (unbound) conversation
    ConnectedSscp,
    /// Bound TN3270E session
    ConnectedTn3270e,
}

impl SessionMode {
    /// True in the modes that carry the 3270 data stream
    pub fn in_3270(self) -> bool {
        matches!(
            self,
            SessionMode::Connected3270 | SessionMode::ConnectedTn3270e | SessionMode::ConnectedSscp
        )
    }
}

/// Notifications delivered to registered observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Socket came up or went away
    Connect(bool),
    /// Entered or left a 3270 data stream mode
    Mode3270(bool),
    /// WCC requested start-print
    Printer(bool),
    /// Session is shutting down
    Exiting,
    /// Host unlocked the keyboard
    KeyboardRestore,
    /// WCC requested the alarm
    Alarm,
}

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

/// One terminal session
pub struct Session {
    config: SessionConfig,
    transport: TelnetTransport,
    screen: ScreenBuffer,
    codec: DataStreamCodec,
    sf: StructuredFieldProcessor,
    line_editor: LineEditor,
    mode: SessionMode,
    stream: Option<TcpStream>,
    out_queue: Vec<u8>,
    observers: Vec<Observer>,
    e_sequence: u16,
    kbd_was_locked: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (alt_rows, alt_cols) = config.model.dimensions();
        let transport = TelnetTransport::new(config.terminal_type(), config.tn3270e);
        Session {
            config,
            transport,
            screen: ScreenBuffer::new(alt_rows, alt_cols),
            codec: DataStreamCodec::new(),
            sf: StructuredFieldProcessor::new(),
            line_editor: LineEditor::new(),
            mode: SessionMode::NotConnected,
            stream: None,
            out_queue: Vec::new(),
            observers: Vec::new(),
            e_sequence: 0,
            kbd_was_locked: true,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.screen
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    fn emit(&mut self, event: SessionEvent) {
        trace!("session event: {:?}", event);
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn set_mode(&mut self, mode: SessionMode) {
        if self.mode == mode {
            return;
        }
        let was_3270 = self.mode.in_3270();
        debug!("session mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        if mode.in_3270() != was_3270 {
            self.emit(SessionEvent::Mode3270(mode.in_3270()));
        }
    }

    /// Open the socket, trying each resolved address with the configured
    /// timeout
    pub fn connect(&mut self) -> Tn3270Result<()> {
        self.config.validate()?;
        self.set_mode(SessionMode::Pending);
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let addrs = (self.config.host.as_str(), self.config.port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_nonblocking(true)?;
                    info!("connected to {}", addr);
                    self.stream = Some(stream);
                    self.set_mode(SessionMode::ConnectedInitial);
                    self.emit(SessionEvent::Connect(true));
                    return Ok(());
                }
                Err(e) => {
                    warn!("connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        self.set_mode(SessionMode::NotConnected);
        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses")
            })
            .into())
    }

    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            info!("disconnected from {}", self.config.host);
        }
        // a partially received record dies with the negotiation state
        self.transport.reset();
        self.e_sequence = 0;
        self.set_mode(SessionMode::NotConnected);
        self.emit(SessionEvent::Exiting);
        self.emit(SessionEvent::Connect(false));
    }

    /// Drive the socket: flush queued output, read what is available, and
    /// process it. Returns without blocking.
    pub fn pump(&mut self) -> Tn3270Result<()> {
        self.flush()?;
        let mut buf = [0u8; 4096];
        loop {
            let result = match self.stream.as_mut() {
                Some(stream) => stream.read(&mut buf),
                None => return Ok(()),
            };
            match result {
                Ok(0) => {
                    self.disconnect();
                    return Ok(());
                }
                Ok(n) => {
                    let bytes = buf[..n].to_vec();
                    self.process_bytes(&bytes)?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    self.disconnect();
                    return Err(e.into());
                }
            }
        }
    }

    /// Feed received bytes through the transport and handle the results.
    /// Public so the protocol path can be driven without a socket.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Tn3270Result<()> {
        if self.mode == SessionMode::NotConnected || self.mode == SessionMode::Pending {
            self.set_mode(SessionMode::ConnectedInitial);
        }
        let events = self.transport.feed(bytes);
        for event in events {
            match event {
                TransportEvent::Record(record) => self.process_record(&record)?,
                TransportEvent::NvtData(data) => self.handle_nvt(&data),
                TransportEvent::ModeMaybeChanged => self.update_mode(),
            }
        }
        let negotiation = self.transport.take_outgoing();
        if !negotiation.is_empty() {
            self.queue(&negotiation);
        }
        self.flush()
    }

    fn update_mode(&mut self) {
        let mode = if self.transport.now_tn3270e() {
            match self.mode {
                SessionMode::ConnectedTn3270e
                | SessionMode::ConnectedSscp
                | SessionMode::ConnectedNvtE => self.mode,
                _ => SessionMode::ConnectedInitialE,
            }
        } else if self.transport.now3270() {
            SessionMode::Connected3270
        } else if self.mode.in_3270() || self.mode == SessionMode::ConnectedInitialE {
            // negotiation fell back
            SessionMode::ConnectedInitial
        } else {
            self.mode
        };
        self.set_mode(mode);
    }

    /// Handle one complete record between EOR marks
    pub fn process_record(&mut self, record: &[u8]) -> Tn3270Result<()> {
        let (data, e_mode) = if self.transport.now_tn3270e() {
            if record.len() < TN3270E_HEADER_LEN {
                warn!("short TN3270E record of {} bytes dropped", record.len());
                return Ok(());
            }
            (&record[TN3270E_HEADER_LEN..], true)
        } else {
            (record, false)
        };

        if e_mode {
            match record[0] {
                TN3270E_DT_3270_DATA => {
                    self.set_mode(SessionMode::ConnectedTn3270e);
                    self.apply_3270_data(data);
                }
                TN3270E_DT_BIND_IMAGE => {
                    debug!("BIND received, session bound");
                    self.set_mode(SessionMode::ConnectedTn3270e);
                }
                TN3270E_DT_UNBIND => {
                    debug!("UNBIND received");
                    self.set_mode(SessionMode::ConnectedInitialE);
                }
                TN3270E_DT_SSCP_LU_DATA => {
                    self.set_mode(SessionMode::ConnectedSscp);
                    self.apply_3270_data(data);
                }
                TN3270E_DT_NVT_DATA => {
                    self.handle_nvt(data);
                }
                TN3270E_DT_SCS_DATA => {
                    warn!("SCS data ignored, printer sessions not supported");
                }
                other => warn!("unknown TN3270E data type 0x{:02X}", other),
            }
        } else {
            self.apply_3270_data(data);
        }
        Ok(())
    }

    /// Run one outbound 3270 record through the codec and deliver any reply
    fn apply_3270_data(&mut self, data: &[u8]) {
        match self.codec.process(data, &mut self.screen, &mut self.sf) {
            Ok(Effect::None) => {}
            Ok(Effect::Reply(reply)) => self.send_record(&reply),
            Err(e) => {
                // the record is abandoned, what it wrote so far stays
                warn!("outbound record abandoned: {}", e);
            }
        }
        if self.codec.take_print_pending() {
            self.emit(SessionEvent::Printer(true));
        }
        if self.screen.alarm() {
            self.screen.set_alarm(false);
            self.emit(SessionEvent::Alarm);
        }
        let locked = self.screen.keyboard_locked();
        if self.kbd_was_locked && !locked {
            self.emit(SessionEvent::KeyboardRestore);
        }
        self.kbd_was_locked = locked;
    }

    /// Render NVT output onto the screen with minimal glass-tty handling
    fn handle_nvt(&mut self, data: &[u8]) {
        if !self.mode.in_3270() {
            self.set_mode(if self.transport.now_tn3270e() {
                SessionMode::ConnectedNvtE
            } else {
                SessionMode::ConnectedNvt
            });
        }
        for &b in data {
            let cursor = self.screen.cursor_addr();
            let cols = self.screen.cols() as u16;
            match b {
                b'\r' => {
                    self.screen.set_cursor_addr(cursor - cursor % cols);
                }
                b'\n' => {
                    let next = cursor + cols;
                    if (next as usize) < self.screen.size() {
                        self.screen.set_cursor_addr(next);
                    } else {
                        self.scroll_up();
                    }
                }
                0x07 => self.emit(SessionEvent::Alarm),
                0x08 => {
                    if cursor > 0 {
                        self.screen.set_cursor_addr(cursor - 1);
                    }
                }
                0x00 => {}
                b if b >= 0x20 && b < 0x7F => {
                    self.screen.set_buffer_addr(cursor);
                    self.screen
                        .write_data(ascii_to_ebcdic(b as char), 0, 0, 0);
                    let advanced = self.screen.buffer_addr();
                    if advanced == 0 {
                        self.scroll_up();
                    } else {
                        self.screen.set_cursor_addr(advanced);
                    }
                }
                other => trace!("NVT control byte 0x{:02X} ignored", other),
            }
        }
    }

    fn scroll_up(&mut self) {
        let cols = self.screen.cols();
        let size = self.screen.size();
        self.screen.block_copy(cols as u16, 0, size - cols, true);
        self.screen.block_clear((size - cols) as u16, cols, true);
        self.screen.set_cursor_addr((size - cols) as u16);
    }

    /// Operator attention: build the inbound record and transmit it
    pub fn submit_aid(&mut self, aid: AidKey) -> Tn3270Result<()> {
        if self.screen.keyboard_locked() && aid != AidKey::SysReq {
            warn!("keyboard locked, {:?} dropped", aid);
            return Ok(());
        }
        let record = self.codec.submit_aid(&mut self.screen, aid);
        self.kbd_was_locked = true;
        self.send_record(&record);
        self.flush()
    }

    /// Feed one typed byte to the NVT line editor, transmitting completed
    /// lines with the configured terminator
    pub fn type_nvt_byte(&mut self, byte: u8) -> Tn3270Result<()> {
        match self.line_editor.feed(byte) {
            LineEvent::Pending => Ok(()),
            LineEvent::Line(line) => {
                let mut wire = Vec::with_capacity(line.len() + 2);
                for b in line {
                    wire.push(b);
                    if b == IAC {
                        wire.push(IAC);
                    }
                }
                wire.extend_from_slice(self.config.line_ending.bytes());
                self.queue(&wire);
                self.flush()
            }
            LineEvent::Eof => {
                self.disconnect();
                Ok(())
            }
        }
    }

    /// Frame and queue an inbound 3270 record, with the TN3270E header when
    /// the session runs in E mode
    fn send_record(&mut self, record: &[u8]) {
        let framed = if self.transport.now_tn3270e() {
            let mut with_header = Vec::with_capacity(record.len() + TN3270E_HEADER_LEN);
            with_header.push(TN3270E_DT_3270_DATA);
            with_header.extend_from_slice(&[0x00, 0x00]);
            with_header.extend_from_slice(&self.e_sequence.to_be_bytes());
            self.e_sequence = self.e_sequence.wrapping_add(1);
            with_header.extend_from_slice(record);
            self.transport.frame_record(&with_header)
        } else {
            self.transport.frame_record(record)
        };
        self.queue(&framed);
    }

    fn queue(&mut self, bytes: &[u8]) {
        self.out_queue.extend_from_slice(bytes);
    }

    /// Write as much of the output queue as the socket will take
    fn flush(&mut self) -> Tn3270Result<()> {
        while !self.out_queue.is_empty() {
            let result = match self.stream.as_mut() {
                // no socket: keep the queue for tests to inspect
                None => return Ok(()),
                Some(stream) => stream.write(&self.out_queue),
            };
            match result {
                Ok(0) => {
                    self.disconnect();
                    return Ok(());
                }
                Ok(n) => {
                    self.out_queue.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    self.disconnect();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Queued wire bytes not yet written, for socketless callers
    pub fn take_queued_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_queue)
    }
}
