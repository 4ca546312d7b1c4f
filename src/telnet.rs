//! TELNET transport and option negotiation
//!
//! A byte-driven state machine independent of any socket: callers feed
//! received bytes in and drain negotiation replies out. Handles the classic
//! TN3270 option dance (BINARY + EOR + TERMINAL-TYPE), TN3270E device-type
//! and function negotiation, IAC EOR record framing, and NVT cooked-mode
//! line editing for hosts that drop to line mode.

use log::{debug, trace, warn};

/// TELNET protocol bytes
pub const IAC: u8 = 255;
pub const TELCMD_DONT: u8 = 254;
pub const TELCMD_DO: u8 = 253;
pub const TELCMD_WONT: u8 = 252;
pub const TELCMD_WILL: u8 = 251;
pub const TELCMD_SB: u8 = 250;
pub const TELCMD_GA: u8 = 249;
pub const TELCMD_DM: u8 = 242;
pub const TELCMD_SE: u8 = 240;
pub const TELCMD_EOR: u8 = 239;

/// TELNET option codes
pub const TELOPT_BINARY: u8 = 0;
pub const TELOPT_ECHO: u8 = 1;
pub const TELOPT_SGA: u8 = 3;
pub const TELOPT_EOR: u8 = 19;
pub const TELOPT_TTYPE: u8 = 24;
pub const TELOPT_TN3270E: u8 = 40;

/// TERMINAL-TYPE subnegotiation verbs
pub const TTYPE_IS: u8 = 0;
pub const TTYPE_SEND: u8 = 1;

/// TN3270E subnegotiation operations
pub const TN3270E_OP_ASSOCIATE: u8 = 0;
pub const TN3270E_OP_CONNECT: u8 = 1;
pub const TN3270E_OP_DEVICE_TYPE: u8 = 2;
pub const TN3270E_OP_FUNCTIONS: u8 = 3;
pub const TN3270E_OP_IS: u8 = 4;
pub const TN3270E_OP_REASON: u8 = 5;
pub const TN3270E_OP_REJECT: u8 = 6;
pub const TN3270E_OP_REQUEST: u8 = 7;
pub const TN3270E_OP_SEND: u8 = 8;

/// TN3270E functions this implementation offers
pub const TN3270E_FN_BIND_IMAGE: u8 = 0;
pub const TN3270E_FN_SYSREQ: u8 = 4;

/// TN3270E data header DATA-TYPE values
pub const TN3270E_DT_3270_DATA: u8 = 0x00;
pub const TN3270E_DT_SCS_DATA: u8 = 0x01;
pub const TN3270E_DT_BIND_IMAGE: u8 = 0x03;
pub const TN3270E_DT_UNBIND: u8 = 0x04;
pub const TN3270E_DT_NVT_DATA: u8 = 0x05;
pub const TN3270E_DT_SSCP_LU_DATA: u8 = 0x07;

/// Size of the TN3270E data header
pub const TN3270E_HEADER_LEN: usize = 5;

/// Receiver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Data,
    Iac,
    Will,
    Wont,
    Do,
    Dont,
    Sb,
    SbIac,
}

/// Per-direction option flags, indexed by option code
pub struct NegotiatedOptions {
    my: [bool; 256],
    his: [bool; 256],
}

impl Default for NegotiatedOptions {
    fn default() -> Self {
        NegotiatedOptions {
            my: [false; 256],
            his: [false; 256],
        }
    }
}

impl NegotiatedOptions {
    pub fn my(&self, option: u8) -> bool {
        self.my[option as usize]
    }

    pub fn his(&self, option: u8) -> bool {
        self.his[option as usize]
    }
}

/// Output of feeding received bytes through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete 3270 record, terminated by IAC EOR
    Record(Vec<u8>),
    /// Plain NVT bytes received outside binary mode
    NvtData(Vec<u8>),
    /// Option state changed; the session should re-derive its mode
    ModeMaybeChanged,
}

/// The TELNET layer
pub struct TelnetTransport {
    state: ParserState,
    opts: NegotiatedOptions,
    sb_buf: Vec<u8>,
    record: Vec<u8>,
    outgoing: Vec<u8>,
    terminal_type: String,
    offer_tn3270e: bool,
    device_type_accepted: bool,
    functions_done: bool,
    functions: Vec<u8>,
    syncing: bool,
}

impl TelnetTransport {
    pub fn new(terminal_type: String, offer_tn3270e: bool) -> Self {
        TelnetTransport {
            state: ParserState::Data,
            opts: NegotiatedOptions::default(),
            sb_buf: Vec::new(),
            record: Vec::new(),
            outgoing: Vec::new(),
            terminal_type,
            offer_tn3270e,
            device_type_accepted: false,
            functions_done: false,
            functions: Vec::new(),
            syncing: false,
        }
    }

    pub fn options(&self) -> &NegotiatedOptions {
        &self.opts
    }

    /// True once the terminal type is agreed and all four directional flags
    /// for binary EOR framing are set
    pub fn now3270(&self) -> bool {
        self.opts.my(TELOPT_TTYPE)
            && self.opts.my(TELOPT_BINARY)
            && self.opts.my(TELOPT_EOR)
            && self.opts.his(TELOPT_BINARY)
            && self.opts.his(TELOPT_EOR)
    }

    /// True once TN3270E device type and functions are agreed
    pub fn now_tn3270e(&self) -> bool {
        self.opts.my(TELOPT_TN3270E) && self.functions_done
    }

    /// TN3270E functions in effect after negotiation
    pub fn tn3270e_functions(&self) -> &[u8] {
        &self.functions
    }

    /// Cooked line editing applies while the host is not echoing
    pub fn linemode(&self) -> bool {
        !self.opts.his(TELOPT_ECHO)
    }

    /// True between an urgent notification and the Data Mark that ends it
    pub fn syncing(&self) -> bool {
        self.syncing
    }

    /// Drain queued negotiation bytes for the socket
    pub fn take_outgoing(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outgoing)
    }

    /// Forget all negotiation state, as after a disconnect
    pub fn reset(&mut self) {
        *self = TelnetTransport::new(
            std::mem::take(&mut self.terminal_type),
            self.offer_tn3270e,
        );
    }

    fn my_supported(&self, option: u8) -> bool {
        match option {
            TELOPT_BINARY | TELOPT_EOR | TELOPT_TTYPE | TELOPT_SGA => true,
            TELOPT_TN3270E => self.offer_tn3270e,
            _ => false,
        }
    }

    fn his_supported(&self, option: u8) -> bool {
        match option {
            TELOPT_BINARY | TELOPT_EOR | TELOPT_SGA | TELOPT_ECHO => true,
            TELOPT_TN3270E => self.offer_tn3270e,
            _ => false,
        }
    }

    fn send_cmd(&mut self, cmd: u8, option: u8) {
        self.outgoing.extend_from_slice(&[IAC, cmd, option]);
    }

    /// Process received bytes, returning the resulting events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        let mut nvt = Vec::new();
        for &b in bytes {
            match self.state {
                ParserState::Data => {
                    if b == IAC {
                        self.state = ParserState::Iac;
                    } else if self.now3270() || self.opts.my(TELOPT_TN3270E) {
                        self.record.push(b);
                    } else {
                        nvt.push(b);
                    }
                }
                ParserState::Iac => match b {
                    IAC => {
                        // doubled IAC is a data byte
                        if self.now3270() || self.opts.my(TELOPT_TN3270E) {
                            self.record.push(IAC);
                        } else {
                            nvt.push(IAC);
                        }
                        self.state = ParserState::Data;
                    }
                    TELCMD_EOR => {
                        let rec = std::mem::take(&mut self.record);
                        if !rec.is_empty() {
                            events.push(TransportEvent::Record(rec));
                        }
                        self.state = ParserState::Data;
                    }
                    TELCMD_WILL => self.state = ParserState::Will,
                    TELCMD_WONT => self.state = ParserState::Wont,
                    TELCMD_DO => self.state = ParserState::Do,
                    TELCMD_DONT => self.state = ParserState::Dont,
                    TELCMD_SB => {
                        self.sb_buf.clear();
                        self.state = ParserState::Sb;
                    }
                    TELCMD_DM => {
                        self.syncing = false;
                        self.state = ParserState::Data;
                    }
                    TELCMD_GA => self.state = ParserState::Data,
                    other => {
                        trace!("ignoring telnet command {}", other);
                        self.state = ParserState::Data;
                    }
                },
                ParserState::Will => {
                    self.handle_will(b, &mut events);
                    self.state = ParserState::Data;
                }
                ParserState::Wont => {
                    self.handle_wont(b, &mut events);
                    self.state = ParserState::Data;
                }
                ParserState::Do => {
                    self.handle_do(b, &mut events);
                    self.state = ParserState::Data;
                }
                ParserState::Dont => {
                    self.handle_dont(b, &mut events);
                    self.state = ParserState::Data;
                }
                ParserState::Sb => {
                    if b == IAC {
                        self.state = ParserState::SbIac;
                    } else {
                        self.sb_buf.push(b);
                    }
                }
                ParserState::SbIac => {
                    if b == IAC {
                        // doubled IAC inside subnegotiation
                        self.sb_buf.push(IAC);
                        self.state = ParserState::Sb;
                    } else {
                        if b != TELCMD_SE {
                            warn!("subnegotiation ended by {} instead of SE", b);
                        }
                        let sb = std::mem::take(&mut self.sb_buf);
                        self.handle_subnegotiation(&sb, &mut events);
                        self.state = ParserState::Data;
                    }
                }
            }
        }
        if !nvt.is_empty() {
            events.push(TransportEvent::NvtData(nvt));
        }
        events
    }

    fn handle_will(&mut self, option: u8, events: &mut Vec<TransportEvent>) {
        if self.his_supported(option) {
            if !self.opts.his(option) {
                self.opts.his[option as usize] = true;
                self.send_cmd(TELCMD_DO, option);
                debug!("host WILL {}, accepted", option);
                events.push(TransportEvent::ModeMaybeChanged);
            }
        } else if !self.opts.his(option) {
            self.send_cmd(TELCMD_DONT, option);
        }
    }

    fn handle_wont(&mut self, option: u8, events: &mut Vec<TransportEvent>) {
        if self.opts.his(option) {
            self.opts.his[option as usize] = false;
            self.send_cmd(TELCMD_DONT, option);
            events.push(TransportEvent::ModeMaybeChanged);
        }
    }

    fn handle_do(&mut self, option: u8, events: &mut Vec<TransportEvent>) {
        if self.my_supported(option) {
            if !self.opts.my(option) {
                self.opts.my[option as usize] = true;
                self.send_cmd(TELCMD_WILL, option);
                debug!("host DO {}, accepted", option);
                events.push(TransportEvent::ModeMaybeChanged);
            }
        } else if !self.opts.my(option) {
            self.send_cmd(TELCMD_WONT, option);
        }
    }

    fn handle_dont(&mut self, option: u8, events: &mut Vec<TransportEvent>) {
        if self.opts.my(option) {
            self.opts.my[option as usize] = false;
            self.send_cmd(TELCMD_WONT, option);
            if option == TELOPT_TN3270E {
                self.device_type_accepted = false;
                self.functions_done = false;
                self.functions.clear();
            }
            events.push(TransportEvent::ModeMaybeChanged);
        }
    }

    fn handle_subnegotiation(&mut self, sb: &[u8], events: &mut Vec<TransportEvent>) {
        match sb.split_first() {
            Some((&TELOPT_TTYPE, rest)) => {
                if rest.first() == Some(&TTYPE_SEND) {
                    let mut reply = vec![IAC, TELCMD_SB, TELOPT_TTYPE, TTYPE_IS];
                    reply.extend_from_slice(self.terminal_type.as_bytes());
                    reply.extend_from_slice(&[IAC, TELCMD_SE]);
                    self.outgoing.extend_from_slice(&reply);
                    debug!("terminal type sent: {}", self.terminal_type);
                }
            }
            Some((&TELOPT_TN3270E, rest)) => self.handle_tn3270e_sb(rest, events),
            Some((&option, _)) => trace!("ignoring subnegotiation for option {}", option),
            None => {}
        }
    }

    fn handle_tn3270e_sb(&mut self, sb: &[u8], events: &mut Vec<TransportEvent>) {
        match sb.first() {
            Some(&TN3270E_OP_SEND) if sb.get(1) == Some(&TN3270E_OP_DEVICE_TYPE) => {
                // host asks for our device type
                let mut reply = vec![
                    IAC,
                    TELCMD_SB,
                    TELOPT_TN3270E,
                    TN3270E_OP_DEVICE_TYPE,
                    TN3270E_OP_REQUEST,
                ];
                reply.extend_from_slice(self.terminal_type.as_bytes());
                reply.extend_from_slice(&[IAC, TELCMD_SE]);
                self.outgoing.extend_from_slice(&reply);
            }
            Some(&TN3270E_OP_DEVICE_TYPE) => match sb.get(1) {
                Some(&TN3270E_OP_IS) => {
                    self.device_type_accepted = true;
                    debug!("TN3270E device type accepted");
                    // ask for our function set
                    let mut reply = vec![
                        IAC,
                        TELCMD_SB,
                        TELOPT_TN3270E,
                        TN3270E_OP_FUNCTIONS,
                        TN3270E_OP_REQUEST,
                        TN3270E_FN_BIND_IMAGE,
                        TN3270E_FN_SYSREQ,
                    ];
                    reply.extend_from_slice(&[IAC, TELCMD_SE]);
                    self.outgoing.extend_from_slice(&reply);
                }
                Some(&TN3270E_OP_REJECT) => {
                    warn!("TN3270E device type rejected, dropping the option");
                    self.send_cmd(TELCMD_WONT, TELOPT_TN3270E);
                    self.opts.my[TELOPT_TN3270E as usize] = false;
                    events.push(TransportEvent::ModeMaybeChanged);
                }
                _ => {}
            },
            Some(&TN3270E_OP_FUNCTIONS) => match sb.get(1) {
                Some(&TN3270E_OP_IS) => {
                    self.functions = sb[2..].to_vec();
                    self.functions_done = true;
                    debug!("TN3270E functions agreed: {:?}", self.functions);
                    events.push(TransportEvent::ModeMaybeChanged);
                }
                Some(&TN3270E_OP_REQUEST) => {
                    let offered = [TN3270E_FN_BIND_IMAGE, TN3270E_FN_SYSREQ];
                    let requested = &sb[2..];
                    let common: Vec<u8> = requested
                        .iter()
                        .copied()
                        .filter(|f| offered.contains(f))
                        .collect();
                    if common.len() == requested.len() {
                        // full agreement: confirm with IS
                        let mut reply = vec![
                            IAC,
                            TELCMD_SB,
                            TELOPT_TN3270E,
                            TN3270E_OP_FUNCTIONS,
                            TN3270E_OP_IS,
                        ];
                        reply.extend_from_slice(&common);
                        reply.extend_from_slice(&[IAC, TELCMD_SE]);
                        self.outgoing.extend_from_slice(&reply);
                        self.functions = common;
                        self.functions_done = true;
                        events.push(TransportEvent::ModeMaybeChanged);
                    } else {
                        let mut reply = vec![
                            IAC,
                            TELCMD_SB,
                            TELOPT_TN3270E,
                            TN3270E_OP_FUNCTIONS,
                            TN3270E_OP_REQUEST,
                        ];
                        reply.extend_from_slice(&common);
                        reply.extend_from_slice(&[IAC, TELCMD_SE]);
                        self.outgoing.extend_from_slice(&reply);
                    }
                }
                _ => {}
            },
            _ => trace!("unhandled TN3270E subnegotiation {:?}", sb),
        }
    }

    /// Frame an inbound 3270 record: IAC doubling plus IAC EOR
    pub fn frame_record(&self, record: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(record.len() + 2);
        for &b in record {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.extend_from_slice(&[IAC, TELCMD_EOR]);
        out
    }
}

/// Outcome of one key fed to the cooked-mode line editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Nothing to transmit yet
    Pending,
    /// A completed line, without its terminator
    Line(Vec<u8>),
    /// End-of-file signalled on an empty line
    Eof,
}

/// NVT cooked-mode line editing
///
/// Applies the classic local editing keys while the host leaves echoing to
/// us: erase character, erase word, kill line, reprint, literal-next, EOF.
#[derive(Debug, Default)]
pub struct LineEditor {
    buf: Vec<u8>,
    literal_next: bool,
}

impl LineEditor {
    pub fn new() -> Self {
        LineEditor::default()
    }

    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Feed one typed byte; `Line` carries the completed input
    pub fn feed(&mut self, byte: u8) -> LineEvent {
        if self.literal_next {
            self.literal_next = false;
            self.buf.push(byte);
            return LineEvent::Pending;
        }
        match byte {
            b'\r' | b'\n' => LineEvent::Line(std::mem::take(&mut self.buf)),
            0x7F | 0x08 => {
                self.buf.pop();
                LineEvent::Pending
            }
            0x17 => {
                // ^W: erase back to the previous word boundary
                while self.buf.last() == Some(&b' ') {
                    self.buf.pop();
                }
                while matches!(self.buf.last(), Some(&c) if c != b' ') {
                    self.buf.pop();
                }
                LineEvent::Pending
            }
            0x15 => {
                // ^U: kill the whole line
                self.buf.clear();
                LineEvent::Pending
            }
            0x12 => LineEvent::Pending, // ^R: reprint is a display concern
            0x16 => {
                // ^V: take the next byte literally
                self.literal_next = true;
                LineEvent::Pending
            }
            0x04 => {
                // ^D: EOF on an empty line, otherwise flush what we have
                if self.buf.is_empty() {
                    LineEvent::Eof
                } else {
                    LineEvent::Line(std::mem::take(&mut self.buf))
                }
            }
            other => {
                self.buf.push(other);
                LineEvent::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiate_3270(t: &mut TelnetTransport) {
        t.feed(&[
            IAC, TELCMD_DO, TELOPT_TTYPE,
            IAC, TELCMD_DO, TELOPT_EOR,
            IAC, TELCMD_DO, TELOPT_BINARY,
            IAC, TELCMD_WILL, TELOPT_EOR,
            IAC, TELCMD_WILL, TELOPT_BINARY,
        ]);
    }

    #[test]
    fn test_do_yields_will_once() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        t.feed(&[IAC, TELCMD_DO, TELOPT_BINARY]);
        assert_eq!(t.take_outgoing(), vec![IAC, TELCMD_WILL, TELOPT_BINARY]);
        // repeat produces no further reply
        t.feed(&[IAC, TELCMD_DO, TELOPT_BINARY]);
        assert!(t.take_outgoing().is_empty());
    }

    #[test]
    fn test_unsupported_option_refused() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        t.feed(&[IAC, TELCMD_DO, 31]); // NAWS
        assert_eq!(t.take_outgoing(), vec![IAC, TELCMD_WONT, 31]);
        t.feed(&[IAC, TELCMD_WILL, 31]);
        assert_eq!(t.take_outgoing(), vec![IAC, TELCMD_DONT, 31]);
    }

    #[test]
    fn test_full_negotiation_reaches_3270() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        assert!(!t.now3270());
        negotiate_3270(&mut t);
        assert!(t.now3270());
    }

    #[test]
    fn test_partial_negotiation_is_not_3270() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        t.feed(&[
            IAC, TELCMD_DO, TELOPT_TTYPE,
            IAC, TELCMD_DO, TELOPT_BINARY,
            IAC, TELCMD_DO, TELOPT_EOR,
            IAC, TELCMD_WILL, TELOPT_BINARY,
        ]);
        assert!(!t.now3270());
        t.feed(&[IAC, TELCMD_WILL, TELOPT_EOR]);
        assert!(t.now3270());
    }

    #[test]
    fn test_binary_eor_without_ttype_is_not_3270() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        t.feed(&[
            IAC, TELCMD_DO, TELOPT_BINARY,
            IAC, TELCMD_DO, TELOPT_EOR,
            IAC, TELCMD_WILL, TELOPT_BINARY,
            IAC, TELCMD_WILL, TELOPT_EOR,
        ]);
        assert!(!t.now3270());
        t.feed(&[IAC, TELCMD_DO, TELOPT_TTYPE]);
        assert!(t.now3270());
    }

    #[test]
    fn test_ttype_send_answers_is() {
        let mut t = TelnetTransport::new("IBM-3279-4-E".into(), false);
        t.feed(&[IAC, TELCMD_DO, TELOPT_TTYPE]);
        t.take_outgoing();
        t.feed(&[IAC, TELCMD_SB, TELOPT_TTYPE, TTYPE_SEND, IAC, TELCMD_SE]);
        let mut expected = vec![IAC, TELCMD_SB, TELOPT_TTYPE, TTYPE_IS];
        expected.extend_from_slice(b"IBM-3279-4-E");
        expected.extend_from_slice(&[IAC, TELCMD_SE]);
        assert_eq!(t.take_outgoing(), expected);
    }

    #[test]
    fn test_record_framing_and_iac_doubling() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        negotiate_3270(&mut t);
        let events = t.feed(&[0x01, IAC, IAC, 0x02, IAC, TELCMD_EOR]);
        let records: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Record(r) => Some(r.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(records, vec![vec![0x01, IAC, 0x02]]);
    }

    #[test]
    fn test_record_split_across_feeds() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        negotiate_3270(&mut t);
        assert!(t
            .feed(&[0x05, 0xC3])
            .iter()
            .all(|e| !matches!(e, TransportEvent::Record(_))));
        let events = t.feed(&[0xC1, IAC, TELCMD_EOR]);
        assert!(events.contains(&TransportEvent::Record(vec![0x05, 0xC3, 0xC1])));
    }

    #[test]
    fn test_nvt_data_before_binary() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        let events = t.feed(b"login: ");
        assert_eq!(events, vec![TransportEvent::NvtData(b"login: ".to_vec())]);
    }

    #[test]
    fn test_linemode_follows_echo() {
        let mut t = TelnetTransport::new("IBM-3278-2".into(), false);
        assert!(t.linemode());
        t.feed(&[IAC, TELCMD_WILL, TELOPT_ECHO]);
        assert!(!t.linemode());
        t.feed(&[IAC, TELCMD_WONT, TELOPT_ECHO]);
        assert!(t.linemode());
    }

    #[test]
    fn test_frame_record_doubles_iac() {
        let t = TelnetTransport::new("IBM-3278-2".into(), false);
        assert_eq!(
            t.frame_record(&[0x7D, IAC, 0x40]),
            vec![0x7D, IAC, IAC, 0x40, IAC, TELCMD_EOR]
        );
    }

    #[test]
    fn test_tn3270e_device_type_and_functions() {
        let mut t = TelnetTransport::new("IBM-3278-2-E".into(), true);
        t.feed(&[IAC, TELCMD_DO, TELOPT_TN3270E]);
        t.take_outgoing();
        // host asks for the device type
        t.feed(&[
            IAC, TELCMD_SB, TELOPT_TN3270E,
            TN3270E_OP_SEND, TN3270E_OP_DEVICE_TYPE,
            IAC, TELCMD_SE,
        ]);
        let out = t.take_outgoing();
        assert_eq!(out[3], TN3270E_OP_DEVICE_TYPE);
        assert_eq!(out[4], TN3270E_OP_REQUEST);
        // host accepts, we request functions
        t.feed(&[
            IAC, TELCMD_SB, TELOPT_TN3270E,
            TN3270E_OP_DEVICE_TYPE, TN3270E_OP_IS,
            IAC, TELCMD_SE,
        ]);
        let out = t.take_outgoing();
        assert_eq!(out[3], TN3270E_OP_FUNCTIONS);
        assert!(!t.now_tn3270e());
        // host agrees to the functions
        t.feed(&[
            IAC, TELCMD_SB, TELOPT_TN3270E,
            TN3270E_OP_FUNCTIONS, TN3270E_OP_IS,
            TN3270E_FN_BIND_IMAGE, TN3270E_FN_SYSREQ,
            IAC, TELCMD_SE,
        ]);
        assert!(t.now_tn3270e());
        assert_eq!(t.tn3270e_functions(), &[TN3270E_FN_BIND_IMAGE, TN3270E_FN_SYSREQ]);
    }

    #[test]
    fn test_tn3270e_function_subset_counteroffer() {
        let mut t = TelnetTransport::new("IBM-3278-2-E".into(), true);
        t.feed(&[IAC, TELCMD_DO, TELOPT_TN3270E]);
        t.take_outgoing();
        // host requests a function we do not offer
        t.feed(&[
            IAC, TELCMD_SB, TELOPT_TN3270E,
            TN3270E_OP_FUNCTIONS, TN3270E_OP_REQUEST,
            TN3270E_FN_BIND_IMAGE, 2,
            IAC, TELCMD_SE,
        ]);
        let out = t.take_outgoing();
        assert_eq!(out[4], TN3270E_OP_REQUEST);
        assert_eq!(&out[5..out.len() - 2], &[TN3270E_FN_BIND_IMAGE]);
        assert!(!t.now_tn3270e());
    }

    #[test]
    fn test_line_editor_basic_editing() {
        let mut ed = LineEditor::new();
        for &b in b"helpp" {
            assert_eq!(ed.feed(b), LineEvent::Pending);
        }
        ed.feed(0x7F); // erase the doubled p
        assert_eq!(ed.feed(b'\r'), LineEvent::Line(b"help".to_vec()));
    }

    #[test]
    fn test_line_editor_word_and_line_kill() {
        let mut ed = LineEditor::new();
        for &b in b"rm -rf tmp" {
            ed.feed(b);
        }
        ed.feed(0x17); // ^W
        assert_eq!(ed.pending(), b"rm -rf ");
        ed.feed(0x15); // ^U
        assert_eq!(ed.pending(), b"");
    }

    #[test]
    fn test_line_editor_literal_next_and_eof() {
        let mut ed = LineEditor::new();
        ed.feed(0x16); // ^V
        ed.feed(0x7F); // taken literally
        assert_eq!(ed.pending(), &[0x7F]);
        assert_eq!(ed.feed(b'\n'), LineEvent::Line(vec![0x7F]));
        assert_eq!(ed.feed(0x04), LineEvent::Eof);
    }
}
