//! 3270 data stream codec
//!
//! Interprets outbound (host to terminal) records against a `ScreenBuffer`
//! and builds the inbound replies: Read Buffer, Read Modified, Read Modified
//! All, and operator AID submissions. Structured-field records are handed to
//! the `StructuredFieldProcessor`; it calls back in here for Outbound-DS.

use log::{debug, trace, warn};

use crate::codes::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::screen::{addressing, ScreenBuffer};
use crate::structured_field::StructuredFieldProcessor;

/// Attribute detail carried by inbound replies, set by Set Reply Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Field attributes as bare SF bytes
    Field,
    /// Field attributes as SFE groups
    ExtendedField,
    /// SFE groups plus SA interleave on character attribute changes
    Character,
}

/// Outcome of processing one outbound record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Screen updated, nothing to transmit
    None,
    /// An inbound record to send to the host
    Reply(Vec<u8>),
}

/// Map a highlighting attribute value to graphic rendition bits
fn gr_from_xah(value: u8) -> u8 {
    match value {
        XAH_BLINK => GR_BLINK,
        XAH_REVERSE => GR_REVERSE,
        XAH_UNDERSCORE => GR_UNDERLINE,
        XAH_INTENSIFY => GR_INTENSIFY,
        _ => 0,
    }
}

/// Map graphic rendition bits back to a highlighting attribute value
fn xah_from_gr(gr: u8) -> u8 {
    if gr & GR_BLINK != 0 {
        XAH_BLINK
    } else if gr & GR_REVERSE != 0 {
        XAH_REVERSE
    } else if gr & GR_UNDERLINE != 0 {
        XAH_UNDERSCORE
    } else if gr & GR_INTENSIFY != 0 {
        XAH_INTENSIFY
    } else {
        XAH_DEFAULT
    }
}

/// The data stream interpreter
///
/// Holds the per-session state that survives between records: the reply
/// mode, the running character attributes set by SA, and the AID to report
/// on host-initiated reads.
pub struct DataStreamCodec {
    reply_mode: ReplyMode,
    reply_attrs: Vec<u8>,
    default_fg: u8,
    default_gr: u8,
    default_cs: u8,
    aid: AidKey,
    print_pending: bool,
}

impl Default for DataStreamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStreamCodec {
    pub fn new() -> Self {
        DataStreamCodec {
            reply_mode: ReplyMode::Field,
            reply_attrs: Vec::new(),
            default_fg: 0,
            default_gr: 0,
            default_cs: CS_BASE,
            aid: AidKey::NoAid,
            print_pending: false,
        }
    }

    /// Read and clear the WCC start-print request
    pub fn take_print_pending(&mut self) -> bool {
        std::mem::replace(&mut self.print_pending, false)
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.reply_mode
    }

    /// Install a reply mode; character mode carries up to 16 attribute types
    pub fn set_reply_mode(&mut self, mode: ReplyMode, attrs: &[u8]) {
        self.reply_mode = mode;
        self.reply_attrs.clear();
        if mode == ReplyMode::Character {
            self.reply_attrs.extend(attrs.iter().take(16));
        }
    }

    /// Process one outbound record
    pub fn process(
        &mut self,
        record: &[u8],
        screen: &mut ScreenBuffer,
        sf: &mut StructuredFieldProcessor,
    ) -> ProtocolResult<Effect> {
        let (&cmd, rest) = match record.split_first() {
            Some(split) => split,
            None => return Ok(Effect::None),
        };
        let command = CommandCode::from_u8(cmd)
            .ok_or(ProtocolError::BadCommand { code: cmd })?;
        trace!("outbound record: {:?}, {} body bytes", command, rest.len());
        match command {
            CommandCode::Write => {
                self.process_write(rest, screen, None)?;
                Ok(Effect::None)
            }
            CommandCode::EraseWrite => {
                self.process_write(rest, screen, Some(false))?;
                Ok(Effect::None)
            }
            CommandCode::EraseWriteAlternate => {
                self.process_write(rest, screen, Some(true))?;
                Ok(Effect::None)
            }
            CommandCode::EraseAllUnprotected => {
                self.erase_all_unprotected(screen);
                Ok(Effect::None)
            }
            CommandCode::ReadBuffer => Ok(Effect::Reply(self.build_read_buffer(screen))),
            CommandCode::ReadModified => {
                Ok(Effect::Reply(self.build_read_modified(screen, self.aid, false)))
            }
            CommandCode::ReadModifiedAll => {
                Ok(Effect::Reply(self.build_read_modified(screen, self.aid, true)))
            }
            CommandCode::WriteStructuredField => sf.process_wsf(self, screen, rest),
            CommandCode::Nop => Ok(Effect::None),
        }
    }

    /// Re-dispatch the payload of an Outbound-DS structured field; only the
    /// write family is legal here
    pub fn process_outbound_ds(
        &mut self,
        data: &[u8],
        screen: &mut ScreenBuffer,
    ) -> ProtocolResult<()> {
        let (&cmd, rest) = match data.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        match CommandCode::from_u8(cmd) {
            Some(CommandCode::Write) => self.process_write(rest, screen, None),
            Some(CommandCode::EraseWrite) => self.process_write(rest, screen, Some(false)),
            Some(CommandCode::EraseWriteAlternate) => {
                self.process_write(rest, screen, Some(true))
            }
            Some(CommandCode::EraseAllUnprotected) => {
                self.erase_all_unprotected(screen);
                Ok(())
            }
            _ => Err(ProtocolError::BadCommand { code: cmd }),
        }
    }

    /// WCC byte handling, shared by the write family
    fn apply_wcc(&mut self, wcc: u8, screen: &mut ScreenBuffer) {
        if wcc & WCC_RESET != 0 {
            self.set_reply_mode(ReplyMode::Field, &[]);
        }
        if wcc & WCC_START_PRINT != 0 {
            debug!("WCC requests start-print");
            self.print_pending = true;
        }
        if wcc & WCC_ALARM != 0 {
            screen.set_alarm(true);
        }
        if wcc & WCC_RESTORE != 0 {
            screen.set_keyboard_locked(false);
            self.aid = AidKey::NoAid;
        }
        if wcc & WCC_RESET_MDT != 0 {
            screen.reset_all_mdt();
        }
    }

    /// Write a data byte at the current address, tagging the governing
    /// unprotected field as modified
    fn write_char(&mut self, screen: &mut ScreenBuffer, code: u8, cs: u8) {
        let addr = screen.buffer_addr();
        screen.write_data(code, self.default_fg, self.default_gr, cs);
        if screen.is_formatted() && !screen.field_attribute_at(addr).is_protected() {
            screen.set_mdt(addr);
        }
    }

    fn need(buf: &[u8], pos: usize, n: usize, order: u8) -> ProtocolResult<()> {
        if pos + n > buf.len() {
            Err(ProtocolError::Truncated {
                order,
                needed: n,
                remaining: buf.len() - pos,
            })
        } else {
            Ok(())
        }
    }

    /// Interpret a Write body: WCC byte followed by orders and data
    fn process_write(
        &mut self,
        body: &[u8],
        screen: &mut ScreenBuffer,
        erase: Option<bool>,
    ) -> ProtocolResult<()> {
        if let Some(alternate) = erase {
            screen.erase(alternate);
        }
        let (&wcc, data) = match body.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        self.apply_wcc(wcc, screen);

        let mut pos = 0;
        // command and WCC count as orders for PT null-fill purposes
        let mut last_was_order = true;
        while pos < data.len() {
            let b = data[pos];
            match OrderCode::from_u8(b) {
                Some(OrderCode::SetBufferAddress) => {
                    Self::need(data, pos + 1, 2, b)?;
                    let target = addressing::decode_buffer_address(data[pos + 1], data[pos + 2]);
                    pos += 3;
                    if target as usize >= screen.size() {
                        // abandon the rest of the record, keep prior writes
                        return Err(ProtocolError::BadAddress {
                            address: target,
                            buffer_size: screen.size(),
                        });
                    }
                    if !screen.is_formatted() && target < screen.buffer_addr() {
                        // backward move on an unformatted screen continues the
                        // same logical line; the wrapped gap is blanked
                        let mut a = screen.buffer_addr();
                        while a != target {
                            screen.set_buffer_addr(a);
                            screen.write_data(0x40, self.default_fg, self.default_gr, self.default_cs);
                            a = screen.buffer_addr();
                        }
                    }
                    screen.set_buffer_addr(target);
                    last_was_order = true;
                }
                Some(OrderCode::StartField) => {
                    Self::need(data, pos + 1, 1, b)?;
                    screen.start_field(data[pos + 1]);
                    pos += 2;
                    last_was_order = true;
                }
                Some(OrderCode::StartFieldExtended) => {
                    Self::need(data, pos + 1, 1, b)?;
                    let count = data[pos + 1] as usize;
                    Self::need(data, pos + 2, count * 2, b)?;
                    let mut attr = 0u8;
                    let mut fg = 0u8;
                    let mut gr = 0u8;
                    let mut cs = 0u8;
                    for i in 0..count {
                        let t = data[pos + 2 + i * 2];
                        let v = data[pos + 3 + i * 2];
                        match t {
                            XA_3270 => attr = v,
                            XA_FOREGROUND => fg = v,
                            XA_HIGHLIGHTING => gr = gr_from_xah(v),
                            XA_CHARSET => cs = v,
                            _ => trace!("SFE attribute type 0x{:02X} ignored", t),
                        }
                    }
                    let addr = screen.buffer_addr();
                    screen.start_field(attr);
                    let cell = screen.cell_mut(addr);
                    cell.fg = fg;
                    cell.gr = gr;
                    cell.cs = cs;
                    pos += 2 + count * 2;
                    last_was_order = true;
                }
                Some(OrderCode::SetAttribute) => {
                    Self::need(data, pos + 1, 2, b)?;
                    let t = data[pos + 1];
                    let v = data[pos + 2];
                    match t {
                        XA_ALL => {
                            self.default_fg = 0;
                            self.default_gr = 0;
                            self.default_cs = CS_BASE;
                        }
                        XA_FOREGROUND => self.default_fg = v,
                        XA_HIGHLIGHTING => self.default_gr = gr_from_xah(v),
                        XA_CHARSET => self.default_cs = v,
                        _ => trace!("SA attribute type 0x{:02X} ignored", t),
                    }
                    pos += 3;
                    last_was_order = true;
                }
                Some(OrderCode::ModifyField) => {
                    Self::need(data, pos + 1, 1, b)?;
                    let count = data[pos + 1] as usize;
                    Self::need(data, pos + 2, count * 2, b)?;
                    let addr = screen.buffer_addr();
                    if screen.cell(addr).is_field_attr {
                        for i in 0..count {
                            let t = data[pos + 2 + i * 2];
                            let v = data[pos + 3 + i * 2];
                            let cell = screen.cell_mut(addr);
                            match t {
                                XA_3270 => cell.code = v,
                                XA_FOREGROUND => cell.fg = v,
                                XA_HIGHLIGHTING => cell.gr = gr_from_xah(v),
                                XA_CHARSET => cell.cs = v,
                                _ => trace!("MF attribute type 0x{:02X} ignored", t),
                            }
                        }
                    } else {
                        warn!("MF at {} which holds no field attribute", addr);
                    }
                    pos += 2 + count * 2;
                    last_was_order = true;
                }
                Some(OrderCode::InsertCursor) => {
                    screen.set_cursor_addr(screen.buffer_addr());
                    pos += 1;
                    last_was_order = true;
                }
                Some(OrderCode::ProgramTab) => {
                    pos += 1;
                    if !last_was_order {
                        // PT after data null-fills the remainder of the field
                        loop {
                            let addr = screen.buffer_addr();
                            if screen.cell(addr).is_field_attr || addr == 0 {
                                break;
                            }
                            screen.write_data(FCORDER_NULL, 0, 0, 0);
                            if screen.buffer_addr() == 0 {
                                break;
                            }
                        }
                    }
                    let next = screen.next_unprotected(screen.buffer_addr());
                    screen.set_buffer_addr(next);
                    last_was_order = true;
                }
                Some(OrderCode::RepeatToAddress) => {
                    Self::need(data, pos + 1, 2, b)?;
                    let target = addressing::decode_buffer_address(data[pos + 1], data[pos + 2]);
                    pos += 3;
                    if target as usize >= screen.size() {
                        return Err(ProtocolError::BadAddress {
                            address: target,
                            buffer_size: screen.size(),
                        });
                    }
                    let mut cs = self.default_cs;
                    Self::need(data, pos, 1, b)?;
                    let mut ch = data[pos];
                    pos += 1;
                    if ch == ORDER_GE {
                        Self::need(data, pos, 1, b)?;
                        ch = data[pos];
                        pos += 1;
                        cs = CS_APL;
                    }
                    // equal target fills the entire buffer; a backward
                    // target wraps through the buffer top
                    loop {
                        self.write_char(screen, ch, cs);
                        if screen.buffer_addr() == target {
                            break;
                        }
                    }
                    last_was_order = true;
                }
                Some(OrderCode::EraseUnprotectedToAddress) => {
                    Self::need(data, pos + 1, 2, b)?;
                    let target = addressing::decode_buffer_address(data[pos + 1], data[pos + 2]);
                    pos += 3;
                    if target as usize >= screen.size() {
                        return Err(ProtocolError::BadAddress {
                            address: target,
                            buffer_size: screen.size(),
                        });
                    }
                    loop {
                        let addr = screen.buffer_addr();
                        if !screen.cell(addr).is_field_attr
                            && !screen.field_attribute_at(addr).is_protected()
                        {
                            screen.cell_mut(addr).code = FCORDER_NULL;
                        }
                        screen.set_buffer_addr(screen.inc_addr(addr));
                        if screen.buffer_addr() == target {
                            break;
                        }
                    }
                    last_was_order = true;
                }
                Some(OrderCode::GraphicEscape) => {
                    Self::need(data, pos + 1, 1, b)?;
                    self.write_char(screen, data[pos + 1], CS_APL);
                    pos += 2;
                    last_was_order = false;
                }
                None => {
                    if b >= 0x40 || is_format_control(b) {
                        // format controls are stored as data
                        self.write_char(screen, b, self.default_cs);
                    } else {
                        // unknown control bytes become nulls
                        self.write_char(screen, FCORDER_NULL, self.default_cs);
                    }
                    pos += 1;
                    last_was_order = false;
                }
            }
        }
        Ok(())
    }

    /// Erase All Unprotected: clear unprotected data, reset their MDT,
    /// unlock the keyboard and home the cursor to the first input field
    fn erase_all_unprotected(&mut self, screen: &mut ScreenBuffer) {
        if screen.is_formatted() {
            for addr in 0..screen.size() as u16 {
                let cell = *screen.cell(addr);
                if cell.is_field_attr {
                    continue;
                }
                if !screen.field_attribute_at(addr).is_protected() {
                    screen.cell_mut(addr).code = FCORDER_NULL;
                }
            }
            for addr in 0..screen.size() as u16 {
                let cell = *screen.cell(addr);
                if cell.is_field_attr {
                    let attr = crate::field::FieldAttribute(cell.code);
                    if !attr.is_protected() {
                        screen.cell_mut(addr).code = attr.without_mdt().0;
                    }
                }
            }
            let home = screen.next_unprotected(0);
            screen.set_cursor_addr(home);
        } else {
            screen.erase(false);
        }
        screen.set_keyboard_locked(false);
        self.aid = AidKey::NoAid;
    }

    /// Emit the attribute marker for a field attribute cell per reply mode
    fn emit_field_attr(&self, out: &mut Vec<u8>, cell: &crate::screen::Cell) {
        match self.reply_mode {
            ReplyMode::Field => {
                out.push(ORDER_SF);
                out.push(cell.code);
            }
            ReplyMode::ExtendedField | ReplyMode::Character => {
                let mut pairs: Vec<(u8, u8)> = vec![(XA_3270, cell.code)];
                if cell.fg != 0 {
                    pairs.push((XA_FOREGROUND, cell.fg));
                }
                if cell.gr != 0 {
                    pairs.push((XA_HIGHLIGHTING, xah_from_gr(cell.gr)));
                }
                if cell.cs != 0 {
                    pairs.push((XA_CHARSET, cell.cs));
                }
                out.push(ORDER_SFE);
                out.push(pairs.len() as u8);
                for (t, v) in pairs {
                    out.push(t);
                    out.push(v);
                }
            }
        }
    }

    /// Emit SA orders for attribute transitions in Character reply mode
    fn emit_sa_transition(
        &self,
        out: &mut Vec<u8>,
        current: &mut (u8, u8, u8),
        cell: &crate::screen::Cell,
    ) {
        if self.reply_mode != ReplyMode::Character {
            return;
        }
        if self.reply_attrs.contains(&XA_FOREGROUND) && current.0 != cell.fg {
            out.extend_from_slice(&[ORDER_SA, XA_FOREGROUND, cell.fg]);
            current.0 = cell.fg;
        }
        if self.reply_attrs.contains(&XA_HIGHLIGHTING) && current.1 != cell.gr {
            out.extend_from_slice(&[ORDER_SA, XA_HIGHLIGHTING, xah_from_gr(cell.gr)]);
            current.1 = cell.gr;
        }
        if self.reply_attrs.contains(&XA_CHARSET) && current.2 != cell.cs {
            out.extend_from_slice(&[ORDER_SA, XA_CHARSET, cell.cs]);
            current.2 = cell.cs;
        }
    }

    /// Build the Read Buffer reply: AID, cursor, the full buffer image
    pub fn build_read_buffer(&self, screen: &ScreenBuffer) -> Vec<u8> {
        let mut out = Vec::with_capacity(screen.size() + 3);
        out.push(self.aid.to_u8());
        out.extend_from_slice(&addressing::encode_buffer_address(
            screen.cursor_addr(),
            screen.size(),
        ));
        let mut current = (0u8, 0u8, 0u8);
        for addr in 0..screen.size() as u16 {
            let cell = screen.cell(addr);
            if cell.is_field_attr {
                self.emit_field_attr(&mut out, cell);
            } else {
                self.emit_sa_transition(&mut out, &mut current, cell);
                out.push(cell.code);
            }
        }
        out
    }

    /// Build the Read Modified reply for the given AID
    ///
    /// `all` suppresses the short-read convention, per Read Modified All.
    pub fn build_read_modified(&self, screen: &ScreenBuffer, aid: AidKey, all: bool) -> Vec<u8> {
        if !all && aid == AidKey::SysReq {
            // fixed attention sequence: SOH % / STX
            return vec![0x01, 0x5B, 0x61, 0x02];
        }
        if !all && aid.is_short_read() {
            return vec![aid.to_u8()];
        }
        let mut out = Vec::new();
        out.push(aid.to_u8());
        out.extend_from_slice(&addressing::encode_buffer_address(
            screen.cursor_addr(),
            screen.size(),
        ));
        if screen.is_formatted() {
            let size = screen.size() as u16;
            for addr in 0..size {
                let cell = screen.cell(addr);
                if !cell.is_field_attr {
                    continue;
                }
                if !crate::field::FieldAttribute(cell.code).is_modified() {
                    continue;
                }
                let start = screen.inc_addr(addr);
                out.push(ORDER_SBA);
                out.extend_from_slice(&addressing::encode_buffer_address(
                    start,
                    screen.size(),
                ));
                let mut current = (0u8, 0u8, 0u8);
                let mut a = start;
                while !screen.cell(a).is_field_attr {
                    let c = screen.cell(a);
                    if c.code != FCORDER_NULL {
                        let c = *c;
                        self.emit_sa_transition(&mut out, &mut current, &c);
                        out.push(c.code);
                    }
                    a = screen.inc_addr(a);
                    if a == start {
                        break;
                    }
                }
            }
        } else {
            for addr in 0..screen.size() as u16 {
                let cell = screen.cell(addr);
                if cell.code != FCORDER_NULL {
                    out.push(cell.code);
                }
            }
        }
        out
    }

    /// Operator attention: record the AID, lock the keyboard, and build the
    /// inbound record
    pub fn submit_aid(&mut self, screen: &mut ScreenBuffer, aid: AidKey) -> Vec<u8> {
        self.aid = aid;
        screen.set_keyboard_locked(true);
        self.build_read_modified(screen, aid, false)
    }
}
