//! 3270 screen buffer
//!
//! The terminal-side character buffer the data stream writes into: a flat
//! array of cells addressed modulo rows*cols, with field attribute bytes
//! occupying buffer positions. Also hosts the 12-bit and 14-bit buffer
//! address codecs used by SBA, RA, EUA and the read replies.

use std::fmt;

use crate::codes::FCORDER_NULL;
use crate::ebcdic::ebcdic_to_display;
use crate::field::FieldAttribute;

/// Buffer address wire codecs
pub mod addressing {
    /// 12-bit address code table: six address bits to wire byte
    const CODE_TABLE: [u8; 64] = [
        0x40, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
        0xC8, 0xC9, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
        0x50, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7,
        0xD8, 0xD9, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
        0x60, 0x61, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
        0xE8, 0xE9, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
        0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
        0xF8, 0xF9, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
    ];

    /// Encode six address bits as a coded address byte
    pub fn encode_address_byte(bits: u8) -> u8 {
        CODE_TABLE[(bits & 0x3F) as usize]
    }

    /// Recover six address bits from a coded address byte
    pub fn decode_address_byte(byte: u8) -> u8 {
        byte & 0x3F
    }

    /// Encode a buffer address in the 12-bit coded form
    pub fn encode_12bit_address(address: u16) -> [u8; 2] {
        [
            encode_address_byte((address >> 6) as u8),
            encode_address_byte(address as u8),
        ]
    }

    /// Decode a 12-bit coded address pair
    pub fn decode_12bit_address(b1: u8, b2: u8) -> u16 {
        ((decode_address_byte(b1) as u16) << 6) | decode_address_byte(b2) as u16
    }

    /// Encode a buffer address in the 14-bit binary form
    pub fn encode_14bit_address(address: u16) -> [u8; 2] {
        [((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8]
    }

    /// Decode a 14-bit binary address pair
    pub fn decode_14bit_address(b1: u8, b2: u8) -> u16 {
        ((b1 as u16 & 0x3F) << 8) | b2 as u16
    }

    /// Decode either wire form: the top two bits of the first byte are zero
    /// only in the 14-bit binary form
    pub fn decode_buffer_address(b1: u8, b2: u8) -> u16 {
        if b1 & 0xC0 == 0 {
            decode_14bit_address(b1, b2)
        } else {
            decode_12bit_address(b1, b2)
        }
    }

    /// Encode an address for the wire: 12-bit coded whenever the buffer fits
    /// in 12 bits, 14-bit binary for the large models
    pub fn encode_buffer_address(address: u16, buffer_size: usize) -> [u8; 2] {
        if buffer_size <= 0x1000 {
            encode_12bit_address(address)
        } else {
            encode_14bit_address(address)
        }
    }
}

/// Buffer address in `[0, rows*cols)`, wrapping on increment and decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAddress(pub u16);

impl BufferAddress {
    pub fn inc(self, buffer_size: usize) -> Self {
        BufferAddress(((self.0 as usize + 1) % buffer_size) as u16)
    }

    pub fn dec(self, buffer_size: usize) -> Self {
        BufferAddress(((self.0 as usize + buffer_size - 1) % buffer_size) as u16)
    }
}

/// One screen position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// EBCDIC code point, or the raw attribute byte when `is_field_attr`
    pub code: u8,
    /// Foreground color (XAC_* value, 0 = default)
    pub fg: u8,
    /// Background color
    pub bg: u8,
    /// Graphic rendition bitset (GR_* bits)
    pub gr: u8,
    /// Character set index (CS_* value)
    pub cs: u8,
    /// True when this position holds a field attribute byte
    pub is_field_attr: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            code: FCORDER_NULL,
            fg: 0,
            bg: 0,
            gr: 0,
            cs: 0,
            is_field_attr: false,
        }
    }
}

/// The 3270 character buffer
///
/// Holds the default 24x80 screen or the configured alternate size; Erase
/// Write and Erase Write Alternate switch between the two. The codec's
/// buffer address and the visible cursor are tracked separately.
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    alt_rows: usize,
    alt_cols: usize,
    cells: Vec<Cell>,
    buffer_addr: u16,
    cursor_addr: u16,
    keyboard_locked: bool,
    alarm: bool,
    dirty: bool,
    notify: Option<Box<dyn FnMut() + Send>>,
}

pub const DEFAULT_ROWS: usize = 24;
pub const DEFAULT_COLS: usize = 80;

impl ScreenBuffer {
    /// Create a buffer at the default size with the given alternate size
    pub fn new(alt_rows: usize, alt_cols: usize) -> Self {
        ScreenBuffer {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            alt_rows,
            alt_cols,
            cells: vec![Cell::default(); DEFAULT_ROWS * DEFAULT_COLS],
            buffer_addr: 0,
            cursor_addr: 0,
            keyboard_locked: true,
            alarm: false,
            dirty: true,
            notify: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn alt_rows(&self) -> usize {
        self.alt_rows
    }

    pub fn alt_cols(&self) -> usize {
        self.alt_cols
    }

    /// Number of addressable positions at the current size
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    pub fn cell(&self, address: u16) -> &Cell {
        &self.cells[address as usize % self.size()]
    }

    pub fn cell_mut(&mut self, address: u16) -> &mut Cell {
        let size = self.size();
        self.touch();
        &mut self.cells[address as usize % size]
    }

    pub fn buffer_addr(&self) -> u16 {
        self.buffer_addr
    }

    /// Set the codec buffer address; the caller validates range
    pub fn set_buffer_addr(&mut self, address: u16) {
        self.buffer_addr = address;
    }

    pub fn cursor_addr(&self) -> u16 {
        self.cursor_addr
    }

    pub fn set_cursor_addr(&mut self, address: u16) {
        self.cursor_addr = ((address as usize) % self.size()) as u16;
        self.touch();
    }

    pub fn keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn set_keyboard_locked(&mut self, locked: bool) {
        self.keyboard_locked = locked;
        self.touch();
    }

    /// Alarm flag, set by WCC and cleared when the embedder sounds it
    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn set_alarm(&mut self, alarm: bool) {
        self.alarm = alarm;
    }

    pub fn inc_addr(&self, address: u16) -> u16 {
        ((address as usize + 1) % self.size()) as u16
    }

    pub fn dec_addr(&self, address: u16) -> u16 {
        ((address as usize + self.size() - 1) % self.size()) as u16
    }

    pub fn addr_to_row_col(&self, address: u16) -> (usize, usize) {
        (address as usize / self.cols, address as usize % self.cols)
    }

    pub fn row_col_to_addr(&self, row: usize, col: usize) -> u16 {
        (row * self.cols + col) as u16
    }

    /// Register a callback fired after every visible mutation
    pub fn set_change_listener(&mut self, listener: Box<dyn FnMut() + Send>) {
        self.notify = Some(listener);
    }

    /// Read and clear the dirty flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn touch(&mut self) {
        self.dirty = true;
        if let Some(ref mut f) = self.notify {
            f();
        }
    }

    /// Write a data byte at the buffer address and advance
    pub fn write_data(&mut self, code: u8, fg: u8, gr: u8, cs: u8) {
        let addr = self.buffer_addr;
        let cell = &mut self.cells[addr as usize];
        cell.code = code;
        cell.fg = fg;
        cell.gr = gr;
        cell.cs = cs;
        cell.is_field_attr = false;
        self.buffer_addr = self.inc_addr(addr);
        self.touch();
    }

    /// Place a field attribute byte at the buffer address and advance
    pub fn start_field(&mut self, attr: u8) {
        let addr = self.buffer_addr;
        let cell = &mut self.cells[addr as usize];
        *cell = Cell {
            code: attr,
            is_field_attr: true,
            ..Cell::default()
        };
        self.buffer_addr = self.inc_addr(addr);
        self.touch();
    }

    /// Recolor a cell in place
    pub fn set_fg(&mut self, address: u16, fg: u8) {
        self.cell_mut(address).fg = fg;
    }

    /// Replace a cell's graphic rendition bits in place
    pub fn set_gr(&mut self, address: u16, gr: u8) {
        self.cell_mut(address).gr = gr;
    }

    /// True once any field attribute exists in the buffer
    pub fn is_formatted(&self) -> bool {
        self.cells.iter().any(|c| c.is_field_attr)
    }

    /// Address of the field attribute governing `address`, scanning backward
    /// with wraparound; `None` on an unformatted screen
    pub fn field_attr_addr(&self, address: u16) -> Option<u16> {
        let size = self.size();
        let mut a = address as usize % size;
        for _ in 0..size {
            if self.cells[a].is_field_attr {
                return Some(a as u16);
            }
            a = (a + size - 1) % size;
        }
        None
    }

    /// Attribute governing `address`; synthesises the open unformatted
    /// attribute when the screen has no fields
    pub fn field_attribute_at(&self, address: u16) -> FieldAttribute {
        match self.field_attr_addr(address) {
            Some(a) => FieldAttribute(self.cells[a as usize].code),
            None => FieldAttribute::unformatted(),
        }
    }

    /// First position after the next unprotected field attribute at or after
    /// `from`, skipping zero-width fields; 0 when the screen holds no
    /// enterable position
    pub fn next_unprotected(&self, from: u16) -> u16 {
        let size = self.size();
        let mut a = from as usize % size;
        for _ in 0..size {
            let cell = &self.cells[a];
            let following = (a + 1) % size;
            if cell.is_field_attr
                && !FieldAttribute(cell.code).is_protected()
                && !self.cells[following].is_field_attr
            {
                return following as u16;
            }
            a = following;
        }
        0
    }

    /// Set MDT on the attribute governing `address` (no-op unformatted)
    pub fn set_mdt(&mut self, address: u16) {
        if let Some(a) = self.field_attr_addr(address) {
            let cell = &mut self.cells[a as usize];
            cell.code = FieldAttribute(cell.code).with_mdt().0;
            self.touch();
        }
    }

    /// Clear MDT on every field attribute (WCC reset-MDT)
    pub fn reset_all_mdt(&mut self) {
        for cell in self.cells.iter_mut() {
            if cell.is_field_attr {
                cell.code = FieldAttribute(cell.code).without_mdt().0;
            }
        }
        self.touch();
    }

    /// Clear the buffer, optionally switching to the alternate size, and
    /// home both addresses
    pub fn erase(&mut self, alternate: bool) {
        let (rows, cols) = if alternate {
            (self.alt_rows, self.alt_cols)
        } else {
            (DEFAULT_ROWS, DEFAULT_COLS)
        };
        self.rows = rows;
        self.cols = cols;
        self.cells.clear();
        self.cells.resize(rows * cols, Cell::default());
        self.buffer_addr = 0;
        self.cursor_addr = 0;
        self.touch();
    }

    /// Copy `count` cells from `src` to `dst` (embedder scrolling support);
    /// with `move_extended` the colour and rendition attributes move too,
    /// otherwise the destination keeps its own
    pub fn block_copy(&mut self, src: u16, dst: u16, count: usize, move_extended: bool) {
        let size = self.size();
        let src = src as usize % size;
        let dst = dst as usize % size;
        let count = count.min(size - src).min(size - dst);
        if move_extended {
            self.cells.copy_within(src..src + count, dst);
        } else {
            for i in 0..count {
                let from = self.cells[src + i];
                let cell = &mut self.cells[dst + i];
                cell.code = from.code;
                cell.is_field_attr = from.is_field_attr;
            }
        }
        self.touch();
    }

    /// Reset `count` cells starting at `start` to nulls; with
    /// `clear_extended` the colour and rendition attributes reset too
    pub fn block_clear(&mut self, start: u16, count: usize, clear_extended: bool) {
        let size = self.size();
        let start = start as usize % size;
        let count = count.min(size - start);
        for cell in &mut self.cells[start..start + count] {
            if clear_extended {
                *cell = Cell::default();
            } else {
                cell.code = FCORDER_NULL;
                cell.is_field_attr = false;
            }
        }
        self.touch();
    }

    /// Render one row as text, attribute positions and nulls as blanks
    pub fn get_row(&self, row: usize) -> String {
        let start = row * self.cols;
        self.cells[start..start + self.cols]
            .iter()
            .map(|c| {
                if c.is_field_attr || c.code == FCORDER_NULL {
                    ' '
                } else {
                    ebcdic_to_display(c.code)
                }
            })
            .collect()
    }
}

impl fmt::Display for ScreenBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            writeln!(f, "{}", self.get_row(row))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::FA_PROTECT;

    #[test]
    fn test_address_wraparound() {
        let size = 24 * 80;
        assert_eq!(BufferAddress(1919).inc(size), BufferAddress(0));
        assert_eq!(BufferAddress(0).dec(size), BufferAddress(1919));
        assert_eq!(BufferAddress(100).inc(size), BufferAddress(101));
    }

    #[test]
    fn test_12bit_round_trip() {
        for addr in [0u16, 1, 79, 80, 1919, 0xFFF] {
            let [b1, b2] = addressing::encode_12bit_address(addr);
            assert_eq!(addressing::decode_12bit_address(b1, b2), addr);
            // coded bytes always carry a set bit in the top two positions
            assert_ne!(b1 & 0xC0, 0);
        }
    }

    #[test]
    fn test_14bit_round_trip() {
        for addr in [0u16, 1920, 0x1000, 0x3FFF] {
            let [b1, b2] = addressing::encode_14bit_address(addr);
            assert_eq!(addressing::decode_14bit_address(b1, b2), addr);
            assert_eq!(b1 & 0xC0, 0);
        }
    }

    #[test]
    fn test_decode_discriminates_forms() {
        let [b1, b2] = addressing::encode_12bit_address(1919);
        assert_eq!(addressing::decode_buffer_address(b1, b2), 1919);
        let [b1, b2] = addressing::encode_14bit_address(3000);
        assert_eq!(addressing::decode_buffer_address(b1, b2), 3000);
    }

    #[test]
    fn test_encode_selects_form_by_buffer_size() {
        let [b1, _] = addressing::encode_buffer_address(100, 1920);
        assert_ne!(b1 & 0xC0, 0);
        let [b1, _] = addressing::encode_buffer_address(100, 43 * 80);
        assert_eq!(b1 & 0xC0, 0);
    }

    #[test]
    fn test_field_attribute_backward_scan_wraps() {
        let mut screen = ScreenBuffer::new(32, 80);
        screen.set_buffer_addr(1900);
        screen.start_field(FA_PROTECT);
        // position before the attribute wraps backward through zero
        let attr = screen.field_attribute_at(10);
        assert!(attr.is_protected());
        assert_eq!(screen.field_attr_addr(10), Some(1900));
    }

    #[test]
    fn test_unformatted_screen_synthesises_attribute() {
        let screen = ScreenBuffer::new(32, 80);
        assert!(!screen.is_formatted());
        assert!(!screen.field_attribute_at(500).is_protected());
    }

    #[test]
    fn test_next_unprotected_skips_protected() {
        let mut screen = ScreenBuffer::new(32, 80);
        screen.set_buffer_addr(10);
        screen.start_field(FA_PROTECT);
        screen.set_buffer_addr(20);
        screen.start_field(0x00);
        assert_eq!(screen.next_unprotected(0), 21);
    }

    #[test]
    fn test_next_unprotected_skips_zero_width_field() {
        let mut screen = ScreenBuffer::new(32, 80);
        // back-to-back attributes: the field at 10 holds no enterable cell
        screen.set_buffer_addr(10);
        screen.start_field(0x00);
        screen.start_field(0x00);
        assert_eq!(screen.next_unprotected(0), 12);
    }

    #[test]
    fn test_block_copy_without_extended_keeps_destination_colour() {
        let mut screen = ScreenBuffer::new(32, 80);
        screen.cell_mut(0).code = 0xC1;
        screen.cell_mut(0).fg = 0xF2;
        screen.cell_mut(80).fg = 0xF4;
        screen.block_copy(0, 80, 1, false);
        assert_eq!(screen.cell(80).code, 0xC1);
        assert_eq!(screen.cell(80).fg, 0xF4);
        screen.block_clear(80, 1, false);
        assert_eq!(screen.cell(80).code, FCORDER_NULL);
        assert_eq!(screen.cell(80).fg, 0xF4);
        screen.block_clear(80, 1, true);
        assert_eq!(screen.cell(80).fg, 0);
    }

    #[test]
    fn test_erase_alternate_resizes() {
        let mut screen = ScreenBuffer::new(43, 80);
        assert_eq!(screen.size(), 1920);
        screen.erase(true);
        assert_eq!(screen.size(), 43 * 80);
        screen.erase(false);
        assert_eq!(screen.size(), 1920);
    }

    #[test]
    fn test_mdt_set_and_reset() {
        let mut screen = ScreenBuffer::new(32, 80);
        screen.set_buffer_addr(10);
        screen.start_field(0x00);
        screen.set_mdt(15);
        assert!(screen.field_attribute_at(15).is_modified());
        screen.reset_all_mdt();
        assert!(!screen.field_attribute_at(15).is_modified());
    }

    #[test]
    fn test_row_rendering() {
        let mut screen = ScreenBuffer::new(32, 80);
        screen.set_buffer_addr(0);
        for b in [0xC8u8, 0xC5, 0xD3, 0xD3, 0xD6] {
            screen.write_data(b, 0, 0, 0);
        }
        assert!(screen.get_row(0).starts_with("HELLO"));
    }
}
