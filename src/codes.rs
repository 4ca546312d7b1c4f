//! 3270 Protocol Constants and Codes
//!
//! Command codes, order codes, format-control codes, AID (Attention
//! Identifier) keys, WCC bits, field attributes, and structured-field
//! identifiers for the 3270 data stream.
//!
//! # References
//! - IBM 3270 Data Stream Programmer's Reference (GA23-0059)
//! - RFC 1576: TN3270 Current Practices
//! - RFC 2355: TN3270 Enhancements (TN3270E)

/// 3270 Command Codes
///
/// Primary commands sent from the host to the terminal. Each command has a
/// local-channel form and an SNA-equivalent form; hosts use either.
pub const CMD_WRITE: u8 = 0x01;                  // Write
pub const CMD_READ_BUFFER: u8 = 0x02;            // Read Buffer
pub const CMD_NOP: u8 = 0x03;                    // No-op
pub const CMD_ERASE_WRITE: u8 = 0x05;            // Erase/Write
pub const CMD_READ_MODIFIED: u8 = 0x06;          // Read Modified
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x0D;  // Erase/Write Alternate
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x0F;  // Erase All Unprotected
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0x11; // Write Structured Field

/// SNA-equivalent command codes
pub const SNA_CMD_WRITE: u8 = 0xF1;
pub const SNA_CMD_READ_BUFFER: u8 = 0xF2;
pub const SNA_CMD_ERASE_WRITE: u8 = 0xF5;
pub const SNA_CMD_READ_MODIFIED: u8 = 0xF6;
pub const SNA_CMD_READ_MODIFIED_ALL: u8 = 0x6E;
pub const SNA_CMD_ERASE_ALL_UNPROTECTED: u8 = 0x6F;
pub const SNA_CMD_ERASE_WRITE_ALTERNATE: u8 = 0x7E;
pub const SNA_CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;

/// 3270 Order Codes
/// Embedded in the Write body to control formatting
pub const ORDER_PT: u8 = 0x05;    // Program Tab
pub const ORDER_GE: u8 = 0x08;    // Graphic Escape
pub const ORDER_SBA: u8 = 0x11;   // Set Buffer Address
pub const ORDER_EUA: u8 = 0x12;   // Erase Unprotected to Address
pub const ORDER_IC: u8 = 0x13;    // Insert Cursor
pub const ORDER_SF: u8 = 0x1D;    // Start Field
pub const ORDER_SA: u8 = 0x28;    // Set Attribute
pub const ORDER_SFE: u8 = 0x29;   // Start Field Extended
pub const ORDER_MF: u8 = 0x2C;    // Modify Field
pub const ORDER_RA: u8 = 0x3C;    // Repeat to Address

/// Format-control orders
/// Control bytes below 0x40 that are stored in the buffer as data
pub const FCORDER_NULL: u8 = 0x00; // Null
pub const FCORDER_FF: u8 = 0x0C;   // Form Feed
pub const FCORDER_CR: u8 = 0x0D;   // Carriage Return
pub const FCORDER_NL: u8 = 0x15;   // New Line
pub const FCORDER_EM: u8 = 0x19;   // End of Medium
pub const FCORDER_DUP: u8 = 0x1C;  // Duplicate
pub const FCORDER_FM: u8 = 0x1E;   // Field Mark
pub const FCORDER_SUB: u8 = 0x3F;  // Substitute
pub const FCORDER_EO: u8 = 0xFF;   // Eight Ones

/// Write Control Character (WCC) bits
pub const WCC_RESET: u8 = 0x40;     // Reset (also clears Reply Mode to Field)
pub const WCC_START_PRINT: u8 = 0x08;
pub const WCC_ALARM: u8 = 0x04;     // Sound alarm
pub const WCC_RESTORE: u8 = 0x02;   // Restore (unlock) keyboard
pub const WCC_RESET_MDT: u8 = 0x01; // Reset all MDT bits

/// AID (Attention Identifier) keys
pub const AID_NO_AID: u8 = 0x60;
pub const AID_QREPLY: u8 = 0x61;           // Structured-field query reply
pub const AID_ENTER: u8 = 0x7D;
pub const AID_SELECT: u8 = 0x7E;           // Light-pen select
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_SYSREQ: u8 = 0xF0;

// Function keys
pub const AID_PF1: u8 = 0xF1;
pub const AID_PF2: u8 = 0xF2;
pub const AID_PF3: u8 = 0xF3;
pub const AID_PF4: u8 = 0xF4;
pub const AID_PF5: u8 = 0xF5;
pub const AID_PF6: u8 = 0xF6;
pub const AID_PF7: u8 = 0xF7;
pub const AID_PF8: u8 = 0xF8;
pub const AID_PF9: u8 = 0xF9;
pub const AID_PF10: u8 = 0x7A;
pub const AID_PF11: u8 = 0x7B;
pub const AID_PF12: u8 = 0x7C;
pub const AID_PF13: u8 = 0xC1;
pub const AID_PF14: u8 = 0xC2;
pub const AID_PF15: u8 = 0xC3;
pub const AID_PF16: u8 = 0xC4;
pub const AID_PF17: u8 = 0xC5;
pub const AID_PF18: u8 = 0xC6;
pub const AID_PF19: u8 = 0xC7;
pub const AID_PF20: u8 = 0xC8;
pub const AID_PF21: u8 = 0xC9;
pub const AID_PF22: u8 = 0x4A;
pub const AID_PF23: u8 = 0x4B;
pub const AID_PF24: u8 = 0x4C;

/// Field attribute byte bits (SF order operand)
pub const FA_PROTECT: u8 = 0x20;
pub const FA_NUMERIC: u8 = 0x10;
pub const FA_INTENSITY: u8 = 0x0C;  // two-bit intensity/selectability code
pub const FA_RESERVED: u8 = 0x02;
pub const FA_MODIFIED: u8 = 0x01;   // MDT

/// Intensity values (FA_INTENSITY field)
pub const FA_INT_NORM_NSEL: u8 = 0x00;  // normal, not light-pen selectable
pub const FA_INT_NORM_SEL: u8 = 0x04;   // normal, selectable
pub const FA_INT_HIGH_SEL: u8 = 0x08;   // intensified, selectable
pub const FA_INT_ZERO_NSEL: u8 = 0x0C;  // nondisplay, not selectable

/// Extended attribute types (SFE/MF/SA operands)
pub const XA_ALL: u8 = 0x00;
pub const XA_3270: u8 = 0xC0;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;

/// Highlighting attribute values
pub const XAH_DEFAULT: u8 = 0x00;
pub const XAH_NORMAL: u8 = 0xF0;
pub const XAH_BLINK: u8 = 0xF1;
pub const XAH_REVERSE: u8 = 0xF2;
pub const XAH_UNDERSCORE: u8 = 0xF4;
pub const XAH_INTENSIFY: u8 = 0xF8;

/// Graphic rendition bits (internal form of the highlighting attribute)
pub const GR_BLINK: u8 = 0x01;
pub const GR_REVERSE: u8 = 0x02;
pub const GR_UNDERLINE: u8 = 0x04;
pub const GR_INTENSIFY: u8 = 0x08;

/// Character set indices (internal form of XA_CHARSET)
pub const CS_BASE: u8 = 0;
pub const CS_APL: u8 = 1;  // alternate character set selected by GE

/// Color attribute values
pub const XAC_DEFAULT: u8 = 0x00;
pub const XAC_BLUE: u8 = 0xF1;
pub const XAC_RED: u8 = 0xF2;
pub const XAC_PINK: u8 = 0xF3;
pub const XAC_GREEN: u8 = 0xF4;
pub const XAC_TURQUOISE: u8 = 0xF5;
pub const XAC_YELLOW: u8 = 0xF6;
pub const XAC_NEUTRAL_WHITE: u8 = 0xF7;

/// Structured field identifiers
pub const SF_READ_PART: u8 = 0x01;      // Read Partition
pub const SF_ERASE_RESET: u8 = 0x03;    // Erase/Reset
pub const SF_SET_REPLY_MODE: u8 = 0x09; // Set Reply Mode
pub const SF_OUTBOUND_DS: u8 = 0x40;    // Outbound 3270 DS

/// Read Partition sub-types
pub const SF_RP_QUERY: u8 = 0x02;
pub const SF_RP_QLIST: u8 = 0x03;

/// Partition ids the display honors
pub const SF_PARTITION_QUERY: u8 = 0xFF; // Read Partition Query only
pub const SF_PARTITION_DEFAULT: u8 = 0x00;

/// Read Partition QueryList request types
pub const SF_RPQ_LIST: u8 = 0x00;
pub const SF_RPQ_EQUIV_LIST: u8 = 0x40;
pub const SF_RPQ_ALL: u8 = 0x80;

/// Erase/Reset operands
pub const SF_ER_DEFAULT: u8 = 0x00;
pub const SF_ER_ALT: u8 = 0x80;

/// Set Reply Mode operands
pub const SF_SRM_FIELD: u8 = 0x00;
pub const SF_SRM_XFIELD: u8 = 0x01;
pub const SF_SRM_CHAR: u8 = 0x02;

/// Query Reply codes
pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_ALPHA_PART: u8 = 0x84;
pub const QR_CHARSETS: u8 = 0x85;
pub const QR_COLOR: u8 = 0x86;
pub const QR_HIGHLIGHTING: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_DDM: u8 = 0x95;
pub const QR_IMP_PART: u8 = 0xA6;
pub const QR_NULL: u8 = 0xFF;

/// Enum representation of 3270 command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
    Nop,
}

impl CommandCode {
    /// Decode a command byte, accepting both local and SNA-equivalent forms
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE | SNA_CMD_WRITE => Some(Self::Write),
            CMD_ERASE_WRITE | SNA_CMD_ERASE_WRITE => Some(Self::EraseWrite),
            CMD_ERASE_WRITE_ALTERNATE | SNA_CMD_ERASE_WRITE_ALTERNATE => {
                Some(Self::EraseWriteAlternate)
            }
            CMD_READ_BUFFER | SNA_CMD_READ_BUFFER => Some(Self::ReadBuffer),
            CMD_READ_MODIFIED | SNA_CMD_READ_MODIFIED => Some(Self::ReadModified),
            SNA_CMD_READ_MODIFIED_ALL => Some(Self::ReadModifiedAll),
            CMD_ERASE_ALL_UNPROTECTED | SNA_CMD_ERASE_ALL_UNPROTECTED => {
                Some(Self::EraseAllUnprotected)
            }
            CMD_WRITE_STRUCTURED_FIELD | SNA_CMD_WRITE_STRUCTURED_FIELD => {
                Some(Self::WriteStructuredField)
            }
            CMD_NOP => Some(Self::Nop),
            _ => None,
        }
    }
}

/// Enum representation of 3270 order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField,
    StartFieldExtended,
    SetBufferAddress,
    SetAttribute,
    ModifyField,
    InsertCursor,
    ProgramTab,
    RepeatToAddress,
    EraseUnprotectedToAddress,
    GraphicEscape,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            _ => None,
        }
    }
}

/// True for control bytes that are stored in the buffer as character data
pub fn is_format_control(value: u8) -> bool {
    matches!(
        value,
        FCORDER_NULL
            | FCORDER_FF
            | FCORDER_CR
            | FCORDER_NL
            | FCORDER_EM
            | FCORDER_DUP
            | FCORDER_FM
            | FCORDER_SUB
            | FCORDER_EO
    )
}

/// Enum representation of AID keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    NoAid,
    Enter,
    Clear,
    Select,
    SysReq,
    QReply,
    PA1,
    PA2,
    PA3,
    PF(u8), // 1..=24
}

impl AidKey {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            AID_NO_AID => Some(Self::NoAid),
            AID_ENTER => Some(Self::Enter),
            AID_CLEAR => Some(Self::Clear),
            AID_SELECT => Some(Self::Select),
            AID_SYSREQ => Some(Self::SysReq),
            AID_QREPLY => Some(Self::QReply),
            AID_PF1..=AID_PF9 => Some(Self::PF(value - AID_PF1 + 1)),
            AID_PF10 => Some(Self::PF(10)),
            AID_PF11 => Some(Self::PF(11)),
            AID_PF12 => Some(Self::PF(12)),
            AID_PF13..=AID_PF21 => Some(Self::PF(value - AID_PF13 + 13)),
            AID_PF22 => Some(Self::PF(22)),
            AID_PF23 => Some(Self::PF(23)),
            AID_PF24 => Some(Self::PF(24)),
            AID_PA1 => Some(Self::PA1),
            AID_PA2 => Some(Self::PA2),
            AID_PA3 => Some(Self::PA3),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoAid => AID_NO_AID,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::Select => AID_SELECT,
            Self::SysReq => AID_SYSREQ,
            Self::QReply => AID_QREPLY,
            Self::PA1 => AID_PA1,
            Self::PA2 => AID_PA2,
            Self::PA3 => AID_PA3,
            Self::PF(n @ 1..=9) => AID_PF1 + n - 1,
            Self::PF(10) => AID_PF10,
            Self::PF(11) => AID_PF11,
            Self::PF(12) => AID_PF12,
            Self::PF(n @ 13..=21) => AID_PF13 + n - 13,
            Self::PF(22) => AID_PF22,
            Self::PF(23) => AID_PF23,
            Self::PF(_) => AID_PF24,
        }
    }

    /// PA keys and Clear trigger a short read: the AID byte alone
    pub fn is_short_read(self) -> bool {
        matches!(self, Self::PA1 | Self::PA2 | Self::PA3 | Self::Clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_sna_equivalents() {
        assert_eq!(CommandCode::from_u8(CMD_ERASE_WRITE), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::from_u8(SNA_CMD_ERASE_WRITE), Some(CommandCode::EraseWrite));
        assert_eq!(
            CommandCode::from_u8(SNA_CMD_WRITE_STRUCTURED_FIELD),
            Some(CommandCode::WriteStructuredField)
        );
        assert_eq!(CommandCode::from_u8(0x42), None);
    }

    #[test]
    fn test_order_code_conversion() {
        assert_eq!(OrderCode::from_u8(ORDER_SF), Some(OrderCode::StartField));
        assert_eq!(OrderCode::from_u8(ORDER_RA), Some(OrderCode::RepeatToAddress));
        assert_eq!(OrderCode::from_u8(0x40), None);
    }

    #[test]
    fn test_aid_pf_round_trip() {
        for n in 1..=24u8 {
            let aid = AidKey::PF(n);
            assert_eq!(AidKey::from_u8(aid.to_u8()), Some(aid));
        }
    }

    #[test]
    fn test_short_read_aids() {
        assert!(AidKey::PA1.is_short_read());
        assert!(AidKey::Clear.is_short_read());
        assert!(!AidKey::Enter.is_short_read());
        assert!(!AidKey::PF(7).is_short_read());
    }

    #[test]
    fn test_format_control_set() {
        assert!(is_format_control(FCORDER_NULL));
        assert!(is_format_control(FCORDER_EM));
        assert!(is_format_control(FCORDER_EO));
        assert!(!is_format_control(ORDER_SBA));
    }
}
