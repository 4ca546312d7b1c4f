//! Structured field sub-protocol
//!
//! Write Structured Field records carry a chain of `[length u16][id]`
//! sub-fields. The ones a display station answers are Read Partition (the
//! Query handshake), Erase/Reset, Set Reply Mode, and Outbound-DS, which
//! wraps an ordinary write command.

use log::{debug, warn};

use crate::codes::*;
use crate::datastream::{DataStreamCodec, Effect, ReplyMode};
use crate::error::{ProtocolError, ProtocolResult};
use crate::screen::ScreenBuffer;

/// Query Reply codes this implementation answers, in Summary order
const SUPPORTED_REPLIES: [u8; 9] = [
    QR_SUMMARY,
    QR_USABLE_AREA,
    QR_ALPHA_PART,
    QR_CHARSETS,
    QR_COLOR,
    QR_HIGHLIGHTING,
    QR_REPLY_MODES,
    QR_DDM,
    QR_IMP_PART,
];

/// In-progress Query Reply record with per-reply length back-patching
pub struct PendingQueryReply {
    buf: Vec<u8>,
    reply_start: usize,
}

impl PendingQueryReply {
    fn new() -> Self {
        PendingQueryReply {
            buf: vec![AID_QREPLY],
            reply_start: 0,
        }
    }

    /// Open a reply: length placeholder, inbound SF id 0x81, QR code
    fn start(&mut self, code: u8) {
        self.reply_start = self.buf.len();
        self.buf.extend_from_slice(&[0x00, 0x00, 0x81, code]);
    }

    /// Close the open reply, patching its length
    fn end(&mut self) {
        let len = (self.buf.len() - self.reply_start) as u16;
        self.buf[self.reply_start] = (len >> 8) as u8;
        self.buf[self.reply_start + 1] = len as u8;
    }

    fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Handler for Write Structured Field records
#[derive(Debug, Default)]
pub struct StructuredFieldProcessor;

impl StructuredFieldProcessor {
    pub fn new() -> Self {
        StructuredFieldProcessor
    }

    /// Process the body of a WSF record: a chain of structured fields
    pub fn process_wsf(
        &mut self,
        codec: &mut DataStreamCodec,
        screen: &mut ScreenBuffer,
        mut data: &[u8],
    ) -> ProtocolResult<Effect> {
        let mut reply: Option<Vec<u8>> = None;
        while data.len() >= 3 {
            let declared = ((data[0] as usize) << 8) | data[1] as usize;
            // length zero means the field runs to the end of the record
            let len = if declared == 0 { data.len() } else { declared };
            if len < 3 || len > data.len() {
                return Err(ProtocolError::BadStructuredField {
                    id: data[2],
                    reason: "length exceeds record",
                });
            }
            let id = data[2];
            let payload = &data[3..len];
            match id {
                SF_READ_PART => {
                    if let Some(r) = self.read_partition(screen, payload)? {
                        reply = Some(r);
                    }
                }
                SF_ERASE_RESET => {
                    let alternate = payload.first().copied() == Some(SF_ER_ALT);
                    screen.erase(alternate);
                    codec.set_reply_mode(ReplyMode::Field, &[]);
                }
                SF_SET_REPLY_MODE => {
                    self.set_reply_mode(codec, payload)?;
                }
                SF_OUTBOUND_DS => {
                    if payload.is_empty() {
                        return Err(ProtocolError::BadStructuredField {
                            id,
                            reason: "missing partition id",
                        });
                    }
                    if payload[0] != SF_PARTITION_DEFAULT {
                        return Err(ProtocolError::BadStructuredField {
                            id,
                            reason: "unsupported partition",
                        });
                    }
                    codec.process_outbound_ds(&payload[1..], screen)?;
                }
                other => {
                    // the error is reported per field, the chain proceeds
                    warn!(
                        "structured field rejected: {}",
                        ProtocolError::BadCommand { code: other }
                    );
                }
            }
            data = &data[len..];
        }
        Ok(match reply {
            Some(r) => Effect::Reply(r),
            None => Effect::None,
        })
    }

    /// Set Reply Mode: partition id, mode byte, character attribute types
    fn set_reply_mode(
        &mut self,
        codec: &mut DataStreamCodec,
        payload: &[u8],
    ) -> ProtocolResult<()> {
        if payload.len() < 2 {
            return Err(ProtocolError::BadStructuredField {
                id: SF_SET_REPLY_MODE,
                reason: "missing mode byte",
            });
        }
        let mode = match payload[1] {
            SF_SRM_FIELD => ReplyMode::Field,
            SF_SRM_XFIELD => ReplyMode::ExtendedField,
            SF_SRM_CHAR => ReplyMode::Character,
            _ => {
                return Err(ProtocolError::BadStructuredField {
                    id: SF_SET_REPLY_MODE,
                    reason: "unknown reply mode",
                })
            }
        };
        debug!("reply mode set to {:?}", mode);
        codec.set_reply_mode(mode, &payload[2..]);
        Ok(())
    }

    /// Read Partition: Query and Query List both answer with a Query Reply
    /// record; other sub-types are not supported on a display session
    fn read_partition(
        &mut self,
        screen: &ScreenBuffer,
        payload: &[u8],
    ) -> ProtocolResult<Option<Vec<u8>>> {
        if payload.len() < 2 {
            return Err(ProtocolError::BadStructuredField {
                id: SF_READ_PART,
                reason: "missing sub-type",
            });
        }
        if payload[0] != SF_PARTITION_QUERY {
            return Err(ProtocolError::BadStructuredField {
                id: SF_READ_PART,
                reason: "unsupported partition",
            });
        }
        match payload[1] {
            SF_RP_QUERY => Ok(Some(self.build_query_reply(screen, &SUPPORTED_REPLIES))),
            SF_RP_QLIST => {
                let reqtype = payload.get(2).copied().unwrap_or(SF_RPQ_LIST);
                let requested = &payload[payload.len().min(3)..];
                let codes: Vec<u8> = match reqtype {
                    SF_RPQ_ALL | SF_RPQ_EQUIV_LIST => SUPPORTED_REPLIES.to_vec(),
                    _ => SUPPORTED_REPLIES
                        .iter()
                        .copied()
                        .filter(|c| requested.contains(c))
                        .collect(),
                };
                Ok(Some(self.build_query_reply(screen, &codes)))
            }
            other => {
                warn!("read partition sub-type 0x{:02X} not supported", other);
                Ok(None)
            }
        }
    }

    /// Build the inbound Query Reply record for the given codes; an empty
    /// set produces the Null reply
    fn build_query_reply(&self, screen: &ScreenBuffer, codes: &[u8]) -> Vec<u8> {
        let mut pending = PendingQueryReply::new();
        if codes.is_empty() {
            pending.start(QR_NULL);
            pending.end();
            return pending.finish();
        }
        for &code in codes {
            pending.start(code);
            match code {
                QR_SUMMARY => pending.extend(&SUPPORTED_REPLIES),
                QR_USABLE_AREA => self.qr_usable_area(screen, &mut pending),
                QR_ALPHA_PART => self.qr_alpha_partitions(screen, &mut pending),
                QR_CHARSETS => self.qr_character_sets(&mut pending),
                QR_COLOR => self.qr_color(&mut pending),
                QR_HIGHLIGHTING => self.qr_highlighting(&mut pending),
                QR_REPLY_MODES => {
                    pending.extend(&[SF_SRM_FIELD, SF_SRM_XFIELD, SF_SRM_CHAR])
                }
                QR_DDM => self.qr_ddm(&mut pending),
                QR_IMP_PART => self.qr_implicit_partition(screen, &mut pending),
                _ => {}
            }
            pending.end();
        }
        pending.finish()
    }

    fn qr_usable_area(&self, screen: &ScreenBuffer, out: &mut PendingQueryReply) {
        let w = screen.alt_cols() as u16;
        let h = screen.alt_rows() as u16;
        let size = (w as u32 * h as u32) as u16;
        out.push(0x01); // 12/14-bit addressing
        out.push(0x00);
        out.extend(&w.to_be_bytes());
        out.extend(&h.to_be_bytes());
        out.push(0x01); // units: millimetres
        out.extend(&[0x00, 0x0A, 0x02, 0xE5]); // Xr fraction
        out.extend(&[0x00, 0x02, 0x00, 0x6F]); // Yr fraction
        out.push(0x09); // cell width in pels
        out.push(0x0C); // cell height in pels
        out.extend(&size.to_be_bytes());
    }

    fn qr_alpha_partitions(&self, screen: &ScreenBuffer, out: &mut PendingQueryReply) {
        let size = (screen.alt_rows() * screen.alt_cols()) as u16;
        out.push(0x00); // one partition, id 0
        out.extend(&size.to_be_bytes());
        out.push(0x00); // no special features
    }

    fn qr_character_sets(&self, out: &mut PendingQueryReply) {
        out.push(0x82); // GE and CGCSGID present
        out.push(0x00);
        out.push(0x09); // default cell width
        out.push(0x0C); // default cell height
        out.extend(&[0x00, 0x00, 0x00, 0x00]); // load types
        out.push(0x07); // descriptor length
        // base set, CGCSGID 0x02B90025 (cp 37)
        out.extend(&[0x00, 0x00, 0x00, 0x02, 0xB9, 0x00, 0x25]);
        // APL set selected by GE, CGCSGID 0x03C30026
        out.extend(&[0x01, 0x00, 0xF1, 0x03, 0xC3, 0x00, 0x26]);
    }

    fn qr_color(&self, out: &mut PendingQueryReply) {
        out.push(0x00);
        out.push(0x08); // pairs
        out.extend(&[0x00, XAC_GREEN]); // default renders green
        for c in [
            XAC_BLUE,
            XAC_RED,
            XAC_PINK,
            XAC_GREEN,
            XAC_TURQUOISE,
            XAC_YELLOW,
            XAC_NEUTRAL_WHITE,
        ] {
            out.extend(&[c, c]);
        }
    }

    fn qr_highlighting(&self, out: &mut PendingQueryReply) {
        out.push(0x05); // pairs
        out.extend(&[XAH_DEFAULT, XAH_NORMAL]);
        for h in [XAH_BLINK, XAH_REVERSE, XAH_UNDERSCORE, XAH_INTENSIFY] {
            out.extend(&[h, h]);
        }
    }

    fn qr_ddm(&self, out: &mut PendingQueryReply) {
        out.extend(&[0x00, 0x00]); // flags
        out.extend(&0x0800u16.to_be_bytes()); // max inbound
        out.extend(&0x0800u16.to_be_bytes()); // max outbound
        out.push(0x01); // subsets
        out.push(0x01); // DDM subset id
    }

    fn qr_implicit_partition(&self, screen: &ScreenBuffer, out: &mut PendingQueryReply) {
        out.extend(&[0x00, 0x00]); // flags
        out.push(0x0B); // parameter length
        out.push(0x01); // implicit partition sizes
        out.push(0x00);
        out.extend(&(crate::screen::DEFAULT_COLS as u16).to_be_bytes());
        out.extend(&(crate::screen::DEFAULT_ROWS as u16).to_be_bytes());
        out.extend(&(screen.alt_cols() as u16).to_be_bytes());
        out.extend(&(screen.alt_rows() as u16).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Split a Query Reply record into (code, payload) pairs
    fn split_replies(record: &[u8]) -> Vec<(u8, Vec<u8>)> {
        assert_eq!(record[0], AID_QREPLY);
        let mut out = Vec::new();
        let mut rest = &record[1..];
        while !rest.is_empty() {
            let len = ((rest[0] as usize) << 8) | rest[1] as usize;
            assert!(len >= 4 && len <= rest.len());
            assert_eq!(rest[2], 0x81);
            out.push((rest[3], rest[4..len].to_vec()));
            rest = &rest[len..];
        }
        out
    }

    fn wsf(payload: &[u8]) -> Vec<u8> {
        let mut rec = vec![CMD_WRITE_STRUCTURED_FIELD];
        rec.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        rec.extend_from_slice(payload);
        rec
    }

    fn setup() -> (DataStreamCodec, ScreenBuffer, StructuredFieldProcessor) {
        (
            DataStreamCodec::new(),
            ScreenBuffer::new(32, 80),
            StructuredFieldProcessor::new(),
        )
    }

    #[test]
    fn test_query_answers_all_supported() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_READ_PART, 0xFF, SF_RP_QUERY]);
        let effect = codec.process(&rec, &mut screen, &mut sf).unwrap();
        let reply = match effect {
            Effect::Reply(r) => r,
            Effect::None => panic!("query produced no reply"),
        };
        let replies = split_replies(&reply);
        assert_eq!(replies.len(), SUPPORTED_REPLIES.len());
        assert_eq!(replies[0].0, QR_SUMMARY);
        assert_eq!(replies[0].1, SUPPORTED_REPLIES.to_vec());
    }

    #[test]
    fn test_query_list_empty_intersection_yields_null() {
        let (mut codec, mut screen, mut sf) = setup();
        // request only an unsupported code
        let rec = wsf(&[SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, 0x99]);
        let effect = codec.process(&rec, &mut screen, &mut sf).unwrap();
        let reply = match effect {
            Effect::Reply(r) => r,
            Effect::None => panic!("query list produced no reply"),
        };
        let replies = split_replies(&reply);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, QR_NULL);
        assert!(replies[0].1.is_empty());
    }

    #[test]
    fn test_query_list_usable_area_only() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, QR_USABLE_AREA]);
        let effect = codec.process(&rec, &mut screen, &mut sf).unwrap();
        let reply = match effect {
            Effect::Reply(r) => r,
            Effect::None => panic!("query list produced no reply"),
        };
        let replies = split_replies(&reply);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, QR_USABLE_AREA);
        // width and height at offsets 2..6 of the payload
        assert_eq!(&replies[0].1[2..6], &[0x00, 80, 0x00, 32]);
    }

    #[test]
    fn test_erase_reset_switches_size() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_ERASE_RESET, SF_ER_ALT]);
        codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert_eq!(screen.size(), 32 * 80);
        let rec = wsf(&[SF_ERASE_RESET, SF_ER_DEFAULT]);
        codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert_eq!(screen.size(), 24 * 80);
    }

    #[test]
    fn test_set_reply_mode() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_SET_REPLY_MODE, 0x00, SF_SRM_CHAR, XA_FOREGROUND]);
        codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert_eq!(codec.reply_mode(), ReplyMode::Character);
    }

    #[test]
    fn test_outbound_ds_write() {
        let (mut codec, mut screen, mut sf) = setup();
        let mut payload = vec![SF_OUTBOUND_DS, 0x00, CMD_ERASE_WRITE, 0x00];
        payload.push(0xC1);
        let rec = wsf(&payload);
        codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert_eq!(screen.cell(0).code, 0xC1);
    }

    #[test]
    fn test_outbound_ds_rejects_read_command() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_OUTBOUND_DS, 0x00, CMD_READ_BUFFER]);
        let err = codec.process(&rec, &mut screen, &mut sf).unwrap_err();
        assert!(matches!(err, ProtocolError::BadCommand { .. }));
    }

    #[test]
    fn test_query_against_other_partition_is_rejected() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_READ_PART, 0x07, SF_RP_QUERY]);
        let err = codec.process(&rec, &mut screen, &mut sf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BadStructuredField { id: SF_READ_PART, .. }
        ));
    }

    #[test]
    fn test_outbound_ds_against_other_partition_is_rejected() {
        let (mut codec, mut screen, mut sf) = setup();
        let rec = wsf(&[SF_OUTBOUND_DS, 0x01, CMD_ERASE_WRITE, 0x00, 0xC1]);
        let err = codec.process(&rec, &mut screen, &mut sf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BadStructuredField { id: SF_OUTBOUND_DS, .. }
        ));
        assert_ne!(screen.cell(0).code, 0xC1);
    }

    #[test]
    fn test_zero_length_runs_to_end() {
        let (mut codec, mut screen, mut sf) = setup();
        let mut rec = vec![CMD_WRITE_STRUCTURED_FIELD, 0x00, 0x00];
        rec.extend_from_slice(&[SF_READ_PART, 0xFF, SF_RP_QUERY]);
        let effect = codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert!(matches!(effect, Effect::Reply(_)));
    }

    #[test]
    fn test_unknown_id_is_skipped() {
        let (mut codec, mut screen, mut sf) = setup();
        // unknown field first, then a query; the query still answers
        let mut body = Vec::new();
        body.extend_from_slice(&[0x00, 0x04, 0x7F, 0x00]);
        body.extend_from_slice(&[0x00, 0x05, SF_READ_PART, 0xFF, SF_RP_QUERY]);
        let mut rec = vec![CMD_WRITE_STRUCTURED_FIELD];
        rec.extend_from_slice(&body);
        let effect = codec.process(&rec, &mut screen, &mut sf).unwrap();
        assert!(matches!(effect, Effect::Reply(_)));
    }
}
