//! Query Reply and Read Partition integration tests
//!
//! Exercises the structured field sub-protocol through a negotiated session,
//! parsing the Query Reply records exactly as a host would.

use tn3270::codes::*;
use tn3270::session::Session;
use tn3270::telnet::{
    IAC, TELCMD_DO, TELCMD_EOR, TELCMD_WILL, TELOPT_BINARY, TELOPT_EOR, TELOPT_TTYPE,
};
use tn3270::{SessionConfig, TerminalModel};

fn negotiated_session(model: TerminalModel) -> Session {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SessionConfig {
        host: "mvs.test".into(),
        tn3270e: false,
        model,
        ..SessionConfig::default()
    };
    let mut session = Session::new(config);
    session
        .process_bytes(&[
            IAC, TELCMD_DO, TELOPT_TTYPE,
            IAC, TELCMD_DO, TELOPT_BINARY,
            IAC, TELCMD_DO, TELOPT_EOR,
            IAC, TELCMD_WILL, TELOPT_BINARY,
            IAC, TELCMD_WILL, TELOPT_EOR,
        ])
        .unwrap();
    session.take_queued_output();
    session
}

/// Wrap structured field content in a WSF record and EOR framing, doubling
/// any IAC bytes the way a host would
fn wsf_wire(sf_body: &[u8]) -> Vec<u8> {
    let mut record = vec![CMD_WRITE_STRUCTURED_FIELD];
    record.extend_from_slice(&((sf_body.len() + 2) as u16).to_be_bytes());
    record.extend_from_slice(sf_body);
    let mut wire = Vec::with_capacity(record.len() + 2);
    for b in record {
        wire.push(b);
        if b == IAC {
            wire.push(IAC);
        }
    }
    wire.extend_from_slice(&[IAC, TELCMD_EOR]);
    wire
}

/// Parse an inbound Query Reply record into (code, payload) pairs
fn parse_query_reply(wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
    assert_eq!(&wire[wire.len() - 2..], &[IAC, TELCMD_EOR]);
    // undo IAC doubling before looking at lengths
    let mut record = Vec::new();
    let mut i = 0;
    while i < wire.len() - 2 {
        record.push(wire[i]);
        i += if wire[i] == IAC { 2 } else { 1 };
    }
    assert_eq!(record[0], AID_QREPLY);
    let mut out = Vec::new();
    let mut rest = &record[1..];
    while !rest.is_empty() {
        let len = ((rest[0] as usize) << 8) | rest[1] as usize;
        assert!(len >= 4 && len <= rest.len(), "bad reply length {}", len);
        assert_eq!(rest[2], 0x81, "inbound id must be Query Reply");
        out.push((rest[3], rest[4..len].to_vec()));
        rest = &rest[len..];
    }
    out
}

#[test]
fn query_returns_summary_first() {
    let mut session = negotiated_session(TerminalModel::Model2);
    session
        .process_bytes(&wsf_wire(&[SF_READ_PART, 0xFF, SF_RP_QUERY]))
        .unwrap();
    let replies = parse_query_reply(&session.take_queued_output());

    assert_eq!(replies[0].0, QR_SUMMARY);
    // the summary lists every reply that follows, in order
    let listed: Vec<u8> = replies[0].1.clone();
    let sent: Vec<u8> = replies.iter().map(|(c, _)| *c).collect();
    assert_eq!(listed, sent);
    assert!(sent.contains(&QR_USABLE_AREA));
    assert!(sent.contains(&QR_REPLY_MODES));
    assert!(sent.contains(&QR_DDM));
}

#[test]
fn query_list_with_no_match_returns_null() {
    let mut session = negotiated_session(TerminalModel::Model2);
    session
        .process_bytes(&wsf_wire(&[
            SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, 0x9C, 0x9D,
        ]))
        .unwrap();
    let replies = parse_query_reply(&session.take_queued_output());
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, QR_NULL);
    assert!(replies[0].1.is_empty());
}

#[test]
fn query_list_filters_to_requested_codes() {
    let mut session = negotiated_session(TerminalModel::Model4);
    session
        .process_bytes(&wsf_wire(&[
            SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, QR_USABLE_AREA,
        ]))
        .unwrap();
    let replies = parse_query_reply(&session.take_queued_output());
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, QR_USABLE_AREA);

    // model 4 advertises 43 rows by 80 columns
    let payload = &replies[0].1;
    assert_eq!(&payload[2..4], &80u16.to_be_bytes());
    assert_eq!(&payload[4..6], &43u16.to_be_bytes());
}

#[test]
fn query_list_all_equals_full_query() {
    let mut session = negotiated_session(TerminalModel::Model2);
    session
        .process_bytes(&wsf_wire(&[SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_ALL]))
        .unwrap();
    let all = parse_query_reply(&session.take_queued_output());

    session
        .process_bytes(&wsf_wire(&[SF_READ_PART, 0xFF, SF_RP_QUERY]))
        .unwrap();
    let full = parse_query_reply(&session.take_queued_output());
    assert_eq!(all, full);
}

#[test]
fn implicit_partition_reports_both_sizes() {
    let mut session = negotiated_session(TerminalModel::Model5);
    session
        .process_bytes(&wsf_wire(&[
            SF_READ_PART, 0xFF, SF_RP_QLIST, SF_RPQ_LIST, QR_IMP_PART,
        ]))
        .unwrap();
    let replies = parse_query_reply(&session.take_queued_output());
    // two flag bytes and the parameter header precede the sizes
    let payload = &replies[0].1;
    assert_eq!(payload[2], 0x0B);
    // default 80x24, alternate 132x27
    assert_eq!(&payload[5..7], &80u16.to_be_bytes());
    assert_eq!(&payload[7..9], &24u16.to_be_bytes());
    assert_eq!(&payload[9..11], &132u16.to_be_bytes());
    assert_eq!(&payload[11..13], &27u16.to_be_bytes());
}

#[test]
fn set_reply_mode_changes_read_buffer_markers() {
    let mut session = negotiated_session(TerminalModel::Model2);

    // put one field on the screen
    let mut record = vec![CMD_ERASE_WRITE, WCC_RESTORE, ORDER_SF, 0x00, 0xC1];
    record.extend_from_slice(&[IAC, TELCMD_EOR]);
    session.process_bytes(&record).unwrap();

    // in extended-field mode, Read Buffer uses SFE markers
    session
        .process_bytes(&wsf_wire(&[SF_SET_REPLY_MODE, 0x00, SF_SRM_XFIELD]))
        .unwrap();
    let mut read = vec![CMD_READ_BUFFER];
    read.extend_from_slice(&[IAC, TELCMD_EOR]);
    session.process_bytes(&read).unwrap();
    let out = session.take_queued_output();
    assert_eq!(out[3], ORDER_SFE);

    // a write with WCC reset drops back to field mode
    let mut record = vec![CMD_WRITE, WCC_RESET];
    record.extend_from_slice(&[IAC, TELCMD_EOR]);
    session.process_bytes(&record).unwrap();
    session.process_bytes(&read).unwrap();
    let out = session.take_queued_output();
    assert_eq!(out[3], ORDER_SF);
}

#[test]
fn erase_reset_structured_field_resizes() {
    let mut session = negotiated_session(TerminalModel::Model3);
    session
        .process_bytes(&wsf_wire(&[SF_ERASE_RESET, SF_ER_ALT]))
        .unwrap();
    assert_eq!(session.screen().size(), 32 * 80);
    session
        .process_bytes(&wsf_wire(&[SF_ERASE_RESET, SF_ER_DEFAULT]))
        .unwrap();
    assert_eq!(session.screen().size(), 24 * 80);
}

#[test]
fn outbound_ds_carries_a_write() {
    let mut session = negotiated_session(TerminalModel::Model2);
    session
        .process_bytes(&wsf_wire(&[
            SF_OUTBOUND_DS, 0x00, CMD_ERASE_WRITE, WCC_RESTORE, 0xD6, 0xD2,
        ]))
        .unwrap();
    assert!(session.screen().get_row(0).starts_with("OK"));
    assert!(!session.screen().keyboard_locked());
}

#[test]
fn chained_structured_fields_process_in_order() {
    let mut session = negotiated_session(TerminalModel::Model2);
    // erase/reset followed by a query in the same WSF record
    let mut record = vec![CMD_WRITE_STRUCTURED_FIELD];
    record.extend_from_slice(&[0x00, 0x04, SF_ERASE_RESET, SF_ER_ALT]);
    record.extend_from_slice(&[0x00, 0x05, SF_READ_PART, 0xFF, SF_RP_QUERY]);
    let mut wire = Vec::new();
    for b in record {
        wire.push(b);
        if b == IAC {
            wire.push(IAC);
        }
    }
    wire.extend_from_slice(&[IAC, TELCMD_EOR]);
    session.process_bytes(&wire).unwrap();
    let replies = parse_query_reply(&session.take_queued_output());
    assert_eq!(replies[0].0, QR_SUMMARY);
}
