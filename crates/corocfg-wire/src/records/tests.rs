//! Layout tests for configuration service records.

use rstest::rstest;

use super::*;
use crate::consts::{AF_INET6, CS_MAX_NAME_LENGTH};
use crate::status::CsError;

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    Reader::new(bytes).u32_at(offset).expect("field present")
}

#[rstest]
#[case(RingStatusGet.encode(), 16, 0)]
#[case(RingReenable.encode(), 16, 1)]
#[case(StateTrackStart { flags: 1 }.encode(), 32, 2)]
#[case(StateTrackStop.encode(), 16, 3)]
#[case(ServiceLoad { name: "evs", version: 0 }.encode(), 280, 6)]
#[case(ServiceUnload { name: "evs", version: 0 }.encode(), 280, 7)]
#[case(KillNode { nodeid: 3, reason: "fenced" }.encode(), 288, 8)]
#[case(TryShutdown::default().encode(), 24, 9)]
#[case(ReplyToShutdown { reply: ShutdownReply::Yes }.encode(), 24, 10)]
#[case(GetNodeAddrs { nodeid: 3 }.encode(), 24, 11)]
#[case(LocalGet.encode(), 16, 12)]
fn requests_carry_their_size_and_id(
    #[case] encoded: Result<Vec<u8>, WireError>,
    #[case] size: usize,
    #[case] id: u32,
) {
    let bytes = encoded.expect("encode request");
    assert_eq!(bytes.len(), size);
    assert_eq!(u32_at(&bytes, 0) as usize, size);
    assert_eq!(u32_at(&bytes, 8), id);
}

#[test]
fn kill_node_places_reason_after_aligned_nodeid() {
    let bytes = KillNode {
        nodeid: 0x0102_0304,
        reason: "fenced",
    }
    .encode()
    .expect("encode");

    assert_eq!(u32_at(&bytes, 16), 0x0102_0304);
    assert_eq!(bytes.get(24..26), Some(&[7_u8, 0][..]));
    assert_eq!(bytes.get(26..32), Some(&b"fenced"[..]));
    assert_eq!(bytes.get(32), Some(&0));
}

#[test]
fn names_at_the_limit_are_rejected() {
    let reason = "x".repeat(CS_MAX_NAME_LENGTH);
    let result = KillNode {
        nodeid: 1,
        reason: &reason,
    }
    .encode();
    assert_eq!(
        result,
        Err(WireError::NameTooLong {
            length: CS_MAX_NAME_LENGTH,
            max: CS_MAX_NAME_LENGTH
        })
    );
}

#[test]
fn longest_service_name_keeps_its_terminator() {
    let name = "s".repeat(CS_MAX_NAME_LENGTH - 1);
    let bytes = ServiceLoad {
        name: &name,
        version: 9,
    }
    .encode()
    .expect("encode");
    assert_eq!(bytes.get(16 + CS_MAX_NAME_LENGTH - 1), Some(&0));
    assert_eq!(u32_at(&bytes, 272), 9);
}

#[test]
fn ring_status_reply_exposes_names_and_status() {
    let bytes = RingStatusReply::encode(&[("eth0", "ring 0 active with no faults"), ("eth1", "FAULTY")])
        .expect("encode reply");
    assert_eq!(bytes.len(), 10_272);

    let reply = RingStatusReply::decode(&bytes).expect("decode reply");
    assert_eq!(reply.interface_count, 2);
    assert_eq!(reply.interface_name(1), Ok(&b"eth1"[..]));
    assert_eq!(reply.interface_status(0), Ok(&b"ring 0 active with no faults"[..]));
    assert_eq!(reply.interface_name(2), Ok(&b""[..]));
}

#[test]
fn ring_status_reply_must_cover_the_fixed_layout() {
    let bytes = Ack::encode(ResponseId::RingStatusGet);
    assert!(matches!(
        RingStatusReply::decode(&bytes),
        Err(WireError::Truncated { .. })
    ));
}

#[test]
fn node_address_slots_follow_the_count() {
    let first = [0xfe_u8; 16];
    let second = [0x20_u8; 16];
    let bytes = NodeAddrsReply::encode(AF_INET6, &[first, second]);
    let reply = NodeAddrsReply::decode(&bytes).expect("decode");

    assert_eq!(reply.family, AF_INET6);
    assert_eq!(reply.num_addrs, 2);
    assert_eq!(reply.address(1), Ok(&second[..]));
    assert!(matches!(reply.address(2), Err(WireError::Truncated { .. })));
}

#[test]
fn shutdown_notification_decodes_policy() {
    let bytes = ShutdownNotification::encode(ShutdownFlags::Immediate);
    let notification = ShutdownNotification::decode(&bytes).expect("decode");
    assert_eq!(notification.policy(), Ok(ShutdownFlags::Immediate));
}

#[test]
fn failed_header_surfaces_daemon_status() {
    let bytes = ResponseHeader::failed(ResponseId::LocalGet, CsError::NotExist).encode();
    let ack = Ack::decode(&bytes).expect("decode");
    assert_eq!(ack.header.status(), Err(CsError::NotExist));
}
