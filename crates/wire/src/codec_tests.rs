// SPDX-License-Identifier: MIT

use super::*;
use serde::Deserialize;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Msg {
    n: u32,
}

#[test]
fn encode_appends_single_newline() {
    let bytes = encode(&Msg { n: 1 }).unwrap();
    assert_eq!(bytes.last(), Some(&b'\n'));
    assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
}

#[test]
fn round_trip_multiple_messages() {
    let mut buf = Vec::new();
    buf.extend(encode(&Msg { n: 1 }).unwrap());
    buf.extend(encode(&Msg { n: 2 }).unwrap());
    buf.extend(encode(&Msg { n: 3 }).unwrap());

    let decoded: Vec<Msg> = decode(&mut buf);
    assert_eq!(decoded, vec![Msg { n: 1 }, Msg { n: 2 }, Msg { n: 3 }]);
    assert!(buf.is_empty());
}

#[test]
fn fragmented_frame_waits_for_completion() {
    let full = encode(&Msg { n: 7 }).unwrap();
    let (first_half, second_half) = full.split_at(full.len() / 2);

    let mut buf = first_half.to_vec();
    let decoded: Vec<Msg> = decode(&mut buf);
    assert!(decoded.is_empty());
    assert_eq!(buf, first_half);

    buf.extend_from_slice(second_half);
    let decoded: Vec<Msg> = decode(&mut buf);
    assert_eq!(decoded, vec![Msg { n: 7 }]);
}

#[test]
fn malformed_interstitial_lines_are_dropped_without_consuming_neighbors() {
    let mut buf = Vec::new();
    buf.extend(encode(&Msg { n: 1 }).unwrap());
    buf.extend(b"not json at all\n".to_vec());
    buf.extend(b"[1,2,3]\n".to_vec()); // valid JSON, not an object
    buf.extend(b"\"just a string\"\n".to_vec());
    buf.extend(encode(&Msg { n: 2 }).unwrap());

    let decoded: Vec<Msg> = decode(&mut buf);
    assert_eq!(decoded, vec![Msg { n: 1 }, Msg { n: 2 }]);
}

#[test]
fn blank_lines_are_skipped() {
    let mut buf = b"\n\n".to_vec();
    buf.extend(encode(&Msg { n: 9 }).unwrap());
    let decoded: Vec<Msg> = decode(&mut buf);
    assert_eq!(decoded, vec![Msg { n: 9 }]);
}

#[tokio::test]
async fn read_frame_skips_bad_lines_then_returns_good_one() {
    let mut input: Vec<u8> = b"garbage\n".to_vec();
    input.extend(encode(&Msg { n: 42 }).unwrap());
    let mut cursor = std::io::Cursor::new(input);
    let msg: Msg = read_frame(&mut cursor).await.unwrap();
    assert_eq!(msg, Msg { n: 42 });
}

#[tokio::test]
async fn read_frame_reports_connection_closed_on_eof() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result: Result<Msg, _> = read_frame(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn write_frame_then_read_frame_round_trips() {
    let mut buf = Vec::new();
    write_frame(&mut buf, &Msg { n: 5 }).await.unwrap();
    let mut cursor = std::io::Cursor::new(buf);
    let msg: Msg = read_frame(&mut cursor).await.unwrap();
    assert_eq!(msg, Msg { n: 5 });
}

proptest::proptest! {
    #[test]
    fn decode_of_encode_round_trips_for_any_sequence(ns in proptest::collection::vec(0u32..10_000, 0..20)) {
        let mut buf = Vec::new();
        for n in &ns {
            buf.extend(encode(&Msg { n: *n }).unwrap());
        }
        let decoded: Vec<Msg> = decode(&mut buf);
        let expected: Vec<Msg> = ns.into_iter().map(|n| Msg { n }).collect();
        prop_assert_eq!(decoded, expected);
    }
}
