fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bkpsync_protocol::{
        Ack, ChunkHeader, Envelope, EventType, StatusQuery, encode_chunk_frame, parse_chunk_frame,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as text.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn fixture_value(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let text = load_fixture(name);
        let parsed: T = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        let fixture = fixture_value(name);
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Acknowledgements ---

    #[test]
    fn fixture_ack_partial() {
        let ack: Ack = roundtrip_test("ack_partial.json");
        assert_eq!(ack, Ack::partial("20240310-device-7", 65536));
    }

    #[test]
    fn fixture_ack_processed() {
        let ack: Ack = roundtrip_test("ack_processed.json");
        assert_eq!(ack, Ack::processed("20240310-device-7"));
    }

    #[test]
    fn fixture_ack_failure() {
        let ack: Ack = roundtrip_test("ack_failure.json");
        assert!(!ack.is_success());
        assert_eq!(ack.next_offset(), Some(131072));
    }

    #[test]
    fn fixture_ack_failure_unparsed() {
        let ack: Ack = roundtrip_test("ack_failure_unparsed.json");
        assert!(ack.meta.transfer_id.is_none());
        assert_eq!(ack.next_offset(), None);
    }

    // --- Chunk frames ---

    #[test]
    fn fixture_chunk_header() {
        let header: ChunkHeader = roundtrip_test("chunk_header.json");
        assert_eq!(header.start_offset, 65536);
        assert_eq!(header.total_length, 1048576);
    }

    #[test]
    fn chunk_frame_from_fixture_header() {
        let header_text = load_fixture("chunk_header.json");
        let header_json = serde_json::to_vec(&fixture_value("chunk_header.json")).unwrap();

        // Hand-built frame: big-endian length prefix, header JSON, payload.
        let mut frame = (header_json.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&header_json);
        frame.extend_from_slice(b"hello");

        let event = parse_chunk_frame(&frame).unwrap();
        assert_eq!(event.transfer_id, "20240310-device-7");
        assert_eq!(event.bytes, b"hello");
        assert_eq!(
            event.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let header: ChunkHeader = serde_json::from_str(&header_text).unwrap();
        let encoded = encode_chunk_frame(&header, b"hello").unwrap();
        let reparsed = parse_chunk_frame(&encoded).unwrap();
        assert_eq!(reparsed.start_offset, event.start_offset);
        assert_eq!(reparsed.bytes, event.bytes);
    }

    #[test]
    fn legacy_header_without_version_or_checksum() {
        let header: ChunkHeader =
            serde_json::from_str(r#"{"transferId":"t","startOffset":0,"totalLength":4}"#).unwrap();
        assert!(header.version.is_empty());
        assert!(header.checksum.is_empty());
    }

    // --- Envelopes ---

    #[test]
    fn fixture_status_envelope() {
        let env: Envelope = roundtrip_test("status_envelope.json");
        assert_eq!(env.event, EventType::Status);
        let query: StatusQuery = env.parse_payload().unwrap().unwrap();
        assert_eq!(query.transfer_id, "20240310-device-7");
    }

    #[test]
    fn fixture_upload_envelope() {
        let env: Envelope = roundtrip_test("upload_envelope.json");
        let ack: Ack = env.parse_payload().unwrap().unwrap();
        assert_eq!(ack, Ack::partial("20240310-device-7", 65536));

        let built = serde_json::to_value(Envelope::upload(&ack).unwrap()).unwrap();
        assert_eq!(built, fixture_value("upload_envelope.json"));
    }

    #[test]
    fn fixture_error_envelope() {
        let built = serde_json::to_value(Envelope::error("unsupported event: upload").unwrap()).unwrap();
        assert_eq!(built, fixture_value("error_envelope.json"));
    }
}
