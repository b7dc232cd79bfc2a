//! # Envelope Determinism
//!
//! The envelope hash must be a pure function of message content:
//! independent of JSON key order, independent of array element order,
//! and stable across serialize/deserialize round trips. Any mutation
//! after sealing must be detected.

#[cfg(test)]
mod tests {
    use mesh_envelope::{CanonicalCodec, CodecError, EnvelopeCodec, Message, MessageType};
    use rand::seq::SliceRandom;
    use serde_json::json;

    fn sample_message() -> Message {
        Message::new(
            "planner",
            "executor",
            MessageType::Request,
            json!({
                "workflow_id": "wf-042",
                "steps": ["fetch", "summarize", "review", "publish"],
                "limits": {"tokens": 4096, "retries": 3},
                "tags": [{"k": "env", "v": "prod"}, {"k": "team", "v": "core"}],
            }),
        )
        .with_metadata("workflow_id", json!("wf-042"))
        .with_metadata("priority", json!("high"))
    }

    /// Shuffle every array in a JSON document in place.
    fn shuffle_arrays(value: &mut serde_json::Value, rng: &mut impl rand::Rng) {
        match value {
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    shuffle_arrays(item, rng);
                }
                items.shuffle(rng);
            }
            serde_json::Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    shuffle_arrays(item, rng);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn test_hash_stable_across_ten_thousand_permutations() {
        let codec = CanonicalCodec::new();
        let base = sample_message();
        let reference = codec.compute_hash(&base).unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let mut permuted = base.clone();
            shuffle_arrays(&mut permuted.payload, &mut rng);
            assert_eq!(codec.compute_hash(&permuted).unwrap(), reference);
        }
    }

    #[test]
    fn test_hash_survives_serialization_round_trip() {
        let codec = CanonicalCodec::new();
        let sealed = codec.seal(sample_message()).unwrap();

        let bytes = codec.serialize(&sealed).unwrap();
        let restored = codec.deserialize(&bytes).unwrap();

        assert_eq!(restored.envelope_hash, sealed.envelope_hash);
        assert!(codec.validate_hash(&restored).is_ok());
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        let codec = CanonicalCodec::new();
        let sealed = codec.seal(sample_message()).unwrap();

        assert_eq!(sealed.envelope_hash.len(), 64);
        assert!(sealed
            .envelope_hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_payload_tamper_detected() {
        let codec = CanonicalCodec::new();
        let mut sealed = codec.seal(sample_message()).unwrap();

        sealed.payload["limits"]["tokens"] = json!(999_999);

        match codec.validate_hash(&sealed) {
            Err(CodecError::HashMismatch { message_id, .. }) => {
                assert_eq!(message_id, sealed.id.to_string());
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_routing_field_tamper_detected() {
        let codec = CanonicalCodec::new();
        let mut sealed = codec.seal(sample_message()).unwrap();

        sealed.to = "attacker".to_string();

        assert!(matches!(
            codec.validate_hash(&sealed),
            Err(CodecError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_metadata_tamper_detected() {
        let codec = CanonicalCodec::new();
        let mut sealed = codec.seal(sample_message()).unwrap();

        sealed
            .metadata
            .insert("priority".to_string(), json!("critical"));

        assert!(codec.validate_hash(&sealed).is_err());
    }

    #[test]
    fn test_distinct_content_yields_distinct_hashes() {
        let codec = CanonicalCodec::new();
        let a = codec.compute_hash(&sample_message()).unwrap();

        let mut other = sample_message();
        other.payload["workflow_id"] = json!("wf-043");
        let b = codec.compute_hash(&other).unwrap();

        assert_ne!(a, b);
    }
}
