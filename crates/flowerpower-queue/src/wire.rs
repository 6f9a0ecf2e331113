//! Wire format for job/schedule payloads stored by the Redis backend.
//!
//! A single typed, versioned envelope (`version` + opaque `payload`) per
//! §6.3: the fixed-shape `Job`/`Schedule` records are `bincode`-encoded
//! (already a teacher dependency), while the payload itself carries
//! arbitrary `kwargs`/`meta` JSON values fine since `serde_json::Value`
//! round-trips through `bincode` losslessly. Bumping `version` is how a
//! future schema change stays forward/backward compatible: readers branch
//! on it instead of guessing the shape from bytes.

use crate::error::QueueError;
use serde::{de::DeserializeOwned, Serialize};

pub const WIRE_VERSION: u16 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WireEnvelope {
    pub version: u16,
    pub payload: Vec<u8>,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, QueueError> {
    let payload = bincode::serialize(value).map_err(|e| QueueError::Encoding(e.into()))?;
    let envelope = WireEnvelope {
        version: WIRE_VERSION,
        payload,
    };
    bincode::serialize(&envelope).map_err(|e| QueueError::Encoding(e.into()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, QueueError> {
    let envelope: WireEnvelope =
        bincode::deserialize(bytes).map_err(|e| QueueError::Encoding(e.into()))?;
    if envelope.version != WIRE_VERSION {
        return Err(QueueError::Encoding(anyhow::anyhow!(
            "unsupported wire version {} (expected {})",
            envelope.version,
            WIRE_VERSION
        )));
    }
    bincode::deserialize(&envelope.payload).map_err(|e| QueueError::Encoding(e.into()))
}

/// Results over this size are stored under a separate `result:<job_id>` key
/// rather than inline on the job record, per §6.3.
pub const INLINE_RESULT_LIMIT_BYTES: usize = 16 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Demo {
        a: u32,
        b: String,
    }

    #[test]
    fn roundtrips_through_the_versioned_envelope() {
        let demo = Demo { a: 7, b: "x".to_string() };
        let bytes = encode(&demo).unwrap();
        let back: Demo = decode(&bytes).unwrap();
        assert_eq!(demo, back);
    }

    #[test]
    fn rejects_a_mismatched_version() {
        let envelope_bytes = bincode::serialize(&WireEnvelope {
            version: 99,
            payload: bincode::serialize(&Demo { a: 1, b: "y".to_string() }).unwrap(),
        })
        .unwrap();
        let result: Result<Demo, QueueError> = decode(&envelope_bytes);
        assert!(result.is_err());
    }
}
