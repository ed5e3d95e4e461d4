//! Record serialization.
//!
//! A codec turns a record's `(deadline, values)` pair into the opaque bytes a
//! store persists, and back. Implementations must round-trip exactly: the
//! deadline and every value (including its variant) come back unchanged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::value::Value;

/// Serialization contract between the manager and its store.
pub trait Codec: Send + Sync {
    fn encode(
        &self,
        deadline: DateTime<Utc>,
        values: &HashMap<String, Value>,
    ) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<(DateTime<Utc>, HashMap<String, Value>), CodecError>;
}

#[derive(Serialize)]
struct EncodeRecord<'a> {
    deadline: DateTime<Utc>,
    values: &'a HashMap<String, Value>,
}

#[derive(Deserialize)]
struct DecodeRecord {
    deadline: DateTime<Utc>,
    values: HashMap<String, Value>,
}

/// Default codec: a JSON document with `deadline` and `values` fields.
///
/// The tagged [`Value`] representation keeps integer widths, byte sequences
/// and timestamps distinct on the way back in. Non-finite floats have no JSON
/// representation: they serialize as `null` and fail on the next decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(
        &self,
        deadline: DateTime<Utc>,
        values: &HashMap<String, Value>,
    ) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&EncodeRecord { deadline, values }).map_err(CodecError::encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<(DateTime<Utc>, HashMap<String, Value>), CodecError> {
        let record: DecodeRecord = serde_json::from_slice(bytes).map_err(CodecError::decode)?;
        Ok((record.deadline, record.values))
    }
}
