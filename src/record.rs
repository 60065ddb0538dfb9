// Atlas — record.rs
// Record types and the order-based identifier encoding.
// Author: d65v <https://github.com/d65v>

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One datum: field name → scalar or string value. Field order is preserved.
pub type Record = Map<String, Value>;

/// A metadata record paired with its embedding row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    pub fields: Record,
    pub embedding: Vec<f32>,
}

/// Uniform access to the field map of anything that flows through the uploader.
pub trait Fields {
    fn fields(&self) -> &Record;
    fn fields_mut(&mut self) -> &mut Record;
}

impl Fields for Record {
    fn fields(&self) -> &Record {
        self
    }

    fn fields_mut(&mut self) -> &mut Record {
        self
    }
}

impl Fields for EmbeddedRecord {
    fn fields(&self) -> &Record {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut Record {
        &mut self.fields
    }
}

// ── Identifier Encoding ───────────────────────────────────────────────────────

/// Encode a counter as a short URL-safe identifier.
///
/// The big-endian bytes of `i` with leading zeros stripped (a single zero byte
/// for 0), base64url without padding. Distinct inputs give distinct outputs.
pub fn b64int(i: u64) -> String {
    let bytes = i.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    URL_SAFE_NO_PAD.encode(&bytes[first..])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
