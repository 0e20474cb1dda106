//! Batch envelopes and their signatures.
//!
//! The collection endpoint authenticates a batch by recomputing
//! `sha512(timestamp + SIGNING_SALT + JSON(envelope))` and comparing it to
//! the submitted `sign` field.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::ObserveResult;
use crate::record::EventRecord;

/// Topic every batch is published under.
pub const LOG_TOPIC: &str = "WMP_LOG";

/// Salt placed between the timestamp and the envelope when signing.
pub const SIGNING_SALT: &str = "marriottlog";

/// A batch of records addressed to the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Application id.
    pub source: String,
    /// Always [`LOG_TOPIC`].
    pub topic: String,
    /// The batch.
    pub logs: Vec<EventRecord>,
}

impl Envelope {
    /// Create an envelope for `logs`.
    pub fn new(source: impl Into<String>, logs: Vec<EventRecord>) -> Self {
        Self {
            source: source.into(),
            topic: LOG_TOPIC.to_string(),
            logs,
        }
    }
}

/// Request body submitted to the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    /// The envelope.
    pub data: Envelope,
    /// Lowercase hex SHA-512 signature.
    pub sign: String,
    /// Seconds since the Unix epoch used in the signature.
    pub timestamp: u64,
}

impl SignedPayload {
    /// Sign an envelope at `timestamp`.
    pub fn new(data: Envelope, timestamp: u64) -> ObserveResult<Self> {
        let sign = sign(timestamp, &data)?;
        Ok(Self {
            data,
            sign,
            timestamp,
        })
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        self.data.logs.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.data.logs.is_empty()
    }

    /// Recompute the signature and compare it to `sign`.
    pub fn verify(&self) -> bool {
        sign(self.timestamp, &self.data).is_ok_and(|expected| expected == self.sign)
    }

    /// Compact JSON body.
    pub fn to_json(&self) -> ObserveResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Signature of `envelope` at `timestamp`.
pub fn sign(timestamp: u64, envelope: &Envelope) -> ObserveResult<String> {
    let body = serde_json::to_string(envelope)?;
    let mut hasher = Sha512::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(SIGNING_SALT.as_bytes());
    hasher.update(body.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
