//! Persistent client identity.

use tracing::debug;
use uuid::Uuid;

use crate::platform::Storage;

/// Storage key holding the client identifier.
pub const IDENTITY_STORAGE_KEY: &str = "mtt_uuid";

/// Produces fresh client identifiers.
pub trait IdGenerator: Send + Sync {
    /// Generate a new identifier.
    fn generate(&self) -> String;
}

/// [`IdGenerator`] producing random v4 UUID strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Resolves the stable client identifier.
pub struct IdentityStore;

impl IdentityStore {
    /// Read the stored identifier, creating and persisting one if absent.
    pub fn resolve(storage: &dyn Storage, generator: &dyn IdGenerator) -> String {
        match storage.get(IDENTITY_STORAGE_KEY) {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = generator.generate();
                storage.set(IDENTITY_STORAGE_KEY, id.clone());
                debug!(id = %id, "Created client identity");
                id
            }
        }
    }
}
