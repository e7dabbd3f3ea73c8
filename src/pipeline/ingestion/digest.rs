use sha2::{Digest, Sha256};

use crate::domain::{ContentDigest, RawFile};

/// SHA-256 of the bytes, hex encoded. Identical bytes always give the same
/// digest; it is both the idempotency token and the output file stem.
pub fn content_digest(bytes: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    ContentDigest::from_hex_unchecked(hex::encode(out))
}

impl RawFile {
    pub fn digest(&self) -> ContentDigest {
        content_digest(&self.bytes)
    }
}
