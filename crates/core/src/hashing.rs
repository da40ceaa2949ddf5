//! Content digest used for event grouping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Number of digest bytes kept (128 bits).
const DIGEST_BYTES: usize = 16;

/// Length of the encoded hash: 16 bytes encode to 24 base64 characters, the
/// last two of which are always padding.
pub const HASH_LENGTH: usize = 22;

/// Compute a 128-bit digest of `data` and return it as unpadded base64.
pub fn short_digest_b64(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    let mut encoded = STANDARD.encode(&hash[..DIGEST_BYTES]);
    encoded.truncate(HASH_LENGTH);
    encoded
}
