use crate::error::{Error, Result};

/// Validates a key ID from the keyid file.
///
/// Accepted formats:
/// - 8 hex characters (short key ID, discouraged due to collisions)
/// - 16 hex characters (long key ID)
/// - 40 hex characters (full fingerprint)
/// - Any of the above with "0x" prefix
///
/// The key ID also names a file in the keyring directory, so on success it
/// is returned unchanged.
pub fn validate_keyid(keyid: &str) -> Result<&str> {
    if keyid.is_empty() {
        return Err(Error::InvalidKeyId {
            keyid: keyid.to_string(),
            reason: "key ID cannot be empty".to_string(),
        });
    }

    let digits = strip_hex_prefix(keyid);

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidKeyId {
            keyid: keyid.to_string(),
            reason: "key ID must contain only hexadecimal characters".to_string(),
        });
    }

    match digits.len() {
        8 | 16 | 40 => Ok(keyid),
        len => Err(Error::InvalidKeyId {
            keyid: keyid.to_string(),
            reason: format!("key ID must be 8, 16, or 40 hex characters (got {})", len),
        }),
    }
}

/// Normalizes an asserted long key ID for comparison: strips a "0x" prefix
/// and lowercases. No format check is done here, so anything that is not
/// the actual key ID surfaces as a mismatch.
pub fn normalize_long_key_id(keyid: &str) -> String {
    strip_hex_prefix(keyid).to_lowercase()
}

fn strip_hex_prefix(keyid: &str) -> &str {
    keyid
        .strip_prefix("0x")
        .or_else(|| keyid.strip_prefix("0X"))
        .unwrap_or(keyid)
}
