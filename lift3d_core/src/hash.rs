//! FNV-1a hashing for deterministic seeding.
//!
//! Prompt tokens are hashed to seed their pseudo-embeddings, so the same text
//! always maps to the same vectors across runs and platforms.

const FNV_OFFSET_64: u64 = 0xcbf29ce484222325;
const FNV_PRIME_64: u64 = 0x00000100000001b3;

/// FNV-1a 64-bit hash of a byte slice.
#[inline]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_64;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME_64);
    }
    hash
}

/// FNV-1a 64-bit hash of a string.
#[inline]
pub fn fnv1a_str(text: &str) -> u64 {
    fnv1a_64(text.as_bytes())
}

/// Combine a hash with a salt, for deriving independent seeds from one key.
#[inline]
pub fn hash_with_salt(hash: u64, salt: u64) -> u64 {
    let mut out = hash;
    for byte in salt.to_le_bytes() {
        out ^= byte as u64;
        out = out.wrapping_mul(FNV_PRIME_64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(fnv1a_str("hamburger"), fnv1a_str("hamburger"));
        assert_ne!(fnv1a_str("hamburger"), fnv1a_str("pizza"));
    }

    #[test]
    fn test_salt_changes_hash() {
        let h = fnv1a_str("token");
        assert_ne!(hash_with_salt(h, 0), hash_with_salt(h, 1));
    }
}
