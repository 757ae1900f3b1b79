use sha2::{Digest, Sha256};

/// Length of a short commit hash, matching `git log --abbrev=12`.
pub const SHORT_HASH_LEN: usize = 12;

/// Compute SHA-256 hash of bytes, returning lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive a short, git-looking commit hash from the commit's identity and a salt.
pub fn commit_hash(user_id: &str, email: &str, unix_ts: i64, salt: u64) -> String {
    let data = format!("{user_id}-{email}-{unix_ts}-{salt}");
    let mut full = sha256_hex(data.as_bytes());
    full.truncate(SHORT_HASH_LEN);
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hello() {
        let h = sha256_hex(b"hello");
        assert_eq!(
            h,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn commit_hash_is_short_lowercase_hex() {
        let h = commit_hash("user_001", "a@example.com", 1_700_000_000, 7);
        assert_eq!(h.len(), SHORT_HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn commit_hash_depends_on_salt() {
        let a = commit_hash("user_001", "a@example.com", 1_700_000_000, 1);
        let b = commit_hash("user_001", "a@example.com", 1_700_000_000, 2);
        assert_ne!(a, b);
        assert_eq!(a, commit_hash("user_001", "a@example.com", 1_700_000_000, 1));
    }
}
