use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

pub fn stable_hash_str(seed: u64, value: &str) -> u64 {
    stable_hash_with(|hasher| {
        seed.hash(hasher);
        value.hash(hasher);
    })
}

/// Short hex digest of a string, used to disambiguate colliding table stems.
pub fn short_hex(value: &str, width: usize) -> String {
    let digest = format!("{:016x}", stable_hash_str(0, value));
    digest[digest.len().saturating_sub(width)..].to_string()
}
