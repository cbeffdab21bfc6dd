//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Derive the cache key for a request on a route
///
/// The key is `<route>:<hex sha256 of method, path, query and body>`. The
/// route prefix keeps identical requests on different routes apart.
#[must_use]
pub fn cache_key(route: &str, method: &str, path: &str, query: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for part in [method.as_bytes(), path.as_bytes(), query.as_bytes(), body] {
        // Length prefix so bytes cannot shift from one part into the next
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }

    format!("{route}:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shape() {
        let key = cache_key("/pub", "GET", "/pub/a", "", b"");
        let (route, digest) = key.split_once(':').unwrap();
        assert_eq!(route, "/pub");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identical_requests_share_key() {
        assert_eq!(
            cache_key("/pub", "GET", "/pub/a", "x=1", b"body"),
            cache_key("/pub", "GET", "/pub/a", "x=1", b"body"),
        );
    }

    #[test]
    fn test_any_component_changes_key() {
        let base = cache_key("/pub", "GET", "/pub/a", "x=1", b"body");
        assert_ne!(base, cache_key("/pub", "POST", "/pub/a", "x=1", b"body"));
        assert_ne!(base, cache_key("/pub", "GET", "/pub/b", "x=1", b"body"));
        assert_ne!(base, cache_key("/pub", "GET", "/pub/a", "x=2", b"body"));
        assert_ne!(base, cache_key("/pub", "GET", "/pub/a", "x=1", b"other"));
    }

    #[test]
    fn test_parts_do_not_bleed_into_each_other() {
        assert_ne!(
            cache_key("/pub", "GET", "/pub/s", "a=1|x", b""),
            cache_key("/pub", "GET", "/pub/s", "a=1", b"x|"),
        );
        assert_ne!(
            cache_key("/pub", "GET", "/pub/s", "ab", b""),
            cache_key("/pub", "GET", "/pub/s", "a", b"b"),
        );
    }

    #[test]
    fn test_routes_never_collide() {
        let a = cache_key("/a", "GET", "/same", "", b"");
        let b = cache_key("/b", "GET", "/same", "", b"");
        assert_ne!(a, b);
        assert_eq!(a.split_once(':').unwrap().1, b.split_once(':').unwrap().1);
    }
}
