use cxo_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"cxo-object-v1"`) that is
/// prepended to every hash computation, so a stored object, a root payload
/// and a schema fingerprint built from identical bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored objects. The object store keys every blob by this.
    pub const OBJECT: Self = Self {
        domain: "cxo-object-v1",
    };
    /// Hasher for root-pack payloads (`RootPack::hash`).
    pub const ROOT: Self = Self {
        domain: "cxo-root-v1",
    };
    /// Hasher for schema fingerprints.
    pub const SCHEMA: Self = Self {
        domain: "cxo-schema-v1",
    };
    /// Hasher for the canonical hash of a reference collection.
    pub const REFS: Self = Self {
        domain: "cxo-refs-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        self.hash_parts(&[data])
    }

    /// Hash the concatenation of several byte slices with domain separation.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::OBJECT.hash(data), ContentHasher::OBJECT.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let object = ContentHasher::OBJECT.hash(data);
        let root = ContentHasher::ROOT.hash(data);
        let schema = ContentHasher::SCHEMA.hash(data);
        assert_ne!(object, root);
        assert_ne!(object, schema);
        assert_ne!(root, schema);
    }

    #[test]
    fn parts_equal_concatenation() {
        let whole = ContentHasher::REFS.hash(b"abcdef");
        let parts = ContentHasher::REFS.hash_parts(&[b"abc", b"def"]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::OBJECT.hash(b"original");
        assert!(ContentHasher::OBJECT.verify(b"original", &id));
        assert!(!ContentHasher::OBJECT.verify(b"tampered", &id));
    }

    #[test]
    fn domain_separated_from_raw_blake3() {
        let raw = cxo_types::Digest::of(b"test");
        assert_ne!(raw, ContentHasher::OBJECT.hash(b"test"));
        assert_eq!(ContentHasher::new("x").domain(), "x");
    }
}
