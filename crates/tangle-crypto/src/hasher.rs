/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"tangle-message-v1"`) that is
/// prepended to every hash computation. A message and a transaction with
/// identical bytes therefore never share an identifier.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for message ids.
    pub const MESSAGE: Self = Self {
        domain: "tangle-message-v1",
    };
    /// Hasher for transaction ids.
    pub const TRANSACTION: Self = Self {
        domain: "tangle-transaction-v1",
    };
    /// Hasher for the signed part of a transaction.
    pub const ESSENCE: Self = Self {
        domain: "tangle-essence-v1",
    };
    /// Hasher deriving addresses from public keys.
    pub const ADDRESS: Self = Self {
        domain: "tangle-address-v1",
    };
    /// Hasher for proof-of-work digests.
    pub const POW: Self = Self {
        domain: "tangle-pow-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash_parts(&[data])
    }

    /// Hash the concatenation of several byte slices with domain separation.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }

    /// Raw BLAKE3 hash without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello tangle";
        assert_eq!(ContentHasher::MESSAGE.hash(data), ContentHasher::MESSAGE.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let message = ContentHasher::MESSAGE.hash(data);
        let transaction = ContentHasher::TRANSACTION.hash(data);
        let essence = ContentHasher::ESSENCE.hash(data);
        assert_ne!(message, transaction);
        assert_ne!(message, essence);
        assert_ne!(transaction, essence);
    }

    #[test]
    fn parts_equal_concatenation() {
        let joined = ContentHasher::POW.hash(b"abcdef");
        let parts = ContentHasher::POW.hash_parts(&[b"abc".as_slice(), b"def".as_slice()]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn raw_hash_no_domain() {
        let raw = ContentHasher::raw_hash(b"test");
        assert_ne!(raw, ContentHasher::MESSAGE.hash(b"test"));
    }
}
