use digest::Digest;

/// Minimal incremental hashing interface.
///
/// Implemented generically for any RustCrypto digest via [`DigestHasher`];
/// the aliases below cover the algorithms the download engine needs.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// Adapter turning any [`Digest`] into a [`Hasher`].
pub struct DigestHasher<D: Digest + Send>(D);

impl<D: Digest + Send> DigestHasher<D> {
    pub fn new() -> Self {
        Self(D::new())
    }

    /// One-shot digest of a complete buffer.
    pub fn digest(data: &[u8]) -> Vec<u8> {
        D::digest(data).to_vec()
    }
}

impl<D: Digest + Send> Default for DigestHasher<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

pub type Md5Hasher = DigestHasher<md5::Md5>;
pub type Sha256Hasher = DigestHasher<sha2::Sha256>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello world");
        let hash = hasher.finalize();

        let expected =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_md5_known_vector() {
        // MD5 of "Hello, World!" is 65a8e27d8879283831b664bd8b7f0ad4
        let hash = Md5Hasher::digest(b"Hello, World!");
        assert_eq!(hex::encode(hash), "65a8e27d8879283831b664bd8b7f0ad4");
    }

    #[test]
    fn test_incremental_equals_one_shot() {
        let data = b"incremental hashing must match the one-shot digest";
        let mut hasher = Sha256Hasher::new();
        hasher.update(&data[..7]);
        hasher.update(&data[7..]);
        assert_eq!(hasher.finalize(), Sha256Hasher::digest(data));
    }
}
