#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

impl VerifyError {
    /// Build a mismatch from raw digests, hex-encoding both sides.
    pub fn mismatch(expected: &[u8], actual: &[u8]) -> Self {
        VerifyError::Mismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
