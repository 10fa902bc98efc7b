use tracing::warn;
use windlass_verify::{Hasher, VerifyError};

/// Integrity check attached to a sink, independent of transport success.
///
/// Validators see every chunk the sink accepts and get a final say when the
/// sink is finalized; a `false` from either call fails the sink even when
/// the transport completed cleanly.
pub trait Validator: Send {
    /// Inspect one chunk as it streams through. Returning `false` rejects the
    /// chunk and fails the sink.
    fn consume(&mut self, chunk: &[u8]) -> bool;

    /// Called once after the last chunk of a request cycle.
    fn finalize(&mut self) -> bool;
}

/// Compares a running digest over all streamed bytes against an expected
/// digest at finalization. A mismatch is a validation failure, distinct from
/// any transport outcome.
pub struct ChecksumValidator<H: Hasher> {
    hasher: Option<H>,
    expected: Vec<u8>,
    outcome: Option<bool>,
}

impl<H: Hasher> ChecksumValidator<H> {
    pub fn new(hasher: H, expected: impl Into<Vec<u8>>) -> Self {
        Self {
            hasher: Some(hasher),
            expected: expected.into(),
            outcome: None,
        }
    }
}

impl<H: Hasher> Validator for ChecksumValidator<H> {
    fn consume(&mut self, chunk: &[u8]) -> bool {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        true
    }

    fn finalize(&mut self) -> bool {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let Some(hasher) = self.hasher.take() else {
            return false;
        };
        let actual = hasher.finalize();
        let matched = actual == self.expected;
        if !matched {
            warn!("{}", VerifyError::mismatch(&self.expected, &actual));
        }
        self.outcome = Some(matched);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windlass_verify::Sha256Hasher;

    #[test]
    fn test_matching_digest() {
        let data = b"validated content";
        let expected = Sha256Hasher::digest(data);

        let mut validator = ChecksumValidator::new(Sha256Hasher::new(), expected);
        assert!(validator.consume(data));
        assert!(validator.finalize());
    }

    #[test]
    fn test_mismatching_digest() {
        let mut validator = ChecksumValidator::new(Sha256Hasher::new(), vec![0u8; 32]);
        assert!(validator.consume(b"whatever came over the wire"));
        assert!(!validator.finalize());
    }

    #[test]
    fn test_chunked_equals_whole() {
        let data = b"split across several chunks";
        let expected = Sha256Hasher::digest(data);

        let mut validator = ChecksumValidator::new(Sha256Hasher::new(), expected);
        for chunk in data.chunks(5) {
            assert!(validator.consume(chunk));
        }
        assert!(validator.finalize());
    }

    #[test]
    fn test_finalize_is_stable() {
        let mut validator = ChecksumValidator::new(Sha256Hasher::new(), vec![0u8; 32]);
        validator.consume(b"data");
        assert!(!validator.finalize());
        assert!(!validator.finalize());
    }

    #[test]
    fn test_empty_stream() {
        let expected = Sha256Hasher::digest(b"");
        let mut validator = ChecksumValidator::new(Sha256Hasher::new(), expected);
        assert!(validator.finalize());
    }
}
