//! Destinations for streamed download bytes.
//!
//! A sink walks through `init → write* → finalize | abort`. `init` may
//! short-circuit to `Succeeded` when the destination is already satisfied
//! (cache hit); the task then skips transport entirely. [`ValidatingSink`]
//! decorates any sink with integrity validators.

use async_trait::async_trait;
use windlass_task::State;

use crate::transport::{HttpRequest, ReplyInfo};
use crate::validator::Validator;

pub use buffer::{BufferSink, SharedBuffer};
pub use cache_sink::CacheSink;
pub use file::FileSink;

mod buffer;
mod cache_sink;
mod file;

/// Destination for the bytes of one download.
///
/// Exclusively owned by a single task. The same sink instance is reused
/// across redirect hops (`init` runs again per hop) but `finalize` is called
/// at most once, after the last `write` of the final cycle.
#[async_trait]
pub trait Sink: Send {
    /// Prepare the destination for a request cycle.
    ///
    /// `Succeeded` means the destination is already satisfied and transport
    /// must be skipped; `Running` proceeds with a live fetch; `Failed` /
    /// `AbortedByUser` abort before any network activity.
    async fn init(&mut self, request: &HttpRequest) -> State;

    /// Append a chunk. `Failed` rejects the chunk and poisons the cycle.
    async fn write(&mut self, chunk: &[u8]) -> State;

    /// Final integrity checks and commit. Must be safe to call when zero
    /// bytes were ever written.
    async fn finalize(&mut self, reply: &ReplyInfo) -> State;

    /// Release partially written state. Idempotent.
    async fn abort(&mut self);

    /// Whether a usable previously-cached artifact exists, for the
    /// fallback-on-error policy.
    fn has_local_data(&self) -> bool;
}

/// Decorator attaching validators to a wrapped sink.
///
/// Every call is forwarded; a validator rejection dominates whatever the
/// wrapped sink reports. On validator failure at finalize the wrapped sink
/// is left uncommitted so the caller's abort can clean it up.
pub struct ValidatingSink {
    inner: Box<dyn Sink>,
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatingSink {
    pub fn new(inner: Box<dyn Sink>) -> Self {
        Self { inner, validators: Vec::new() }
    }

    /// Attach an integrity check. Only meaningful before execution starts.
    pub fn add_validator(&mut self, validator: Box<dyn Validator>) {
        self.validators.push(validator);
    }
}

#[async_trait]
impl Sink for ValidatingSink {
    async fn init(&mut self, request: &HttpRequest) -> State {
        self.inner.init(request).await
    }

    async fn write(&mut self, chunk: &[u8]) -> State {
        for validator in &mut self.validators {
            if !validator.consume(chunk) {
                return State::Failed;
            }
        }
        self.inner.write(chunk).await
    }

    async fn finalize(&mut self, reply: &ReplyInfo) -> State {
        let mut valid = true;
        for validator in &mut self.validators {
            valid &= validator.finalize();
        }
        if !valid {
            return State::Failed;
        }
        self.inner.finalize(reply).await
    }

    async fn abort(&mut self) {
        self.inner.abort().await;
    }

    fn has_local_data(&self) -> bool {
        self.inner.has_local_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windlass_verify::Sha256Hasher;

    use crate::validator::ChecksumValidator;

    fn request() -> HttpRequest {
        HttpRequest {
            url: url::Url::parse("https://example.org/data.bin").unwrap(),
            headers: Vec::new(),
        }
    }

    fn reply() -> ReplyInfo {
        ReplyInfo { status: 200, headers: Vec::new() }
    }

    #[tokio::test]
    async fn test_validator_failure_dominates_inner_success() {
        let buffer = SharedBuffer::new();
        let mut sink = ValidatingSink::new(Box::new(BufferSink::new(buffer.clone())));
        sink.add_validator(Box::new(ChecksumValidator::new(
            Sha256Hasher::new(),
            vec![0u8; 32],
        )));

        assert_eq!(sink.init(&request()).await, State::Running);
        assert_eq!(sink.write(b"payload").await, State::Running);
        assert_eq!(sink.finalize(&reply()).await, State::Failed);
    }

    #[tokio::test]
    async fn test_matching_validator_passes_through() {
        let data = b"payload";
        let buffer = SharedBuffer::new();
        let mut sink = ValidatingSink::new(Box::new(BufferSink::new(buffer.clone())));
        sink.add_validator(Box::new(ChecksumValidator::new(
            Sha256Hasher::new(),
            Sha256Hasher::digest(data),
        )));

        assert_eq!(sink.init(&request()).await, State::Running);
        assert_eq!(sink.write(data).await, State::Running);
        assert_eq!(sink.finalize(&reply()).await, State::Succeeded);
        assert_eq!(buffer.take(), data);
    }
}
