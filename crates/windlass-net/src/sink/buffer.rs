use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use windlass_task::State;

use crate::sink::Sink;
use crate::transport::{HttpRequest, ReplyInfo};

/// Cloneable handle to the bytes collected by a [`BufferSink`].
///
/// The caller keeps one clone and reads the result after the task reports
/// `Succeeded`; until then the content is owned by the running task.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the collected bytes out, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn extend(&self, chunk: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(chunk);
    }
}

/// Sink accumulating the response body in memory.
pub struct BufferSink {
    output: SharedBuffer,
}

impl BufferSink {
    pub fn new(output: SharedBuffer) -> Self {
        Self { output }
    }
}

#[async_trait]
impl Sink for BufferSink {
    async fn init(&mut self, _request: &HttpRequest) -> State {
        // a redirect restart must not keep bytes from the previous cycle
        self.output.clear();
        State::Running
    }

    async fn write(&mut self, chunk: &[u8]) -> State {
        self.output.extend(chunk);
        State::Running
    }

    async fn finalize(&mut self, _reply: &ReplyInfo) -> State {
        State::Succeeded
    }

    async fn abort(&mut self) {
        self.output.clear();
    }

    fn has_local_data(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    async fn test_chunked_writes_equal_one_write() {
        let data = b"one logical payload split into pieces";

        let chunked = SharedBuffer::new();
        let mut sink = BufferSink::new(chunked.clone());
        sink.init(&request()).await;
        for chunk in data.chunks(7) {
            assert_eq!(sink.write(chunk).await, State::Running);
        }
        assert_eq!(sink.finalize(&reply()).await, State::Succeeded);

        let whole = SharedBuffer::new();
        let mut sink = BufferSink::new(whole.clone());
        sink.init(&request()).await;
        sink.write(data).await;
        sink.finalize(&reply()).await;

        assert_eq!(chunked.take(), whole.take());
    }

    #[tokio::test]
    async fn test_reinit_clears_previous_cycle() {
        let buffer = SharedBuffer::new();
        let mut sink = BufferSink::new(buffer.clone());
        sink.init(&request()).await;
        sink.write(b"redirect body").await;
        sink.init(&request()).await;
        sink.write(b"real body").await;
        sink.finalize(&reply()).await;
        assert_eq!(buffer.take(), b"real body");
    }

    #[tokio::test]
    async fn test_abort_discards_bytes() {
        let buffer = SharedBuffer::new();
        let mut sink = BufferSink::new(buffer.clone());
        sink.init(&request()).await;
        sink.write(b"partial").await;
        sink.abort().await;
        sink.abort().await;
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_finalize_with_zero_writes() {
        let buffer = SharedBuffer::new();
        let mut sink = BufferSink::new(buffer.clone());
        sink.init(&request()).await;
        assert_eq!(sink.finalize(&reply()).await, State::Succeeded);
        assert!(buffer.is_empty());
    }
}
