use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use url::Url;

use crate::error::{NetError, Result};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Outbound request for one request/response cycle of a download.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Examples
///
/// ```
/// use windlass_net::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(302));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(404));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Asynchronous transport abstraction.
///
/// The minimal capability a download task needs: issue a GET-style request
/// with custom headers and receive a streaming reply. Implementations must
/// not follow redirects themselves; the task owns redirect handling.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<Box<dyn TransportReply>>;
}

/// Immutable response metadata, detached from the body stream.
///
/// This is what sinks receive at finalization: header values for cache
/// bookkeeping without access to the (already consumed) body.
#[derive(Debug, Clone)]
pub struct ReplyInfo {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ReplyInfo {
    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One in-flight response: status, headers and an ordered body stream.
#[async_trait]
pub trait TransportReply: Send {
    /// Next body chunk, `None` at end of stream.
    ///
    /// Chunks are delivered in receive order and never reordered; after
    /// `None` or an error the stream is exhausted.
    async fn chunk(&mut self) -> Result<Option<Bytes>>;

    fn status(&self) -> u16;

    /// Response header lookup, case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;

    fn content_length(&self) -> Option<u64>;

    /// Snapshot of the response metadata for handing to a sink.
    fn info(&self) -> ReplyInfo;

    /// Bytes the transport still buffers after the transfer completed but
    /// never delivered through [`TransportReply::chunk`].
    fn drain(&mut self) -> Bytes {
        Bytes::new()
    }

    /// Non-fatal TLS diagnostics collected while connecting. Logged by the
    /// task; never fail a download on their own.
    fn tls_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with automatic redirect following disabled.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<Box<dyn TransportReply>> {
        let mut builder = self.client.get(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| NetError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let headers = response.headers().clone();
        let stream = response.bytes_stream();

        Ok(Box::new(ReqwestReply {
            status,
            content_length,
            headers,
            stream: Box::pin(stream),
        }))
    }
}

struct ReqwestReply {
    status: u16,
    content_length: Option<u64>,
    headers: reqwest::header::HeaderMap,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

#[async_trait]
impl TransportReply for ReqwestReply {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => Err(NetError::Network(e.to_string())),
            None => Ok(None),
        }
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn info(&self) -> ReplyInfo {
        ReplyInfo {
            status: self.status,
            headers: self
                .headers
                .iter()
                .map(|(name, value)| {
                    (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
                })
                .collect(),
        }
    }
}
