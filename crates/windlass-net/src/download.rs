use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;
use windlass_task::{AbortHandle, State, Task, TaskCore, TaskEvent};

use crate::cache::{CacheEntry, MetaCache};
use crate::config::NetConfig;
use crate::error::NetError;
use crate::options::DownloadOptions;
use crate::sink::{BufferSink, CacheSink, FileSink, SharedBuffer, Sink, ValidatingSink};
use crate::transport::{is_redirect, HttpRequest, Transport, TransportReply};
use crate::util::{human_bytes, transfer_rate, truncate_url};
use crate::validator::Validator;

const MAX_REDIRECTS: u32 = 10;

/// Factory context for download tasks: the transport to fetch with plus the
/// ambient network configuration (user-agent, per-host credentials).
///
/// Cheap to clone; every task constructed from it owns its own sink, request
/// and progress state and runs independently.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    config: Arc<NetConfig>,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, config: NetConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Downloader backed by the production reqwest transport.
    pub fn http(config: NetConfig) -> crate::Result<Self> {
        Ok(Self::new(Arc::new(crate::transport::ReqwestTransport::new()?), config))
    }

    /// Download into a file at `path`.
    pub fn file(&self, url: Url, path: impl Into<PathBuf>, options: DownloadOptions) -> Download {
        let name = format!("FILE:{url}");
        Download::new(self, name, url, options, Box::new(FileSink::new(path)))
    }

    /// Download into memory; the returned [`SharedBuffer`] yields the bytes
    /// after the task succeeds.
    pub fn bytes(&self, url: Url, options: DownloadOptions) -> (Download, SharedBuffer) {
        let output = SharedBuffer::new();
        let name = format!("BYTES:{url}");
        let download =
            Download::new(self, name, url, options, Box::new(BufferSink::new(output.clone())));
        (download, output)
    }

    /// Download into a cache-managed artifact plus its metadata record. A
    /// fresh entry turns the whole task into a no-transport cache hit.
    pub fn cached(
        &self,
        url: Url,
        cache: Arc<MetaCache>,
        entry: CacheEntry,
        options: DownloadOptions,
    ) -> Download {
        let name = format!("CACHE:{url}");
        let sink = CacheSink::new(cache, entry, options.make_eternal);
        Download::new(self, name, url, options, Box::new(sink))
    }
}

/// How one request/response cycle of the stream loop ended.
enum CycleEnd {
    Finished,
    Canceled,
    Errored(NetError),
}

/// What the select loop observed next.
enum StreamEvent {
    Chunk(Bytes),
    Eof,
    Errored(NetError),
    Abort,
}

/// One logical download driven to a terminal state.
///
/// The task follows redirects under the same identity (the recorded URL is
/// updated in place per hop), streams every received chunk into its sink in
/// arrival order, and emits exactly one of `Succeeded`/`Failed`/`Aborted`
/// per execution attempt, always followed by `Finished`.
pub struct Download {
    core: TaskCore,
    url: Url,
    options: DownloadOptions,
    config: Arc<NetConfig>,
    transport: Arc<dyn Transport>,
    sink: ValidatingSink,
    /// Result of the current request cycle; distinct from the task state
    /// until a terminal event is emitted.
    result: State,
    failure: String,
    details: String,
    last_progress: Option<(Instant, u64)>,
    abort: AbortHandle,
}

impl Download {
    fn new(
        downloader: &Downloader,
        name: String,
        url: Url,
        options: DownloadOptions,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            core: TaskCore::new(name),
            url,
            options,
            config: downloader.config.clone(),
            transport: downloader.transport.clone(),
            sink: ValidatingSink::new(sink),
            result: State::Inactive,
            failure: String::new(),
            details: String::new(),
            last_progress: None,
            abort: AbortHandle::new(),
        }
    }

    /// Attach an integrity check. Must be called before execution starts.
    pub fn add_validator(&mut self, validator: Box<dyn Validator>) {
        self.sink.add_validator(validator);
    }

    /// The URL the task currently points at; redirects update it in place.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn uid(&self) -> Uuid {
        self.core.uid()
    }

    /// Human-readable instantaneous transfer rate, e.g. `3.2 MiB/s`.
    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn status(&self) -> &str {
        self.core.status()
    }

    pub fn progress(&self) -> (u64, Option<u64>) {
        self.core.progress()
    }

    pub fn warnings(&self) -> &[String] {
        self.core.warnings()
    }

    pub fn was_successful(&self) -> bool {
        self.core.was_successful()
    }

    /// Handle for cancelling the task from another owner.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&mut self) -> UnboundedReceiver<TaskEvent> {
        self.core.subscribe()
    }

    async fn execute(&mut self) {
        let mut hops = 0u32;
        loop {
            self.core
                .set_status(format!("Downloading {}", truncate_url(&self.url, 60)));

            // an abort that arrived before execution must not touch the network
            if self.abort.is_requested() {
                warn!(
                    "task {}: attempt to start an aborted download: {}",
                    self.core.describe(),
                    self.url
                );
                self.abort.reset();
                self.core.emit_aborted();
                return;
            }

            let request = HttpRequest {
                url: self.url.clone(),
                headers: self.config.headers_for(&self.url),
            };

            self.result = self.sink.init(&request).await;
            match self.result {
                State::Succeeded => {
                    debug!("task {}: cache hit for {}", self.core.describe(), self.url);
                    self.core.emit_succeeded();
                    return;
                }
                State::Running => {
                    debug!("task {}: downloading {}", self.core.describe(), self.url)
                }
                State::Inactive | State::Failed => {
                    self.core.emit_failed("failed to prepare the destination");
                    return;
                }
                State::AbortedByUser => {
                    self.core.emit_aborted();
                    return;
                }
            }

            self.last_progress = Some((Instant::now(), 0));

            let mut reply = match self.transport.get(&request).await {
                Ok(reply) => reply,
                Err(err) => {
                    self.handle_error(err);
                    self.finish_terminal().await;
                    return;
                }
            };

            for warning in reply.tls_warnings() {
                self.core.log_warning(warning);
            }

            // reqwest does not turn HTTP error statuses into Err
            if reply.status() >= 400 {
                self.handle_error(NetError::Network(format!("HTTP status {}", reply.status())));
                self.finish_terminal().await;
                return;
            }

            let total = reply.content_length();
            let mut received = 0u64;
            let abort = self.abort.clone();
            let end = loop {
                let event = tokio::select! {
                    _ = abort.notified() => StreamEvent::Abort,
                    chunk = reply.chunk() => match chunk {
                        Ok(Some(bytes)) => StreamEvent::Chunk(bytes),
                        Ok(None) => StreamEvent::Eof,
                        Err(err) => StreamEvent::Errored(err),
                    },
                };
                match event {
                    StreamEvent::Chunk(bytes) => {
                        received += bytes.len() as u64;
                        self.report_progress(received, total);
                        self.write_chunk(&bytes).await;
                    }
                    StreamEvent::Eof => break CycleEnd::Finished,
                    StreamEvent::Errored(err) => break CycleEnd::Errored(err),
                    StreamEvent::Abort => break CycleEnd::Canceled,
                }
            };

            match end {
                CycleEnd::Canceled => {
                    self.abort.reset();
                    self.handle_error(NetError::Canceled);
                    self.finish_terminal().await;
                    return;
                }
                CycleEnd::Errored(err) => {
                    self.handle_error(err);
                    self.finish_terminal().await;
                    return;
                }
                CycleEnd::Finished => {}
            }

            // redirect check comes first; a redirected cycle emits no
            // terminal outcome and restarts under the same task identity
            match self.redirect_target(reply.as_ref()) {
                Ok(Some(target)) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        self.handle_error(NetError::TooManyRedirects);
                        self.finish_terminal().await;
                        return;
                    }
                    debug!(
                        "task {}: following redirect to {}",
                        self.core.describe(),
                        target
                    );
                    self.url = target;
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    // a present but unusable location is a protocol failure
                    warn!(
                        "task {}: failed to parse redirect location: {}",
                        self.core.describe(),
                        err
                    );
                    self.handle_error(err);
                    self.finish_terminal().await;
                    return;
                }
            }

            if self.result != State::Running {
                self.finish_terminal().await;
                return;
            }

            // pick up whatever the transport still buffers, then settle the sink
            let rest = reply.drain();
            if !rest.is_empty() {
                debug!(
                    "task {}: writing {} trailing bytes",
                    self.core.describe(),
                    rest.len()
                );
                self.result = self.sink.write(&rest).await;
            }

            let info = reply.info();
            self.result = self.sink.finalize(&info).await;
            if self.result != State::Succeeded {
                debug!(
                    "task {}: failed to finalize {}",
                    self.core.describe(),
                    self.url
                );
                self.sink.abort().await;
                self.core.emit_failed("failed to finalize the download");
                return;
            }

            debug!("task {}: download {} succeeded", self.core.describe(), self.url);
            self.core.emit_succeeded();
            return;
        }
    }

    /// Forward a chunk to the sink while the cycle is healthy.
    async fn write_chunk(&mut self, chunk: &[u8]) {
        if self.result == State::Running {
            self.result = self.sink.write(chunk).await;
            if self.result == State::Failed {
                error!(
                    "task {}: failed to process response chunk",
                    self.core.describe()
                );
                self.failure = "failed to write received data".into();
            }
        } else {
            error!(
                "task {}: cannot write download data, illegal state: {}",
                self.core.describe(),
                self.result
            );
        }
    }

    fn report_progress(&mut self, received: u64, total: Option<u64>) {
        let now = Instant::now();
        if let Some((last_time, last_bytes)) = self.last_progress {
            let rate = transfer_rate(
                now.duration_since(last_time),
                received.saturating_sub(last_bytes),
            );
            self.details = format!("{}/s", human_bytes(rate));
        }
        self.last_progress = Some((now, received));
        self.core.set_progress(received, total);
    }

    /// Classify a transport failure into the per-cycle result: cancellation
    /// maps to an abort, anything else fails unless local fallback applies.
    fn handle_error(&mut self, err: NetError) {
        if err.is_canceled() {
            error!("task {}: aborted {}", self.core.describe(), self.url);
            self.result = State::AbortedByUser;
            return;
        }
        if self.options.accept_local_files && self.sink.has_local_data() {
            debug!(
                "task {}: {} failed but local data is acceptable: {}",
                self.core.describe(),
                self.url,
                err
            );
            self.result = State::Succeeded;
            return;
        }
        error!(
            "task {}: failed {} with reason: {}",
            self.core.describe(),
            self.url,
            err
        );
        self.failure = err.to_string();
        self.result = State::Failed;
    }

    /// Emit the terminal event for a cycle that did not finish cleanly.
    ///
    /// The sink is always aborted here: a fallback success means "tolerate
    /// the failure and move on", never "keep the partial data".
    async fn finish_terminal(&mut self) {
        self.sink.abort().await;
        match self.result {
            State::Succeeded => {
                debug!(
                    "task {}: download failed but we are allowed to proceed: {}",
                    self.core.describe(),
                    self.url
                );
                self.core.emit_succeeded();
            }
            State::AbortedByUser => {
                debug!(
                    "task {}: download aborted in a previous step: {}",
                    self.core.describe(),
                    self.url
                );
                self.core.emit_aborted();
            }
            _ => {
                debug!(
                    "task {}: download failed in a previous step: {}",
                    self.core.describe(),
                    self.url
                );
                self.core.emit_failed(std::mem::take(&mut self.failure));
            }
        }
    }

    /// Extract and normalize a redirect target, or `None` when this reply is
    /// not a redirect worth following.
    fn redirect_target(&self, reply: &dyn TransportReply) -> crate::Result<Option<Url>> {
        if !is_redirect(reply.status()) {
            return Ok(None);
        }
        let Some(location) = reply.header("location") else {
            return Ok(None);
        };
        let location = location.trim();
        if location.is_empty() {
            // present yet empty redirect header, nothing to follow
            return Ok(None);
        }

        // join() resolves protocol-relative ("//host/path") and
        // absolute-path ("/path") forms against the current URL
        let target = self.url.join(location).map_err(|e| {
            NetError::Protocol(format!("invalid redirect location {location:?}: {e}"))
        })?;
        if target == self.url {
            return Ok(None);
        }
        Ok(Some(target))
    }
}

#[async_trait]
impl Task for Download {
    async fn start(&mut self) {
        if !self.core.begin() {
            return;
        }
        self.details.clear();
        self.execute().await;
    }

    fn abort(&self) -> bool {
        self.abort.request();
        true
    }

    fn state(&self) -> State {
        self.core.state()
    }

    fn fail_reason(&self) -> &str {
        self.core.fail_reason()
    }
}
