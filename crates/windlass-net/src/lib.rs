//! HTTP download tasks with composable sinks, streaming validation and cache
//! metadata.
//!
//! # Architecture
//!
//! - `download.rs` - the download task state machine and its factory context
//! - `sink/` - destinations for streamed bytes (buffer, file, cache) plus the
//!   validator-attaching decorator
//! - `validator.rs` - integrity checks independent of transport success
//! - `cache.rs` - cached artifacts and their JSON metadata index
//! - `transport.rs` - transport abstraction with the production reqwest impl
//! - `config.rs` - user-agent and host-to-credential configuration
//!
//! A [`Download`] streams bytes into a [`Sink`] through an
//! `init → write* → finalize | abort` lifecycle, follows redirects under the
//! same task identity, and emits exactly one terminal outcome per execution
//! attempt. Sinks compose with [`Validator`]s; a validator failure dominates
//! an otherwise clean transfer.

pub use cache::{CacheEntry, MetaCache};
pub use config::{HostCredential, NetConfig};
pub use download::{Download, Downloader};
pub use error::{NetError, Result};
pub use options::DownloadOptions;
pub use sink::{BufferSink, CacheSink, FileSink, SharedBuffer, Sink, ValidatingSink};
pub use transport::{
    is_redirect, BoxStream, HttpRequest, ReplyInfo, ReqwestTransport, Transport, TransportReply,
};
pub use validator::{ChecksumValidator, Validator};

// the task vocabulary types, so callers rarely need windlass-task directly
pub use windlass_task::{AbortHandle, State, Task, TaskEvent};

mod cache;
mod config;
mod download;
mod error;
mod options;
mod sink;
mod transport;
mod util;
mod validator;
