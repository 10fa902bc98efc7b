use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;
use windlass_task::State;

use crate::sink::Sink;
use crate::transport::{HttpRequest, ReplyInfo};

/// Sink streaming the response body into a file.
///
/// Bytes go to a uuid-suffixed temp file beside the destination; `finalize`
/// syncs and renames it into place, `abort` deletes it. The destination is
/// never observable in a partially written state.
pub struct FileSink {
    path: PathBuf,
    temp_path: Option<PathBuf>,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp_path: None,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn discard_temp(&mut self) {
        self.file = None;
        if let Some(temp) = self.temp_path.take() {
            let _ = fs::remove_file(&temp).await;
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn init(&mut self, _request: &HttpRequest) -> State {
        // a redirect restart reuses the sink; drop whatever the previous
        // cycle wrote
        self.discard_temp().await;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Err(e) = fs::create_dir_all(&parent).await {
            error!("failed to create {}: {}", parent.display(), e);
            return State::Failed;
        }

        let temp = parent.join(format!(".tmp.{}.windlass", Uuid::new_v4()));
        match File::create(&temp).await {
            Ok(file) => {
                self.file = Some(file);
                self.temp_path = Some(temp);
                State::Running
            }
            Err(e) => {
                error!("failed to open {} for writing: {}", temp.display(), e);
                State::Failed
            }
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> State {
        let Some(file) = self.file.as_mut() else {
            error!("write to {} before init", self.path.display());
            return State::Failed;
        };
        match file.write_all(chunk).await {
            Ok(()) => State::Running,
            Err(e) => {
                error!("failed to write to {}: {}", self.path.display(), e);
                State::Failed
            }
        }
    }

    async fn finalize(&mut self, _reply: &ReplyInfo) -> State {
        let (Some(mut file), Some(temp)) = (self.file.take(), self.temp_path.take()) else {
            error!("finalize of {} without an open temp file", self.path.display());
            return State::Failed;
        };

        if let Err(e) = file.flush().await {
            error!("failed to flush {}: {}", temp.display(), e);
            let _ = fs::remove_file(&temp).await;
            return State::Failed;
        }
        if let Err(e) = file.sync_all().await {
            error!("failed to sync {}: {}", temp.display(), e);
            let _ = fs::remove_file(&temp).await;
            return State::Failed;
        }
        drop(file);

        // rename over an existing destination works on unix; other platforms
        // need the stale copy gone first
        if self.path.exists() {
            let _ = fs::remove_file(&self.path).await;
        }
        if let Err(e) = fs::rename(&temp, &self.path).await {
            error!("failed to move {} to {}: {}", temp.display(), self.path.display(), e);
            let _ = fs::remove_file(&temp).await;
            return State::Failed;
        }
        State::Succeeded
    }

    async fn abort(&mut self) {
        self.discard_temp().await;
    }

    fn has_local_data(&self) -> bool {
        self.path.is_file()
    }
}
