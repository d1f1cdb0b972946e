use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};
use super::{classify, NewsItem, Rotation};

/// JSON-array file holding the news feed.
///
/// Every read-modify-write cycle in this process goes through one async mutex,
/// and writes replace the file by renaming a sibling temp file over it. Other
/// processes writing the same file are not coordinated.
pub struct NewsStore {
    path: PathBuf,
    io_timeout: Duration,
    lock: Mutex<()>,
}

#[derive(Debug)]
pub struct RotationOutcome {
    pub rotation: Rotation,
    /// Set when the kept items could not be written back.
    pub write_error: Option<AppError>,
}

impl NewsStore {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        NewsStore {
            path: path.into(),
            io_timeout,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw elements of the stored array.
    pub async fn load(&self) -> Result<Vec<Value>> {
        let _guard = self.lock.lock().await;
        self.read_elements().await
    }

    /// Replaces the stored array with `items`.
    pub async fn save(&self, items: &[NewsItem]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_items(items).await
    }

    /// Classifies the current contents against `now` and writes back the kept items.
    pub async fn rotate(&self, now: DateTime<Utc>) -> Result<RotationOutcome> {
        let _guard = self.lock.lock().await;

        let elements = self.read_elements().await?;
        let rotation = classify(elements, now);
        let write_error = self.write_items(&rotation.keep).await.err();

        Ok(RotationOutcome { rotation, write_error })
    }

    async fn read_elements(&self) -> Result<Vec<Value>> {
        self.read_with(tokio::fs::read_to_string(&self.path)).await
    }

    async fn read_with<F>(&self, read: F) -> Result<Vec<Value>>
    where
        F: Future<Output = io::Result<String>>,
    {
        let raw = bounded(self.io_timeout, read)
            .await
            .map_err(|e| AppError::StorageRead(format!("{}: {}", self.path.display(), e)))?;

        serde_json::from_str::<Vec<Value>>(&raw)
            .map_err(|e| AppError::Parse(format!("{}: {}", self.path.display(), e)))
    }

    async fn write_items(&self, items: &[NewsItem]) -> Result<()> {
        let body = serde_json::to_string_pretty(items)
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        let tmp = self.temp_path();

        let replace = async {
            tokio::fs::write(&tmp, body.as_bytes()).await?;
            tokio::fs::rename(&tmp, &self.path).await
        };
        self.write_with(&tmp, replace).await?;

        debug!(path = %self.path.display(), items = items.len(), "wrote news store");
        Ok(())
    }

    async fn write_with<F>(&self, tmp: &Path, replace: F) -> Result<()>
    where
        F: Future<Output = io::Result<()>>,
    {
        if let Err(e) = bounded(self.io_timeout, replace).await {
            if let Err(cleanup) = tokio::fs::remove_file(tmp).await {
                debug!(path = %tmp.display(), error = %cleanup, "no temp file to clean up");
            }
            return Err(AppError::StorageWrite(format!("{}: {}", self.path.display(), e)));
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "news.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Runs an I/O future under a deadline, folding the timeout into an io::Error.
async fn bounded<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timed out after {:?}", limit),
        )),
    }
}
