//! Readers handed out by the cache
//!
//! A hit yields a [`FileReader`] over the cached file. A miss yields a
//! [`TeeReader`] that copies every byte it returns into a scratch file and
//! publishes that file to the cache when closed, or a [`RemoteReader`] when
//! the caller asked not to populate the cache.

use crate::cache::Shared;
use crate::error::{CacheError, Result};
use crate::index::EntryGuard;
use async_trait::async_trait;
use blob_store::{ByteSource, RemoteSource};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

const DRAIN_CHUNK: usize = 64 * 1024;

/// Reader over a complete cached file
pub struct FileReader {
    identifier: String,
    file: Option<File>,
    guard: Option<EntryGuard>,
}

impl FileReader {
    pub(crate) fn new(identifier: &str, file: File, guard: EntryGuard) -> Self {
        Self {
            identifier: identifier.to_string(),
            file: Some(file),
            guard: Some(guard),
        }
    }
}

#[async_trait]
impl ByteSource for FileReader {
    type Error = CacheError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or_else(|| CacheError::ReaderClosed {
            identifier: self.identifier.clone(),
        })?;
        Ok(file.read(buf).await?)
    }

    async fn close(&mut self) -> Result<()> {
        if self.file.take().is_none() {
            return Err(CacheError::DoubleClose {
                identifier: self.identifier.clone(),
            });
        }
        self.guard.take();
        Ok(())
    }
}

/// Lifecycle of a [`TeeReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeState {
    /// Forwarding bytes to the caller and the scratch file
    Streaming,
    /// Closed before end of stream; copying the remainder into the scratch file
    Draining,
    /// Remote or scratch-file failure; the scratch file has been discarded
    Failed,
    /// Closed. Terminal.
    Finalized,
}

/// Reader that streams a remote object while writing it through to the cache
pub struct TeeReader {
    identifier: String,
    remote: RemoteSource,
    temp: Option<File>,
    temp_path: PathBuf,
    state: TeeState,
    at_eof: bool,
    shared: Arc<Shared>,
}

impl TeeReader {
    pub(crate) fn new(
        identifier: &str,
        remote: RemoteSource,
        temp: File,
        temp_path: PathBuf,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            remote,
            temp: Some(temp),
            temp_path,
            state: TeeState::Streaming,
            at_eof: false,
            shared,
        }
    }

    pub fn state(&self) -> TeeState {
        self.state
    }

    /// Pull one chunk from the remote and append it to the scratch file
    async fn pump(&mut self, buf: &mut [u8]) -> Result<usize> {
        // Ok(0) from the remote only means end of stream for a non-empty buffer
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.remote.read(buf).await.map_err(CacheError::RemoteIo)?;
        if n == 0 {
            self.at_eof = true;
            return Ok(0);
        }
        let temp = self.temp.as_mut().ok_or_else(|| CacheError::ReaderClosed {
            identifier: self.identifier.clone(),
        })?;
        temp.write_all(&buf[..n]).await?;
        Ok(n)
    }

    /// Throw away the scratch file after a failure
    async fn discard(&mut self) {
        self.state = TeeState::Failed;
        self.temp.take();
        if let Err(e) = tokio::fs::remove_file(&self.temp_path).await {
            debug!(path = ?self.temp_path, error = %e, "Could not remove scratch file");
        }
        self.shared.untrack_download(&self.temp_path).await;
    }

    async fn finish(&mut self) -> Result<()> {
        if self.state == TeeState::Failed {
            if let Err(e) = self.remote.close().await {
                debug!(identifier = %self.identifier, error = %e, "Closing failed remote stream");
            }
            return Ok(());
        }

        if !self.at_eof {
            self.state = TeeState::Draining;
            debug!(identifier = %self.identifier, "Draining unread remainder into cache");
            let mut buf = vec![0u8; DRAIN_CHUNK];
            loop {
                match self.pump(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        self.discard().await;
                        let _ = self.remote.close().await;
                        return Err(e);
                    }
                }
            }
        }

        if let Some(mut temp) = self.temp.take() {
            if let Err(e) = temp.flush().await {
                self.discard().await;
                let _ = self.remote.close().await;
                return Err(e.into());
            }
        }
        if let Err(e) = self.remote.close().await {
            warn!(identifier = %self.identifier, error = %e, "Error closing remote stream");
        }

        self.shared.finalize(&self.identifier, &self.temp_path).await
    }
}

#[async_trait]
impl ByteSource for TeeReader {
    type Error = CacheError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.state != TeeState::Streaming {
            return Err(CacheError::ReaderClosed {
                identifier: self.identifier.clone(),
            });
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match self.pump(buf).await {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(identifier = %self.identifier, error = %e, "Download failed");
                self.discard().await;
                Err(e)
            }
        }
    }

    /// Drain whatever the caller didn't read, then publish the cache entry
    async fn close(&mut self) -> Result<()> {
        if self.state == TeeState::Finalized {
            return Err(CacheError::DoubleClose {
                identifier: self.identifier.clone(),
            });
        }
        let result = self.finish().await;
        self.state = TeeState::Finalized;
        result
    }
}

impl Drop for TeeReader {
    fn drop(&mut self) {
        if matches!(self.state, TeeState::Finalized | TeeState::Failed) {
            return;
        }
        warn!(
            identifier = %self.identifier,
            "Reader dropped without close; discarding partial download"
        );
        self.temp.take();
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            debug!(path = ?self.temp_path, error = %e, "Could not remove scratch file");
        }
        self.shared.untrack_download_now(&self.temp_path);
    }
}

/// Reader straight from the remote store, bypassing the cache
pub struct RemoteReader {
    identifier: String,
    remote: RemoteSource,
    closed: bool,
}

impl RemoteReader {
    pub(crate) fn new(identifier: &str, remote: RemoteSource) -> Self {
        Self {
            identifier: identifier.to_string(),
            remote,
            closed: false,
        }
    }
}

#[async_trait]
impl ByteSource for RemoteReader {
    type Error = CacheError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(CacheError::ReaderClosed {
                identifier: self.identifier.clone(),
            });
        }
        self.remote.read(buf).await.map_err(CacheError::RemoteIo)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(CacheError::DoubleClose {
                identifier: self.identifier.clone(),
            });
        }
        self.closed = true;
        self.remote.close().await.map_err(CacheError::RemoteIo)
    }
}

/// A reader returned by [`BlobCache::open`](crate::BlobCache::open)
pub enum CachedReader {
    Hit(FileReader),
    Miss(TeeReader),
    /// Miss opened without writing to the cache
    Uncached(RemoteReader),
}

impl CachedReader {
    pub fn is_hit(&self) -> bool {
        matches!(self, CachedReader::Hit(_))
    }

    pub fn identifier(&self) -> &str {
        match self {
            CachedReader::Hit(reader) => &reader.identifier,
            CachedReader::Miss(reader) => &reader.identifier,
            CachedReader::Uncached(reader) => &reader.identifier,
        }
    }
}

#[async_trait]
impl ByteSource for CachedReader {
    type Error = CacheError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            CachedReader::Hit(reader) => reader.read(buf).await,
            CachedReader::Miss(reader) => reader.read(buf).await,
            CachedReader::Uncached(reader) => reader.read(buf).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            CachedReader::Hit(reader) => reader.close().await,
            CachedReader::Miss(reader) => reader.close().await,
            CachedReader::Uncached(reader) => reader.close().await,
        }
    }
}
