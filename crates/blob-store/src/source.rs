//! Sequential byte sources
//!
//! Every reader in the system, whether it streams from a remote store, tees
//! into a cache, or reads a cached file, implements [`ByteSource`].

use crate::error::StoreError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 64 * 1024;

/// A forward-only byte stream with an explicit close
#[async_trait]
pub trait ByteSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read up to `buf.len()` bytes; `Ok(0)` means end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Release the source. Closing twice is an error.
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Read everything that remains, appending to `out`
    async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize, Self::Error> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }
}

/// An object stream handed out by an [`ObjectStore`](crate::ObjectStore)
pub type RemoteSource = Box<dyn ByteSource<Error = StoreError>>;

/// Adapts any tokio reader into a [`ByteSource`]
pub struct ReaderSource<R> {
    reader: Option<R>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

fn closed_error() -> StoreError {
    std::io::Error::other("object stream already closed").into()
}

#[async_trait]
impl<R> ByteSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    type Error = StoreError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let reader = self.reader.as_mut().ok_or_else(closed_error)?;
        Ok(reader.read(buf).await?)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        match self.reader.take() {
            Some(_) => Ok(()),
            None => Err(closed_error()),
        }
    }
}
