//! Byte source over any async reader

use crate::stream::ByteSource;
use async_trait::async_trait;
use sml_core::{SmlError, SmlResult};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Adapter exposing any [`AsyncRead`] as a [`ByteSource`].
///
/// Used for decoding recorded telegram dumps from files and for driving the
/// codec from in-memory buffers in tests.
pub struct IoSource<R> {
    reader: R,
    read_timeout: Option<Duration>,
    closed: bool,
}

impl<R> IoSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            read_timeout: None,
            closed: false,
        }
    }
}

#[async_trait]
impl<R> ByteSource for IoSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmlResult<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmlResult<usize> {
        if self.closed {
            return Ok(0);
        }

        let result = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read(buf))
                .await
                .map_err(|_| SmlError::Timeout)?
                .map_err(SmlError::Source),
            None => self.reader.read(buf).await.map_err(SmlError::Source),
        };

        if let Ok(0) = result {
            self.closed = true;
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> SmlResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_until_eof() {
        let data = [0x10u8, 0x20, 0x30];
        let mut source = IoSource::new(&data[..]);

        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [0x10, 0x20]);
        assert_eq!(source.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 0x30);
        assert_eq!(source.read(&mut buf).await.unwrap(), 0);
        assert!(source.is_closed());
    }
}
