//! TCP byte source

use crate::stream::ByteSource;
use async_trait::async_trait;
use sml_core::{SmlError, SmlResult};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// TCP connection to a meter, read side only.
pub struct TcpSource {
    stream: TcpStream,
    read_timeout: Option<Duration>,
    closed: bool,
}

impl TcpSource {
    /// Connect to `address` (`host:port`), optionally bounded by
    /// `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SmlError::Timeout`] when the deadline lapses before the
    /// connection is established, or a source error for resolver and
    /// connect failures.
    pub async fn connect(address: &str, connect_timeout: Option<Duration>) -> SmlResult<Self> {
        let stream = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(address))
                .await
                .map_err(|_| SmlError::Timeout)??,
            None => TcpStream::connect(address).await?,
        };

        Ok(Self {
            stream,
            read_timeout: None,
            closed: false,
        })
    }
}

#[async_trait]
impl ByteSource for TcpSource {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmlResult<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> SmlResult<usize> {
        let result = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.read(buf))
                .await
                .map_err(|_| SmlError::Timeout)?
                .map_err(SmlError::Source),
            None => self.stream.read(buf).await.map_err(SmlError::Source),
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> SmlResult<()> {
        use tokio::io::AsyncWriteExt;

        let _ = self.stream.shutdown().await;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_and_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut peer, _) = listener.accept().await.unwrap();
            peer.write_all(&[0x01, 0x02, 0x03]).await.unwrap();
        });

        let mut source = TcpSource::connect(&addr.to_string(), None).await.unwrap();
        let mut buf = [0u8; 8];
        let n = source.read(&mut buf).await.unwrap();
        assert!(n > 0);
        assert_eq!(buf[0], 0x01);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // Accept but never send anything.
            let (_peer, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut source = TcpSource::connect(&addr.to_string(), None).await.unwrap();
        source
            .set_timeout(Some(Duration::from_millis(50)))
            .await
            .unwrap();

        let mut buf = [0u8; 8];
        match source.read(&mut buf).await {
            Err(SmlError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_eof_marks_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (peer, _) = listener.accept().await.unwrap();
            drop(peer);
        });

        let mut source = TcpSource::connect(&addr.to_string(), None).await.unwrap();
        let mut buf = [0u8; 8];
        let n = source.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
        assert!(source.is_closed());
    }
}
