//! Byte source trait for the codec's transport side

use async_trait::async_trait;
use sml_core::SmlResult;
use std::time::Duration;

/// Read-side access to a stream delivering SML telegrams.
///
/// Implementations do not expose a write half: the readout path never
/// transmits. A read timeout, once set, applies to every subsequent read.
#[async_trait]
pub trait ByteSource: Send {
    /// Set the read timeout. `None` waits indefinitely.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> SmlResult<()>;

    /// Read into `buf`, returning the number of bytes read; 0 means EOF.
    ///
    /// A lapsed read timeout surfaces as [`sml_core::SmlError::Timeout`].
    async fn read(&mut self, buf: &mut [u8]) -> SmlResult<usize>;

    /// Check if the source is closed
    fn is_closed(&self) -> bool;

    /// Close the source
    async fn close(&mut self) -> SmlResult<()>;
}
