//! Public reader API: byte source in, decoded files out

use crate::bundler::read_bundle;
use crate::decode::decode_file;
use crate::records::File;
use crate::tokenizer::Tokenizer;
use sml_core::SmlResult;
use sml_transport::ByteSource;

/// Reader decoding SML files from a byte source.
///
/// Each meter connection owns its own reader; after a source error the
/// reader's buffers are poisoned and a fresh reader must be built on a new
/// source.
pub struct SmlReader<S> {
    tokens: Tokenizer<S>,
}

impl<S: ByteSource> SmlReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            tokens: Tokenizer::new(source),
        }
    }

    /// Read the next successfully decoded file.
    ///
    /// Malformed frames are discarded and scanning resumes at the next
    /// start marker. Only byte-source errors (connection loss, timeout,
    /// EOF) surface to the caller.
    pub async fn read_file(&mut self) -> SmlResult<File> {
        loop {
            let bundle = match read_bundle(&mut self.tokens).await {
                Ok(bundle) => bundle,
                Err(e) if e.is_recoverable() => {
                    log::debug!("discarding frame: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match decode_file(&bundle) {
                Ok(file) => return Ok(file),
                Err(e) if e.is_recoverable() => {
                    log::debug!("discarding undecodable frame: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
