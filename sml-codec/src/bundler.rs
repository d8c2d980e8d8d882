//! Token bundler
//!
//! Groups top-level tokens between a start and end marker into a message
//! bundle and validates the frame trailer: payload alignment, padding byte
//! count, and CRC.

use crate::deframer::Payload;
use crate::tokenizer::{TokenRead, Tokenizer};
use sml_core::{FrameTrailer, SmlError, SmlResult, Token};
use sml_transport::ByteSource;

/// The top-level message lists of one frame plus its verified trailer.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBundle {
    pub messages: Vec<Token>,
    pub trailer: FrameTrailer,
}

/// Read one frame worth of top-level tokens.
///
/// Scans the stream for the next start marker, then collects message lists
/// and trailing padding until the end marker. Padding tokens may only
/// appear at the frame tail, at most three of them.
pub(crate) async fn read_bundle<S: ByteSource>(
    tokens: &mut Tokenizer<S>,
) -> SmlResult<MessageBundle> {
    tokens.frame_mut().reset_frame_state();

    // Seek the start marker, discarding everything in between.
    loop {
        match tokens.frame_mut().read(1).await? {
            Payload::StartOfMessage => break,
            Payload::Bytes(_) | Payload::EndOfMessage(_) => continue,
        }
    }

    let mut messages: Vec<Token> = Vec::new();
    let mut padding: u8 = 0;

    let trailer = loop {
        match tokens.next_token().await? {
            TokenRead::Start => {
                // The de-framer already reset payload and CRC state; restart
                // collection from the fresh frame.
                messages.clear();
                padding = 0;
            }
            TokenRead::Trailer(trailer) => break trailer,
            TokenRead::Token(Token::EndOfMessage) => {
                padding += 1;
                if padding > 3 {
                    // 0 to 3 zero bytes may pad the frame tail.
                    return Err(SmlError::Framing(
                        "excessive padding bytes found".to_string(),
                    ));
                }
            }
            TokenRead::Token(token) => {
                if padding > 0 {
                    return Err(SmlError::Framing(
                        "unexpected data after end of message marker".to_string(),
                    ));
                }

                match token {
                    Token::List(_) => messages.push(token),
                    other => {
                        return Err(SmlError::Framing(format!(
                            "expected SML list at top level, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
        }
    };

    if (trailer.payload_length - 2) % 4 != 0 {
        return Err(SmlError::Framing(
            "frame data must be divisible by 4".to_string(),
        ));
    }

    if trailer.padding_count != padding {
        return Err(SmlError::Framing(format!(
            "expected {} padding bytes, found {}",
            trailer.padding_count, padding
        )));
    }

    if !trailer.crc_ok() {
        return Err(SmlError::Framing(format!(
            "crc error: expected {:04x}, calculated {:04x}",
            trailer.expected_crc, trailer.computed_crc
        )));
    }

    Ok(MessageBundle { messages, trailer })
}
