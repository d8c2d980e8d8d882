//! TLV tokenizer
//!
//! Lifts the unescaped payload into a token stream. A TLV byte carries a
//! continuation flag (bit 7), the type (bits 6..4), and the low length
//! nibble (bits 3..0); at most one continuation byte is supported.

use crate::deframer::{Deframer, Payload};
use sml_core::{FrameTrailer, SmlError, SmlResult, Token};
use sml_transport::ByteSource;
use std::future::Future;
use std::pin::Pin;

/// Result of reading the next position in the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenRead {
    Token(Token),
    /// A fresh start marker interrupted the current frame.
    Start,
    /// The end marker terminating the frame.
    Trailer(FrameTrailer),
}

enum Data {
    Bytes(Vec<u8>),
    Signal(TokenRead),
}

/// Fetch payload bytes, early-returning frame signals to the caller.
macro_rules! fetch_bytes {
    ($self:ident, $n:expr) => {
        match $self.fetch($n).await? {
            Data::Bytes(bytes) => bytes,
            Data::Signal(signal) => return Ok(signal),
        }
    };
}

/// Tokenizer over a de-framed payload stream.
pub struct Tokenizer<S> {
    frame: Deframer<S>,
}

impl<S: ByteSource> Tokenizer<S> {
    pub fn new(source: S) -> Self {
        Self {
            frame: Deframer::new(source),
        }
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Deframer<S> {
        &mut self.frame
    }

    /// Read the next token, or surface a frame signal.
    pub async fn next_token(&mut self) -> SmlResult<TokenRead> {
        self.read_token().await
    }

    async fn fetch(&mut self, n: usize) -> SmlResult<Data> {
        Ok(match self.frame.read(n).await? {
            Payload::Bytes(bytes) => Data::Bytes(bytes),
            Payload::StartOfMessage => Data::Signal(TokenRead::Start),
            Payload::EndOfMessage(trailer) => Data::Signal(TokenRead::Trailer(trailer)),
        })
    }

    // Lists recurse through read_token; boxing breaks the future cycle.
    fn read_token<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = SmlResult<TokenRead>> + Send + 'a>> {
        Box::pin(async move {
            let first = fetch_bytes!(self, 1)[0];

            let type_id = (first & 0x70) >> 4;
            let mut length = (first & 0x0f) as usize;

            if first & 0x80 != 0 {
                let next = fetch_bytes!(self, 1)[0];

                if next & 0x80 != 0 {
                    return Err(SmlError::Token(
                        "only type-length fields with up to two bytes are supported".to_string(),
                    ));
                }

                let mode = (next & 0x70) >> 4;
                if mode != 0 {
                    return Err(SmlError::Token(format!(
                        "unknown mode {:x} for second type-length byte",
                        mode
                    )));
                }

                length = (length << 4) | (next & 0x0f) as usize;
            }

            if type_id == 0 && length == 0 {
                return Ok(TokenRead::Token(Token::EndOfMessage));
            }

            match type_id {
                0x0 => self.read_octet_string(length).await,
                0x4 => self.read_boolean(length).await,
                0x5 | 0x6 => self.read_number(type_id, length).await,
                0x7 => self.read_list(length).await,
                other => Err(SmlError::Token(format!("unknown SML type {:x}", other))),
            }
        })
    }

    async fn read_octet_string(&mut self, length: usize) -> SmlResult<TokenRead> {
        if length == 0 {
            return Err(SmlError::Token(
                "invalid data length 0 for octet string".to_string(),
            ));
        }

        // The declared length counts the TLV byte itself; an empty octet
        // string arrives with declared length 1.
        let bytes = fetch_bytes!(self, length - 1);
        Ok(TokenRead::Token(Token::OctetString(bytes)))
    }

    async fn read_boolean(&mut self, length: usize) -> SmlResult<TokenRead> {
        if length != 2 {
            return Err(SmlError::Token(format!(
                "invalid data length {} for SML boolean",
                length
            )));
        }

        let bytes = fetch_bytes!(self, 1);
        Ok(TokenRead::Token(Token::Boolean(bytes[0] != 0x00)))
    }

    async fn read_number(&mut self, type_id: u8, length: usize) -> SmlResult<TokenRead> {
        let real_length = length.checked_sub(1).ok_or_else(|| {
            SmlError::Token(format!(
                "unsupported numeric SML type with type {:x} and length {}",
                type_id, length
            ))
        })?;

        let bytes = fetch_bytes!(self, real_length);

        // Tolerate malformed senders: 3-byte values widen to 4, 5..7-byte
        // values widen to 8, left-zero-padded. Canonical encoders only emit
        // widths 1, 2, 4, and 8.
        let width = match real_length {
            3 => 4,
            5..=7 => 8,
            n => n,
        };

        let mut data = vec![0u8; width - bytes.len()];
        data.extend_from_slice(&bytes);

        let signed = type_id == 0x5;
        let token = match (signed, width) {
            (true, 1) => Token::I8(data[0] as i8),
            (true, 2) => Token::I16(i16::from_be_bytes([data[0], data[1]])),
            (true, 4) => Token::I32(i32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            (true, 8) => Token::I64(i64::from_be_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ])),
            (false, 1) => Token::U8(data[0]),
            (false, 2) => Token::U16(u16::from_be_bytes([data[0], data[1]])),
            (false, 4) => Token::U32(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            (false, 8) => Token::U64(u64::from_be_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ])),
            _ => {
                return Err(SmlError::Token(format!(
                    "unsupported numeric SML type with type {:x} and length {}",
                    type_id, length
                )))
            }
        };

        Ok(TokenRead::Token(token))
    }

    async fn read_list(&mut self, element_count: usize) -> SmlResult<TokenRead> {
        let mut items = Vec::with_capacity(element_count);

        for _ in 0..element_count {
            match self.read_token().await? {
                TokenRead::Token(token) => items.push(token),
                signal => return Ok(signal),
            }
        }

        Ok(TokenRead::Token(Token::List(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sml_transport::IoSource;

    const START: [u8; 8] = [0x1b, 0x1b, 0x1b, 0x1b, 0x01, 0x01, 0x01, 0x01];

    /// Tokenizer positioned just past a start marker so payload reads work.
    async fn tokenizer_for(payload: &[u8]) -> Tokenizer<IoSource<std::io::Cursor<Vec<u8>>>> {
        let mut wire = START.to_vec();
        wire.extend_from_slice(payload);

        let mut tokens = Tokenizer::new(IoSource::new(std::io::Cursor::new(wire)));
        match tokens.frame_mut().read(1).await.unwrap() {
            Payload::StartOfMessage => {}
            other => panic!("expected start of message, got {:?}", other),
        }
        tokens
    }

    async fn token_of(payload: &[u8]) -> Token {
        let mut tokens = tokenizer_for(payload).await;
        match tokens.next_token().await.unwrap() {
            TokenRead::Token(token) => token,
            other => panic!("expected token, got {:?}", other),
        }
    }

    async fn error_of(payload: &[u8]) -> SmlError {
        let mut tokens = tokenizer_for(payload).await;
        tokens.next_token().await.unwrap_err()
    }

    #[tokio::test]
    async fn test_end_of_message_token() {
        assert_eq!(token_of(&[0x00]).await, Token::EndOfMessage);
    }

    #[tokio::test]
    async fn test_octet_string() {
        assert_eq!(
            token_of(&[0x04, 0xde, 0xad, 0xbe]).await,
            Token::OctetString(vec![0xde, 0xad, 0xbe])
        );
    }

    #[tokio::test]
    async fn test_empty_octet_string() {
        assert_eq!(token_of(&[0x01]).await, Token::OctetString(vec![]));
    }

    #[tokio::test]
    async fn test_two_byte_length() {
        // Continuation byte: length (0x1 << 4) | 0x2 = 18, so 17 data bytes.
        let mut payload = vec![0x81, 0x02];
        payload.extend(std::iter::repeat(0x55).take(17));
        assert_eq!(token_of(&payload).await, Token::OctetString(vec![0x55; 17]));
    }

    #[tokio::test]
    async fn test_three_byte_length_rejected() {
        match error_of(&[0x81, 0x82, 0x01]).await {
            SmlError::Token(message) => assert!(message.contains("two bytes")),
            other => panic!("expected token error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_continuation_mode_rejected() {
        match error_of(&[0x81, 0x12, 0x01]).await {
            SmlError::Token(message) => assert!(message.contains("mode")),
            other => panic!("expected token error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_boolean() {
        assert_eq!(token_of(&[0x42, 0x01]).await, Token::Boolean(true));
        assert_eq!(token_of(&[0x42, 0x00]).await, Token::Boolean(false));
        assert_eq!(token_of(&[0x42, 0xff]).await, Token::Boolean(true));
    }

    #[tokio::test]
    async fn test_boolean_bad_length() {
        assert!(matches!(error_of(&[0x43, 0x01, 0x01]).await, SmlError::Token(_)));
    }

    #[tokio::test]
    async fn test_unsigned_widths() {
        assert_eq!(token_of(&[0x62, 0x2a]).await, Token::U8(42));
        assert_eq!(token_of(&[0x63, 0x01, 0x00]).await, Token::U16(256));
        assert_eq!(
            token_of(&[0x65, 0x00, 0x01, 0xe2, 0x40]).await,
            Token::U32(123456)
        );
        assert_eq!(
            token_of(&[0x69, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]).await,
            Token::U64(256)
        );
    }

    #[tokio::test]
    async fn test_signed_widths() {
        assert_eq!(token_of(&[0x52, 0xd6]).await, Token::I8(-42));
        assert_eq!(token_of(&[0x53, 0xff, 0xfe]).await, Token::I16(-2));
        assert_eq!(
            token_of(&[0x55, 0xff, 0xff, 0xff, 0xff]).await,
            Token::I32(-1)
        );
    }

    #[tokio::test]
    async fn test_width_normalization() {
        // Three payload bytes widen to a u32.
        assert_eq!(
            token_of(&[0x64, 0x01, 0x00, 0x00]).await,
            Token::U32(0x010000)
        );
        // Five through seven payload bytes widen to a u64.
        assert_eq!(
            token_of(&[0x66, 0x01, 0x00, 0x00, 0x00, 0x00]).await,
            Token::U64(0x01_0000_0000)
        );
        assert_eq!(
            token_of(&[0x68, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).await,
            Token::U64(0x0001_0000_0000_0000)
        );
    }

    #[tokio::test]
    async fn test_width_normalization_preserves_positive_signed() {
        // A positive signed value encoded with 3 payload bytes survives the
        // left-zero padding to 4 bytes.
        assert_eq!(
            token_of(&[0x54, 0x01, 0xe2, 0x40]).await,
            Token::I32(123456)
        );
    }

    #[tokio::test]
    async fn test_unknown_type() {
        assert!(matches!(error_of(&[0x12, 0x00]).await, SmlError::Token(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let payload = [0x73, 0x62, 0x01, 0x62, 0x02, 0x62, 0x03];
        assert_eq!(
            token_of(&payload).await,
            Token::List(vec![Token::U8(1), Token::U8(2), Token::U8(3)])
        );
    }

    #[tokio::test]
    async fn test_nested_list() {
        let payload = [0x72, 0x71, 0x62, 0x07, 0x01];
        assert_eq!(
            token_of(&payload).await,
            Token::List(vec![
                Token::List(vec![Token::U8(7)]),
                Token::OctetString(vec![]),
            ])
        );
    }

    #[tokio::test]
    async fn test_trailer_mid_list_propagates() {
        // A list announcing two elements but interrupted by the end marker.
        let mut payload = vec![0x72, 0x62, 0x01];
        payload.extend_from_slice(&[0x1b, 0x1b, 0x1b, 0x1b, 0x1a, 0x00, 0x00, 0x00]);

        let mut tokens = tokenizer_for(&payload).await;
        match tokens.next_token().await.unwrap() {
            TokenRead::Trailer(trailer) => assert_eq!(trailer.padding_count, 0),
            other => panic!("expected trailer, got {:?}", other),
        }
    }
}
