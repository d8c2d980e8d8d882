//! Raw token data model produced by the TLV tokenizer

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// A single TLV token from the unescaped frame payload.
///
/// Integer variants carry the width the value was normalized to; lists own
/// their children. A complete SML message arrives as one top-level list.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    OctetString(Vec<u8>),
    Boolean(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    List(Vec<Token>),
    /// A single zero-byte TLV; terminates a message and pads the frame tail.
    EndOfMessage,
}

impl Token {
    /// The canonical "absent" marker for optional fields.
    pub fn is_empty_octet_string(&self) -> bool {
        matches!(self, Token::OctetString(bytes) if bytes.is_empty())
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::OctetString(_) => "octet string",
            Token::Boolean(_) => "boolean",
            Token::I8(_) => "int8",
            Token::I16(_) => "int16",
            Token::I32(_) => "int32",
            Token::I64(_) => "int64",
            Token::U8(_) => "uint8",
            Token::U16(_) => "uint16",
            Token::U32(_) => "uint32",
            Token::U64(_) => "uint64",
            Token::List(_) => "list",
            Token::EndOfMessage => "end of message",
        }
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Token::OctetString(bytes) => serializer.serialize_str(&hex_string(bytes)),
            Token::Boolean(v) => serializer.serialize_bool(*v),
            Token::I8(v) => serializer.serialize_i8(*v),
            Token::I16(v) => serializer.serialize_i16(*v),
            Token::I32(v) => serializer.serialize_i32(*v),
            Token::I64(v) => serializer.serialize_i64(*v),
            Token::U8(v) => serializer.serialize_u8(*v),
            Token::U16(v) => serializer.serialize_u16(*v),
            Token::U32(v) => serializer.serialize_u32(*v),
            Token::U64(v) => serializer.serialize_u64(*v),
            Token::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Token::EndOfMessage => serializer.serialize_unit(),
        }
    }
}

/// Lowercase hex rendering used wherever raw octet strings surface in JSON.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Frame summary returned by the de-framer at the end-of-message marker.
///
/// `payload_length` counts every byte the CRC ran over: the eight start
/// marker bytes, the escaped payload as it appeared on the wire, and the
/// first six bytes of the end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTrailer {
    pub padding_count: u8,
    pub expected_crc: u16,
    pub computed_crc: u16,
    pub payload_length: usize,
}

impl FrameTrailer {
    pub fn crc_ok(&self) -> bool {
        self.expected_crc == self.computed_crc
    }
}
