//! SML (Smart Message Language) codec
//!
//! Decodes the binary telegram format of IEC 62056-58 smart meters into
//! typed records, layer by layer:
//!
//! - [`deframer`]: strips the escape-sequence transport layer and keeps a
//!   running CRC-16/X-25 over the framed bytes
//! - [`tokenizer`]: lexes the unescaped payload into TLV tokens
//! - [`bundler`]: groups top-level tokens into one frame's message bundle
//!   and validates the trailer
//! - [`decode`]: lifts raw token lists into typed records
//! - [`reader`]: ties the layers together behind [`SmlReader::read_file`]
//!
//! Malformed input is never fatal: the reader discards a broken frame and
//! resynchronizes on the next start marker. Only byte-source errors reach
//! the caller.

pub mod bundler;
pub mod crc;
pub mod decode;
pub mod deframer;
pub mod reader;
pub mod records;
pub mod tokenizer;

pub use bundler::MessageBundle;
pub use reader::SmlReader;
pub use records::{
    File, GetListRes, ListEntry, ListValue, Message, MessageBody, PublicCloseRes, PublicOpenRes,
    StatusWord,
};
