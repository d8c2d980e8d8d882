//! Schema-directed decoding of raw token lists into typed records
//!
//! Each record walks its wire list in lock-step with its field order. The
//! slot helpers own the shared rules: an optional slot encoded as an empty
//! octet string is absent, an explicit choice is a two-element list keyed
//! by a widened unsigned tag, and an implicit choice binds on the token's
//! own type.

use crate::bundler::MessageBundle;
use crate::records::{
    File, GetListRes, ListEntry, ListValue, Message, MessageBody, PublicCloseRes, PublicOpenRes,
    StatusWord,
};
use sml_core::{SmlError, SmlResult, Token};

fn struct_list<'a>(token: &'a Token, what: &str, arity: usize) -> SmlResult<&'a [Token]> {
    match token {
        Token::List(items) if items.len() == arity => Ok(items),
        Token::List(items) => Err(SmlError::Schema(format!(
            "{}: struct size mismatch: expected {} elements, got {}",
            what,
            arity,
            items.len()
        ))),
        other => Err(SmlError::Schema(format!(
            "{} must be decoded from a list, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn required_bytes(token: &Token, what: &str) -> SmlResult<Vec<u8>> {
    match token {
        Token::OctetString(bytes) => Ok(bytes.clone()),
        other => Err(SmlError::Schema(format!(
            "{}: expected octet string, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn optional_bytes(token: &Token, what: &str) -> SmlResult<Option<Vec<u8>>> {
    match token {
        Token::OctetString(bytes) if bytes.is_empty() => Ok(None),
        Token::OctetString(bytes) => Ok(Some(bytes.clone())),
        other => Err(SmlError::Schema(format!(
            "{}: expected octet string, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn required_u8(token: &Token, what: &str) -> SmlResult<u8> {
    match token {
        Token::U8(value) => Ok(*value),
        other => Err(SmlError::Schema(format!(
            "{}: type mismatch: expected uint8, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn required_u16(token: &Token, what: &str) -> SmlResult<u16> {
    match token {
        Token::U16(value) => Ok(*value),
        other => Err(SmlError::Schema(format!(
            "{}: type mismatch: expected uint16, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn optional_u8(token: &Token, what: &str) -> SmlResult<Option<u8>> {
    match token {
        Token::U8(value) => Ok(Some(*value)),
        _ if token.is_empty_octet_string() => Ok(None),
        other => Err(SmlError::Schema(format!(
            "{}: type mismatch: expected uint8, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn optional_i8(token: &Token, what: &str) -> SmlResult<Option<i8>> {
    match token {
        Token::I8(value) => Ok(Some(*value)),
        _ if token.is_empty_octet_string() => Ok(None),
        other => Err(SmlError::Schema(format!(
            "{}: type mismatch: expected int8, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Opaque slot: the raw token is retained, empty octet string means absent.
fn optional_any(token: &Token) -> Option<Token> {
    if token.is_empty_octet_string() {
        None
    } else {
        Some(token.clone())
    }
}

impl Message {
    pub(crate) fn decode(token: &Token) -> SmlResult<Self> {
        let items = struct_list(token, "SML message", 6)?;

        Ok(Self {
            transaction_id: required_bytes(&items[0], "transaction id")?,
            group_no: required_u8(&items[1], "group no")?,
            abort_on_error: required_u8(&items[2], "abort on error")?,
            body: MessageBody::decode(&items[3])?,
            crc16: required_u16(&items[4], "message crc")?,
            end_of_message: items[5].clone(),
        })
    }
}

impl MessageBody {
    /// Explicit choice: `[tag, value]` with the tag widened to uint32.
    fn decode(token: &Token) -> SmlResult<Self> {
        let items = match token {
            Token::List(items) if items.len() == 2 => items,
            _ => {
                return Err(SmlError::Schema(
                    "message body choice must be a list with 2 elements".to_string(),
                ))
            }
        };

        // The tag SHOULD be a uint32, but MAY be encoded narrower when no
        // ambiguity is created.
        let tag = match &items[0] {
            Token::U8(value) => *value as u32,
            Token::U16(value) => *value as u32,
            Token::U32(value) => *value,
            other => {
                return Err(SmlError::Schema(format!(
                    "message body tag: expected uint32, got {}",
                    other.type_name()
                )))
            }
        };

        match tag {
            0x0000_0101 => Ok(Self::PublicOpenRes(PublicOpenRes::decode(&items[1])?)),
            0x0000_0201 => Ok(Self::PublicCloseRes(PublicCloseRes::decode(&items[1])?)),
            0x0000_0701 => Ok(Self::GetListRes(GetListRes::decode(&items[1])?)),
            other => Err(SmlError::Schema(format!(
                "unsupported SML message {:08x}",
                other
            ))),
        }
    }
}

impl PublicOpenRes {
    fn decode(token: &Token) -> SmlResult<Self> {
        let items = struct_list(token, "SML_PublicOpen.Res", 6)?;

        Ok(Self {
            codepage: optional_bytes(&items[0], "codepage")?,
            client_id: optional_bytes(&items[1], "client id")?,
            req_file_id: required_bytes(&items[2], "req file id")?,
            server_id: required_bytes(&items[3], "server id")?,
            ref_time: optional_any(&items[4]),
            sml_version: optional_u8(&items[5], "sml version")?,
        })
    }
}

impl PublicCloseRes {
    fn decode(token: &Token) -> SmlResult<Self> {
        let items = struct_list(token, "SML_PublicClose.Res", 1)?;

        Ok(Self {
            global_signature: optional_bytes(&items[0], "global signature")?,
        })
    }
}

impl GetListRes {
    fn decode(token: &Token) -> SmlResult<Self> {
        let items = struct_list(token, "SML_GetList.Res", 7)?;

        let val_list = match &items[4] {
            Token::List(entries) => {
                let mut list = Vec::with_capacity(entries.len());
                for entry in entries {
                    list.push(ListEntry::decode(entry)?);
                }
                list
            }
            other => {
                return Err(SmlError::Schema(format!(
                    "val list must be decoded from a list, got {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            client_id: optional_bytes(&items[0], "client id")?,
            server_id: required_bytes(&items[1], "server id")?,
            list_name: optional_bytes(&items[2], "list name")?,
            act_sensor_time: optional_any(&items[3]),
            val_list,
            list_signature: optional_bytes(&items[5], "list signature")?,
            act_gateway_time: optional_any(&items[6]),
        })
    }
}

impl ListEntry {
    fn decode(token: &Token) -> SmlResult<Self> {
        let items = struct_list(token, "SML list entry", 7)?;

        Ok(Self {
            obj_name: required_bytes(&items[0], "obj name")?,
            status: StatusWord::decode_optional(&items[1])?,
            val_time: optional_any(&items[2]),
            unit: optional_u8(&items[3], "unit")?,
            scaler: optional_i8(&items[4], "scaler")?,
            value: ListValue::decode(&items[5])?,
            value_signature: optional_bytes(&items[6], "value signature")?,
        })
    }
}

impl StatusWord {
    /// Implicit choice over the unsigned widths, optional.
    fn decode_optional(token: &Token) -> SmlResult<Option<Self>> {
        let status = match token {
            Token::U8(value) => Self::U8(*value),
            Token::U16(value) => Self::U16(*value),
            Token::U32(value) => Self::U32(*value),
            Token::U64(value) => Self::U64(*value),
            _ if token.is_empty_octet_string() => return Ok(None),
            other => {
                return Err(SmlError::Schema(format!(
                    "status: no implicit choice matched {}",
                    other.type_name()
                )))
            }
        };
        Ok(Some(status))
    }
}

impl ListValue {
    /// Implicit choice over boolean, octet string, and the integer widths.
    fn decode(token: &Token) -> SmlResult<Self> {
        Ok(match token {
            Token::Boolean(value) => Self::Boolean(*value),
            Token::OctetString(bytes) => Self::Bytes(bytes.clone()),
            Token::I8(value) => Self::I8(*value),
            Token::I16(value) => Self::I16(*value),
            Token::I32(value) => Self::I32(*value),
            Token::I64(value) => Self::I64(*value),
            Token::U8(value) => Self::U8(*value),
            Token::U16(value) => Self::U16(*value),
            Token::U32(value) => Self::U32(*value),
            Token::U64(value) => Self::U64(*value),
            other => {
                return Err(SmlError::Schema(format!(
                    "value: no implicit choice matched {}",
                    other.type_name()
                )))
            }
        })
    }
}

/// Decode every message of a bundle and enforce the file shape: at least
/// two messages, opened by `SML_PublicOpen.Res`, closed by
/// `SML_PublicClose.Res`, with neither in between.
pub fn decode_file(bundle: &MessageBundle) -> SmlResult<File> {
    let mut messages = Vec::with_capacity(bundle.messages.len());
    for raw in &bundle.messages {
        messages.push(Message::decode(raw)?);
    }

    if messages.len() < 2 {
        return Err(SmlError::File(
            "an SML file must contain at least two messages".to_string(),
        ));
    }

    if !matches!(messages[0].body, MessageBody::PublicOpenRes(_)) {
        return Err(SmlError::File(
            "an SML file must begin with a SML_PublicOpen.Res message".to_string(),
        ));
    }

    if !matches!(messages[messages.len() - 1].body, MessageBody::PublicCloseRes(_)) {
        return Err(SmlError::File(
            "an SML file must end with a SML_PublicClose.Res message".to_string(),
        ));
    }

    for message in &messages[1..messages.len() - 1] {
        if matches!(
            message.body,
            MessageBody::PublicOpenRes(_) | MessageBody::PublicCloseRes(_)
        ) {
            return Err(SmlError::File(
                "an SML file must not contain a SML_PublicOpen.Res or SML_PublicClose.Res message in the middle".to_string(),
            ));
        }
    }

    Ok(File { messages })
}
