//! Typed records decoded from a message bundle
//!
//! The record layout mirrors the SML response bodies needed for meter
//! readout: a file of messages framed by `SML_PublicOpen.Res` and
//! `SML_PublicClose.Res`, with `SML_GetList.Res` carrying the value list.

use serde::{Serialize, Serializer};
use sml_core::token::hex_string;
use sml_core::Token;

fn hex<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex_string(bytes))
}

fn hex_opt<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match bytes {
        Some(bytes) => serializer.serialize_some(&hex_string(bytes)),
        None => serializer.serialize_none(),
    }
}

/// One decoded SML file: every message between a start and end marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct File {
    pub messages: Vec<Message>,
}

/// A single SML message, always a list of six elements on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(serialize_with = "hex")]
    pub transaction_id: Vec<u8>,
    pub group_no: u8,
    pub abort_on_error: u8,
    pub body: MessageBody,
    pub crc16: u16,
    pub end_of_message: Token,
}

/// Message body, selected by the `SML_MessageBody` choice tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageBody {
    PublicOpenRes(PublicOpenRes),
    PublicCloseRes(PublicCloseRes),
    GetListRes(GetListRes),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicOpenRes {
    #[serde(serialize_with = "hex_opt")]
    pub codepage: Option<Vec<u8>>,
    #[serde(serialize_with = "hex_opt")]
    pub client_id: Option<Vec<u8>>,
    #[serde(serialize_with = "hex")]
    pub req_file_id: Vec<u8>,
    #[serde(serialize_with = "hex")]
    pub server_id: Vec<u8>,
    pub ref_time: Option<Token>,
    pub sml_version: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicCloseRes {
    #[serde(serialize_with = "hex_opt")]
    pub global_signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetListRes {
    #[serde(serialize_with = "hex_opt")]
    pub client_id: Option<Vec<u8>>,
    #[serde(serialize_with = "hex")]
    pub server_id: Vec<u8>,
    #[serde(serialize_with = "hex_opt")]
    pub list_name: Option<Vec<u8>>,
    pub act_sensor_time: Option<Token>,
    pub val_list: Vec<ListEntry>,
    #[serde(serialize_with = "hex_opt")]
    pub list_signature: Option<Vec<u8>>,
    pub act_gateway_time: Option<Token>,
}

/// One metered value with its OBIS name, scaler, and unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    #[serde(serialize_with = "hex")]
    pub obj_name: Vec<u8>,
    pub status: Option<StatusWord>,
    pub val_time: Option<Token>,
    pub unit: Option<u8>,
    pub scaler: Option<i8>,
    pub value: ListValue,
    #[serde(serialize_with = "hex_opt")]
    pub value_signature: Option<Vec<u8>>,
}

/// Status word of a list entry; width is whatever the meter sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusWord {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

/// Value of a list entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ListValue {
    Boolean(bool),
    Bytes(Vec<u8>),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Serialize for ListValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ListValue::Boolean(v) => serializer.serialize_bool(*v),
            ListValue::Bytes(bytes) => serializer.serialize_str(&hex_string(bytes)),
            ListValue::I8(v) => serializer.serialize_i8(*v),
            ListValue::I16(v) => serializer.serialize_i16(*v),
            ListValue::I32(v) => serializer.serialize_i32(*v),
            ListValue::I64(v) => serializer.serialize_i64(*v),
            ListValue::U8(v) => serializer.serialize_u8(*v),
            ListValue::U16(v) => serializer.serialize_u16(*v),
            ListValue::U32(v) => serializer.serialize_u32(*v),
            ListValue::U64(v) => serializer.serialize_u64(*v),
        }
    }
}
