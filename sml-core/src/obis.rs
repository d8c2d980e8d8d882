//! OBIS (Object Identification System) identifiers

use crate::error::{SmlError, SmlResult};
use serde::{Serialize, Serializer};
use std::convert::TryFrom;
use std::fmt;

/// Six-byte OBIS identifier naming a metered quantity.
///
/// Rendered as `A-B:C.D.E*F` with decimal components, e.g. the total active
/// energy register `1-0:1.8.0*255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    pub fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }
}

impl TryFrom<&[u8]> for ObisCode {
    type Error = SmlError;

    fn try_from(value: &[u8]) -> SmlResult<Self> {
        let bytes: [u8; 6] = value
            .try_into()
            .map_err(|_| SmlError::Schema("OBIS values must consist of 6 bytes".to_string()))?;
        Ok(Self { bytes })
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{}.{}.{}*{}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

impl Serialize for ObisCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
