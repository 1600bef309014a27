//! Serialization facade: one `SerializationMode` enum fronting three
//! codecs, so the wire layer and the persisted-population loader can
//! pick a format without caring which crate backs it.

pub mod binary;
pub mod text;
pub mod xml;

use serde::{de::DeserializeOwned, Serialize};

use crate::constants::{SERMODE_BINARY, SERMODE_TEXT, SERMODE_XML};
use crate::error::WireError;

/// Which codec a wire frame or persisted file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMode {
    Binary,
    Text,
    Xml,
}

impl SerializationMode {
    /// Maps to the single-digit tag sent on the wire: 0=binary,
    /// 1=text, 2=xml.
    pub fn wire_tag(self) -> u8 {
        match self {
            SerializationMode::Binary => SERMODE_BINARY,
            SerializationMode::Text => SERMODE_TEXT,
            SerializationMode::Xml => SERMODE_XML,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            SERMODE_BINARY => Ok(SerializationMode::Binary),
            SERMODE_TEXT => Ok(SerializationMode::Text),
            SERMODE_XML => Ok(SerializationMode::Xml),
            other => Err(WireError::Protocol(format!("unknown serialization mode {other}"))),
        }
    }

    /// Selects a mode from a persisted-population file extension, per
    /// the `.bin`/`.json`/`.xml` dispatch convention.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "bin" => Some(SerializationMode::Binary),
            "json" => Some(SerializationMode::Text),
            "xml" => Some(SerializationMode::Xml),
            _ => None,
        }
    }
}

/// Serializes `value` with the codec named by `mode`.
pub fn serialize<T: Serialize>(value: &T, mode: SerializationMode) -> Result<Vec<u8>, WireError> {
    match mode {
        SerializationMode::Binary => binary::to_bytes(value),
        SerializationMode::Text => text::to_bytes(value),
        SerializationMode::Xml => xml::to_bytes(value),
    }
}

/// Deserializes `bytes` with the codec named by `mode`.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8], mode: SerializationMode) -> Result<T, WireError> {
    match mode {
        SerializationMode::Binary => binary::from_bytes(bytes),
        SerializationMode::Text => text::from_bytes(bytes),
        SerializationMode::Xml => xml::from_bytes(bytes),
    }
}
