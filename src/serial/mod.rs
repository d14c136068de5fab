//! Host link: framed messages over the CDC-ACM serial port.
//!
//! Frame layout (integers big-endian):
//! ```text
//! 0xFF | type | id | length (i32) | data[length]
//! ```
//! [`framer`] turns bytes into [`SerialMessage`]s and back;
//! [`protocol`] answers host requests and emits device notifications.

pub mod framer;
pub mod protocol;

#[cfg(test)]
mod tests;

use alloc::vec::Vec;

use crate::error::{Error, LinkError};

/// Marks the first byte of every frame.
pub const FRAME_START: u8 = 0xFF;

/// Bytes after the start marker and before the payload.
pub const HEADER_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    RequestIdentify = 0,
    RespondIdentify = 1,
    RequestConfig = 2,
    RespondConfig = 3,
    RespondEmpty = 4,
    RespondError = 5,
    RespondOk = 6,
    ChangeConfig = 7,
    RequestReset = 8,
    IdentLed = 9,
    IdentEncoder = 10,
    IdentButton = 11,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MessageType::RequestIdentify,
            1 => MessageType::RespondIdentify,
            2 => MessageType::RequestConfig,
            3 => MessageType::RespondConfig,
            4 => MessageType::RespondEmpty,
            5 => MessageType::RespondError,
            6 => MessageType::RespondOk,
            7 => MessageType::ChangeConfig,
            8 => MessageType::RequestReset,
            9 => MessageType::IdentLed,
            10 => MessageType::IdentEncoder,
            11 => MessageType::IdentButton,
            other => return Err(Error::UnknownMessageType(other)),
        })
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> u8 {
        kind as u8
    }
}

/// One decoded frame. `kind` is kept raw so unknown types can still be
/// answered with the request id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialMessage {
    pub id: u8,
    pub kind: u8,
    pub data: Vec<u8>,
}

impl SerialMessage {
    pub fn new(kind: MessageType, id: u8, data: Vec<u8>) -> Self {
        Self {
            id,
            kind: kind.into(),
            data,
        }
    }

    pub fn message_type(&self) -> Result<MessageType, Error> {
        MessageType::try_from(self.kind)
    }
}

/// Byte stream to the host.
///
/// Reads never block: `None` means no byte is available right now.
pub trait SerialLink {
    /// A host has the port open.
    fn is_connected(&self) -> bool;

    fn peek_byte(&mut self) -> Option<u8>;

    fn read_byte(&mut self) -> Option<u8>;

    /// Queue `bytes` for transmission, all or nothing.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}
