//! Unified error types for macrodeck.
//!
//! Error values carry only fixed-size data (field names are `&'static str`)
//! so they can be logged with `defmt` and copied freely. `Display` gives
//! the text sent back to the host in `RESPOND_ERROR` payloads.

use core::fmt;

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A configuration document was rejected.
    Config(ConfigError),

    /// A serial frame was malformed.
    Protocol(ProtocolError),

    /// The serial link could not be used.
    Link(LinkError),

    /// The host sent a message type the device does not handle.
    UnknownMessageType(u8),
}

/// Reasons a configuration rebuild fails. The previous configuration
/// stays live whenever one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The document is not valid JSON.
    Syntax,

    /// A required field is absent.
    MissingField(&'static str),

    /// A field has the wrong type or is out of range.
    InvalidField(&'static str),

    /// Two components share an identifier.
    DuplicateComponent(u16),

    /// A profile binds the same component twice.
    DuplicateBinding(u16),

    /// A binding targets an id that is not a button or encoder.
    UnknownInput(u16),

    /// A feedback pattern targets an id that is not an LED.
    UnknownLed(u16),

    /// The document declares no profiles.
    NoProfiles,
}

/// Malformed frame header. The decoder drops the frame and waits for
/// the next start byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Declared payload length below zero.
    NegativeLength(i32),

    /// Declared payload length above `MAX_FRAME_DATA`.
    LengthTooLarge(i32),
}

/// Serial link failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No host has the port open.
    NotConnected,

    /// The transmit buffer could not take the whole frame.
    Overflow,
}

// Convenience conversions

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax => f.write_str("config is not valid JSON"),
            ConfigError::MissingField(name) => write!(f, "missing field `{}`", name),
            ConfigError::InvalidField(name) => write!(f, "invalid value for `{}`", name),
            ConfigError::DuplicateComponent(id) => write!(f, "duplicate component id {}", id),
            ConfigError::DuplicateBinding(id) => write!(f, "component {} bound twice", id),
            ConfigError::UnknownInput(id) => write!(f, "no button or encoder with id {}", id),
            ConfigError::UnknownLed(id) => write!(f, "no led with id {}", id),
            ConfigError::NoProfiles => f.write_str("config declares no profiles"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NegativeLength(len) => write!(f, "negative frame length {}", len),
            ProtocolError::LengthTooLarge(len) => write!(f, "frame length {} too large", len),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::NotConnected => f.write_str("serial link not connected"),
            LinkError::Overflow => f.write_str("serial transmit buffer full"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => e.fmt(f),
            Error::Protocol(e) => e.fmt(f),
            Error::Link(e) => e.fmt(f),
            Error::UnknownMessageType(t) => write!(f, "unknown message type {}", t),
        }
    }
}
