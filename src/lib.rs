//! Macro deck firmware.
//!
//! Buttons, rotary encoders and LEDs described by a JSON configuration
//! document are bound to keyboard and mouse actions, per profile. A host
//! tool reads and replaces the configuration over a framed serial link.
//!
//! Everything except the `board`, `usb` and `storage` modules is plain
//! logic written against the capability traits in [`hal`] and tests on
//! the host:
//!
//! Usage: `cargo test --lib` (unit tests) or `cargo test` (all)
//!
//! The embedded binary (`src/main.rs`, feature `embedded`) wires the
//! same logic to the nRF52840 peripherals.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod action;
pub mod config;
pub mod deck;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod hal;
pub mod hardware;
pub mod hid;
pub mod pattern;
pub mod profile;
pub mod serial;

#[cfg(test)]
mod mock;

#[cfg(feature = "embedded")]
pub mod board;
#[cfg(feature = "embedded")]
pub mod storage;
#[cfg(feature = "embedded")]
pub mod usb;

pub use deck::{Configuration, Deck};
pub use dispatch::{InputEvent, TickReport};
pub use error::{ConfigError, Error, LinkError, ProtocolError};
pub use hal::{Debouncer, PinController, PinMode, QuadratureDecoder};
pub use hid::{HidReport, HidSink, ReportQueue};
pub use serial::protocol::{ProtocolHandler, PumpSummary};
pub use serial::{MessageType, SerialLink, SerialMessage};
