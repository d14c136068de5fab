//! Request handling on the host link.
//!
//! Each decoded frame is handled to completion before the next one is
//! read. Responses echo the request's id; device-originated messages get
//! ids from [`RequestIds`].

use alloc::string::ToString;
use alloc::vec::Vec;
use serde::Serialize;

use super::framer::{encode, join_bytes_to_int, split_int_to_bytes, Decoded, FrameDecoder};
use super::{MessageType, SerialLink, SerialMessage, FRAME_START};
use crate::config::{FIRMWARE_VERSION, USB_PRODUCT, USB_SERIAL_NUMBER};
use crate::deck::Deck;
use crate::dispatch::InputEvent;
use crate::error::{ConfigError, Error, LinkError};
use crate::hal::{Debouncer, PinController, QuadratureDecoder};
use crate::hardware::ComponentCounts;

/// Allocator for device-originated message ids. Never yields 0.
#[derive(Debug)]
pub struct RequestIds {
    next: u8,
}

impl RequestIds {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> u8 {
        let id = self.next;
        self.next = match self.next.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// How a single request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Responded,
    /// A new configuration was installed.
    ConfigChanged,
    /// The host asked for a restart; the caller performs it.
    ResetRequested,
    /// Nothing to answer.
    Ignored,
}

/// What one [`ProtocolHandler::pump`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub frames: usize,
    pub errors: usize,
    pub config_changed: bool,
    pub reset_requested: bool,
}

#[derive(Serialize)]
struct Identity<'a> {
    name: &'a str,
    version: &'a str,
    serial: &'a str,
    configured: bool,
    components: ComponentCounts,
    profiles: usize,
    active: &'a str,
}

#[derive(Debug, Default)]
pub struct ProtocolHandler {
    decoder: FrameDecoder,
    ids: RequestIds,
    connected: bool,
}

impl ProtocolHandler {
    pub const fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
            ids: RequestIds::new(),
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Drain available input, handling every complete frame.
    ///
    /// Incidental bytes go to `passthrough`. Once it is full, reading
    /// stops at the next incidental byte and resumes on a later call.
    pub fn pump<L, P, D, Q, const N: usize>(
        &mut self,
        link: &mut L,
        deck: &mut Deck<D, Q>,
        pins: &mut P,
        passthrough: &mut heapless::Vec<u8, N>,
    ) -> PumpSummary
    where
        L: SerialLink,
        P: PinController,
        D: Debouncer,
        Q: QuadratureDecoder,
    {
        let mut summary = PumpSummary::default();
        if !self.track_connection(link) {
            return summary;
        }

        loop {
            if self.decoder.is_idle()
                && passthrough.is_full()
                && link.peek_byte() != Some(FRAME_START)
            {
                break;
            }

            match self.decoder.decode_next(link) {
                Decoded::Incomplete => break,
                Decoded::NotAFrame(byte) => {
                    let _ = passthrough.push(byte);
                }
                Decoded::Error(_) => summary.errors += 1,
                Decoded::Message(message) => {
                    summary.frames += 1;
                    match self.handle(&message, link, deck, pins) {
                        Outcome::ConfigChanged => summary.config_changed = true,
                        Outcome::ResetRequested => {
                            summary.reset_requested = true;
                            break;
                        }
                        Outcome::Responded | Outcome::Ignored => {}
                    }
                }
            }
        }
        summary
    }

    /// Answer one request.
    pub fn handle<L, P, D, Q>(
        &mut self,
        message: &SerialMessage,
        link: &mut L,
        deck: &mut Deck<D, Q>,
        pins: &mut P,
    ) -> Outcome
    where
        L: SerialLink,
        P: PinController,
        D: Debouncer,
        Q: QuadratureDecoder,
    {
        let id = message.id;
        let kind = match message.message_type() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Unhandled message type {}", message.kind);
                self.respond_error(link, id, &e);
                return Outcome::Responded;
            }
        };
        debug!("Request {} id {}", kind, id);

        match kind {
            MessageType::RequestIdentify => {
                let identity = Identity {
                    name: USB_PRODUCT,
                    version: FIRMWARE_VERSION,
                    serial: USB_SERIAL_NUMBER,
                    configured: deck.source().is_some(),
                    components: deck.hardware().counts(),
                    profiles: deck.profiles().len(),
                    active: &deck.active_profile().name,
                };
                match serde_json::to_vec(&identity) {
                    Ok(payload) => self.respond(link, MessageType::RespondIdentify, id, &payload),
                    Err(_) => self.respond_text(link, id, "identity unavailable"),
                }
                Outcome::Responded
            }
            MessageType::RequestConfig => {
                match deck.source() {
                    Some(source) => self.respond(link, MessageType::RespondConfig, id, source),
                    None => self.respond(link, MessageType::RespondEmpty, id, &[]),
                }
                Outcome::Responded
            }
            MessageType::ChangeConfig => match deck.rebuild(&message.data, pins) {
                Ok(()) => {
                    self.respond(link, MessageType::RespondOk, id, &[]);
                    Outcome::ConfigChanged
                }
                Err(e) => {
                    warn!("Rejected configuration: {}", e);
                    self.respond_error(link, id, &Error::Config(e));
                    Outcome::Responded
                }
            },
            MessageType::RequestReset => {
                info!("Reset requested by host");
                Outcome::ResetRequested
            }
            MessageType::IdentLed => {
                match led_id(&message.data).and_then(|led| deck.identify_led(led, pins)) {
                    Ok(()) => self.respond(link, MessageType::RespondOk, id, &[]),
                    Err(e) => self.respond_error(link, id, &Error::Config(e)),
                }
                Outcome::Responded
            }
            MessageType::RespondIdentify
            | MessageType::RespondConfig
            | MessageType::RespondEmpty
            | MessageType::RespondError
            | MessageType::RespondOk => Outcome::Ignored,
            MessageType::IdentEncoder | MessageType::IdentButton => {
                self.respond_error(link, id, &Error::UnknownMessageType(message.kind));
                Outcome::Responded
            }
        }
    }

    /// Send one frame with `id` exactly as given, 0 included.
    pub fn send<L: SerialLink>(
        &mut self,
        link: &mut L,
        kind: MessageType,
        id: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        if !link.is_connected() {
            return Err(LinkError::NotConnected.into());
        }
        let frame = encode(kind.into(), id, data)?;
        link.write_all(&frame)?;
        Ok(())
    }

    /// Send a device-originated frame under a freshly allocated id.
    /// Returns that id.
    pub fn send_auto<L: SerialLink>(
        &mut self,
        link: &mut L,
        kind: MessageType,
        data: &[u8],
    ) -> Result<u8, Error> {
        if !link.is_connected() {
            return Err(LinkError::NotConnected.into());
        }
        let id = self.ids.allocate();
        self.send(link, kind, id, data)?;
        Ok(id)
    }

    /// Tell the host about an input edge.
    pub fn notify_input<L: SerialLink>(&mut self, link: &mut L, event: &InputEvent) -> Result<u8, Error> {
        let mut payload = Vec::with_capacity(8);
        let kind = match *event {
            InputEvent::Button { id, pressed } => {
                payload.extend_from_slice(&split_int_to_bytes(i32::from(id)));
                payload.push(u8::from(pressed));
                MessageType::IdentButton
            }
            InputEvent::Encoder { id, delta } => {
                payload.extend_from_slice(&split_int_to_bytes(i32::from(id)));
                payload.extend_from_slice(&split_int_to_bytes(delta));
                MessageType::IdentEncoder
            }
        };
        self.send_auto(link, kind, &payload)
    }

    fn track_connection<L: SerialLink>(&mut self, link: &L) -> bool {
        let connected = link.is_connected();
        if connected && !self.connected {
            info!("Host connected");
            self.ids.reset();
            self.decoder.reset();
        } else if !connected && self.connected {
            info!("Host disconnected");
        }
        self.connected = connected;
        connected
    }

    fn respond<L: SerialLink>(&mut self, link: &mut L, kind: MessageType, id: u8, data: &[u8]) {
        if let Err(e) = self.send(link, kind, id, data) {
            warn!("Response {} dropped: {}", kind, e);
        }
    }

    fn respond_text<L: SerialLink>(&mut self, link: &mut L, id: u8, text: &str) {
        self.respond(link, MessageType::RespondError, id, text.as_bytes());
    }

    fn respond_error<L: SerialLink>(&mut self, link: &mut L, id: u8, error: &Error) {
        self.respond_text(link, id, &error.to_string());
    }
}

fn led_id(data: &[u8]) -> Result<u16, ConfigError> {
    let bytes: [u8; 4] = data.try_into().map_err(|_| ConfigError::InvalidField("id"))?;
    u16::try_from(join_bytes_to_int(bytes)).map_err(|_| ConfigError::InvalidField("id"))
}
