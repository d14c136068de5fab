//! In-memory fakes for the hardware capabilities, used by unit tests.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;

use crate::hal::{PinController, PinMode, QuadratureDecoder};
use crate::error::LinkError;
use crate::hid::HidSink;
use crate::serial::framer::{Decoded, FrameDecoder};
use crate::serial::{SerialLink, SerialMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PinWrite {
    Digital(u8, bool),
    Analog(u8, u8),
}

/// Pin table. Input levels are set by the test; outputs are recorded.
#[derive(Default)]
pub struct FakePins {
    pub modes: BTreeMap<u8, PinMode>,
    pub inputs: BTreeMap<u8, bool>,
    pub writes: Vec<PinWrite>,
}

impl FakePins {
    pub fn set_input(&mut self, pin: u8, high: bool) {
        self.inputs.insert(pin, high);
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    /// Last digital level written to `pin`.
    pub fn level(&self, pin: u8) -> bool {
        self.writes
            .iter()
            .rev()
            .find_map(|w| match *w {
                PinWrite::Digital(p, high) if p == pin => Some(high),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Last PWM duty written to `pin`.
    pub fn duty(&self, pin: u8) -> u8 {
        self.writes
            .iter()
            .rev()
            .find_map(|w| match *w {
                PinWrite::Analog(p, duty) if p == pin => Some(duty),
                _ => None,
            })
            .unwrap_or(0)
    }
}

impl PinController for FakePins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        self.modes.insert(pin, mode);
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        self.writes.push(PinWrite::Digital(pin, high));
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        // Unset inputs idle at the pull-up level.
        self.inputs.get(&pin).copied().unwrap_or(true)
    }

    fn analog_write(&mut self, pin: u8, duty: u8) {
        self.writes.push(PinWrite::Analog(pin, duty));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HidCall {
    SetModifier(u8),
    SetKey(usize, u8),
    SendNow,
    Press(u8),
    Release(u8),
    TypeText(String),
    MouseMove(i8, i8),
    MouseScroll(i8, i8),
    MousePress(u8),
    MouseRelease(u8),
}

/// Sink that records every call in order.
#[derive(Default)]
pub struct RecordingHid {
    pub calls: Vec<HidCall>,
}

impl HidSink for RecordingHid {
    fn set_modifier(&mut self, modifier: u8) {
        self.calls.push(HidCall::SetModifier(modifier));
    }

    fn set_key(&mut self, slot: usize, usage: u8) {
        self.calls.push(HidCall::SetKey(slot, usage));
    }

    fn send_now(&mut self) {
        self.calls.push(HidCall::SendNow);
    }

    fn press_key(&mut self, usage: u8) {
        self.calls.push(HidCall::Press(usage));
    }

    fn release_key(&mut self, usage: u8) {
        self.calls.push(HidCall::Release(usage));
    }

    fn type_text(&mut self, text: &str) {
        self.calls.push(HidCall::TypeText(String::from(text)));
    }

    fn mouse_move(&mut self, dx: i8, dy: i8) {
        self.calls.push(HidCall::MouseMove(dx, dy));
    }

    fn mouse_scroll(&mut self, vertical: i8, horizontal: i8) {
        self.calls.push(HidCall::MouseScroll(vertical, horizontal));
    }

    fn mouse_press(&mut self, buttons: u8) {
        self.calls.push(HidCall::MousePress(buttons));
    }

    fn mouse_release(&mut self, buttons: u8) {
        self.calls.push(HidCall::MouseRelease(buttons));
    }
}

/// Decoder whose count is set directly by the test.
#[derive(Default)]
pub struct ScriptedDecoder {
    pub pending: i32,
    pub samples: usize,
}

impl QuadratureDecoder for ScriptedDecoder {
    fn attach(_pin_a: u8, _pin_b: u8) -> Self {
        Self::default()
    }

    fn sample(&mut self, _a: bool, _b: bool) {
        self.samples += 1;
    }

    fn read_and_reset(&mut self) -> i32 {
        core::mem::take(&mut self.pending)
    }
}

/// Serial link backed by two byte queues.
pub struct FakeLink {
    pub connected: bool,
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    /// Reject writes once `tx` would exceed this many bytes.
    pub tx_limit: usize,
}

impl FakeLink {
    pub fn connected() -> Self {
        Self {
            connected: true,
            rx: VecDeque::new(),
            tx: Vec::new(),
            tx_limit: usize::MAX,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Decode and drain everything written so far.
    pub fn take_frames(&mut self) -> Vec<SerialMessage> {
        let mut decoder = FrameDecoder::new();
        let frames = self
            .tx
            .iter()
            .filter_map(|b| match decoder.push(*b) {
                Some(Decoded::Message(m)) => Some(m),
                _ => None,
            })
            .collect();
        self.tx.clear();
        frames
    }
}

impl SerialLink for FakeLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.rx.front().copied()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.tx.len() + bytes.len() > self.tx_limit {
            return Err(LinkError::Overflow);
        }
        self.tx.extend_from_slice(bytes);
        Ok(())
    }
}
