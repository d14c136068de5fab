//! HID output: report types, the [`HidSink`] capability actions emit
//! through, and [`ReportQueue`], the sink the firmware uses.
//!
//! Actions describe *what* to send (set modifiers, flush, type text);
//! the queue turns each flush into a boot-protocol report that the USB
//! writer task forwards to the matching endpoint.

pub mod keyboard;
pub mod keymap;
pub mod mouse;


use heapless::Deque;
use keyboard::{KeyboardReport, KEY_SLOTS};
use mouse::MouseReport;

/// A report ready for one of the HID endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
}

impl HidReport {
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Mouse(m) => m.serialize(buf),
        }
    }

    #[cfg(test)]
    pub fn is_keyboard(&self) -> bool {
        matches!(self, HidReport::Keyboard(_))
    }

    #[cfg(test)]
    pub fn is_mouse(&self) -> bool {
        matches!(self, HidReport::Mouse(_))
    }
}

/// Host-facing keyboard and mouse.
///
/// Key slot and modifier setters only stage state; `send_now` transmits
/// it. The press/release, text and mouse calls transmit immediately.
pub trait HidSink {
    fn set_modifier(&mut self, modifier: u8);
    fn set_key(&mut self, slot: usize, usage: u8);
    fn send_now(&mut self);

    fn press_key(&mut self, usage: u8);
    fn release_key(&mut self, usage: u8);
    fn type_text(&mut self, text: &str);

    fn mouse_move(&mut self, dx: i8, dy: i8);
    /// `vertical` is the wheel, `horizontal` the pan axis.
    fn mouse_scroll(&mut self, vertical: i8, horizontal: i8);
    fn mouse_press(&mut self, buttons: u8);
    fn mouse_release(&mut self, buttons: u8);
}

/// [`HidSink`] that records every transmission as a [`HidReport`].
///
/// Reports beyond the queue depth are dropped and counted; the control
/// loop drains the queue after each tick.
pub struct ReportQueue<const N: usize> {
    keyboard: KeyboardReport,
    mouse_buttons: u8,
    pending: Deque<HidReport, N>,
    dropped: u32,
}

impl<const N: usize> ReportQueue<N> {
    pub const fn new() -> Self {
        Self {
            keyboard: KeyboardReport::empty(),
            mouse_buttons: 0,
            pending: Deque::new(),
            dropped: 0,
        }
    }

    /// Oldest queued report.
    pub fn pop(&mut self) -> Option<HidReport> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Reports lost to a full queue since creation.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Current staged keyboard state.
    #[cfg(test)]
    pub fn keyboard_state(&self) -> KeyboardReport {
        self.keyboard
    }

    fn push(&mut self, report: HidReport) {
        if self.pending.push_back(report).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            warn!("HID queue full - report dropped");
        }
    }

    fn push_mouse(&mut self, x: i8, y: i8, wheel: i8, pan: i8) {
        self.push(HidReport::Mouse(MouseReport {
            buttons: self.mouse_buttons,
            x,
            y,
            wheel,
            pan,
        }));
    }
}

impl<const N: usize> Default for ReportQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HidSink for ReportQueue<N> {
    fn set_modifier(&mut self, modifier: u8) {
        self.keyboard.modifier = modifier;
    }

    fn set_key(&mut self, slot: usize, usage: u8) {
        if slot < KEY_SLOTS {
            self.keyboard.keycodes[slot] = usage;
        }
    }

    fn send_now(&mut self) {
        self.push(HidReport::Keyboard(self.keyboard));
    }

    fn press_key(&mut self, usage: u8) {
        if !self.keyboard.press(usage) {
            warn!("All key slots in use - key {} dropped", usage);
            return;
        }
        self.send_now();
    }

    fn release_key(&mut self, usage: u8) {
        self.keyboard.release(usage);
        self.send_now();
    }

    fn type_text(&mut self, text: &str) {
        let held = self.keyboard;
        for c in text.chars() {
            let Some((modifier, usage)) = keymap::ascii_to_usage(c) else {
                debug!("No usage for character - skipped");
                continue;
            };
            let mut stroke = held;
            stroke.modifier |= modifier;
            stroke.press(usage);
            self.push(HidReport::Keyboard(stroke));
            self.push(HidReport::Keyboard(held));
        }
    }

    fn mouse_move(&mut self, dx: i8, dy: i8) {
        self.push_mouse(dx, dy, 0, 0);
    }

    fn mouse_scroll(&mut self, vertical: i8, horizontal: i8) {
        self.push_mouse(0, 0, vertical, horizontal);
    }

    fn mouse_press(&mut self, buttons: u8) {
        self.mouse_buttons |= buttons;
        self.push_mouse(0, 0, 0, 0);
    }

    fn mouse_release(&mut self, buttons: u8) {
        self.mouse_buttons &= !buttons;
        self.push_mouse(0, 0, 0, 0);
    }
}
