//! Hardware capabilities the engine is written against.
//!
//! The board build implements [`PinController`] over the nRF52840 GPIO
//! and PWM blocks; tests use an in-memory pin table. Debouncing and
//! quadrature decoding are capabilities too, with the default
//! implementations below used by the firmware.

/// Electrical mode of a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Floating input.
    Input,
    /// Input with internal pull-up.
    InputPullUp,
    /// Input with internal pull-down.
    InputPullDown,
    /// Push-pull output.
    Output,
}

/// Raw pin access.
pub trait PinController {
    fn set_mode(&mut self, pin: u8, mode: PinMode);
    fn digital_write(&mut self, pin: u8, high: bool);
    fn digital_read(&mut self, pin: u8) -> bool;
    /// PWM duty, 0 = off, 255 = fully on.
    fn analog_write(&mut self, pin: u8, duty: u8);
}

/// Turns a noisy "is the button active" level into press/release edges.
pub trait Debouncer {
    /// Create a debouncer that needs `interval_ms` of stable input.
    fn with_interval(interval_ms: u32) -> Self
    where
        Self: Sized;

    /// Feed the current raw level (already polarity-corrected).
    fn update(&mut self, active: bool, now_ms: u64);

    /// The last `update` produced a press edge.
    fn pressed(&self) -> bool;

    /// The last `update` produced a release edge.
    fn released(&self) -> bool;
}

/// Accumulates a signed step count from two quadrature pins.
pub trait QuadratureDecoder {
    /// Create a decoder wired to the two encoder pins.
    fn attach(pin_a: u8, pin_b: u8) -> Self
    where
        Self: Sized;

    /// Feed one sample of both pin levels.
    fn sample(&mut self, a: bool, b: bool);

    /// Steps accumulated since the previous call.
    fn read_and_reset(&mut self) -> i32;
}

/// Time-based debouncer: a level must hold for the whole interval
/// before it is reported.
#[derive(Clone, Debug)]
pub struct IntervalDebouncer {
    interval_ms: u32,
    raw: bool,
    stable: bool,
    last_change_ms: u64,
    edge: Option<bool>,
}

impl Debouncer for IntervalDebouncer {
    fn with_interval(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            raw: false,
            stable: false,
            last_change_ms: 0,
            edge: None,
        }
    }

    fn update(&mut self, active: bool, now_ms: u64) {
        self.edge = None;

        if active != self.raw {
            self.raw = active;
            self.last_change_ms = now_ms;
        }

        let settled = now_ms.saturating_sub(self.last_change_ms) >= u64::from(self.interval_ms);
        if settled && self.stable != self.raw {
            self.stable = self.raw;
            self.edge = Some(self.stable);
        }
    }

    fn pressed(&self) -> bool {
        self.edge == Some(true)
    }

    fn released(&self) -> bool {
        self.edge == Some(false)
    }
}

/// Full-step quadrature decoder over a transition table. Invalid
/// transitions (both pins changed) count as zero.
#[derive(Clone, Debug)]
pub struct QuadratureCounter {
    pin_a: u8,
    pin_b: u8,
    state: u8,
    count: i32,
}

/// Indexed by `(previous << 2) | current`, each state `(a << 1) | b`.
const TRANSITIONS: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

impl QuadratureCounter {
    /// The pins this decoder was attached to.
    #[cfg(test)]
    pub fn pins(&self) -> (u8, u8) {
        (self.pin_a, self.pin_b)
    }
}

impl QuadratureDecoder for QuadratureCounter {
    fn attach(pin_a: u8, pin_b: u8) -> Self {
        Self {
            pin_a,
            pin_b,
            state: 0b11,
            count: 0,
        }
    }

    fn sample(&mut self, a: bool, b: bool) {
        let current = (u8::from(a) << 1) | u8::from(b);
        let index = usize::from((self.state << 2) | current);
        self.count += i32::from(TRANSITIONS[index]);
        self.state = current;
    }

    fn read_and_reset(&mut self) -> i32 {
        core::mem::take(&mut self.count)
    }
}
