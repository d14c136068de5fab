//! LED feedback patterns.
//!
//! A pattern drives one output pin. `start` attaches it and resets its
//! clock, `update` advances it by the time since the previous tick.

use crate::document::{require_int, truthy, ConfigNode};
use crate::error::ConfigError;
use crate::hal::PinController;

/// `type` discriminants in a pattern object.
pub const PATTERN_FLASH: i64 = 1;
pub const PATTERN_STATIC: i64 = 2;
pub const PATTERN_PULSE: i64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternKind {
    /// Fixed level set once at start.
    Static { on: bool },
    /// Toggle every `period_ms`, starting on.
    Flash { period_ms: u32 },
    /// PWM brightness dark at phase 0, brightest at half period.
    Pulse { period_ms: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedPattern {
    kind: PatternKind,
    pin: Option<u8>,
    elapsed_ms: u32,
    level: bool,
}

impl LedPattern {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            pin: None,
            elapsed_ms: 0,
            level: false,
        }
    }

    /// Build a pattern from its object. Unknown or missing `type` gives
    /// `Ok(None)`.
    pub fn parse<N: ConfigNode>(node: &N) -> Result<Option<Self>, ConfigError> {
        let Some(kind) = node.field("type").and_then(ConfigNode::int) else {
            return Ok(None);
        };

        let kind = match kind {
            PATTERN_FLASH => PatternKind::Flash {
                period_ms: period(node)?,
            },
            PATTERN_STATIC => PatternKind::Static {
                on: truthy(node, "state"),
            },
            PATTERN_PULSE => PatternKind::Pulse {
                period_ms: period(node)?,
            },
            other => {
                debug!("Unknown pattern type {} - ignored", other);
                return Ok(None);
            }
        };
        Ok(Some(Self::new(kind)))
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn pin(&self) -> Option<u8> {
        self.pin
    }

    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    /// Attach to `pin`, reset the clock and set the starting level.
    pub fn start<P: PinController>(&mut self, pin: u8, pins: &mut P) {
        self.pin = Some(pin);
        self.elapsed_ms = 0;
        match self.kind {
            PatternKind::Static { on } => {
                self.level = on;
                pins.digital_write(pin, on);
            }
            PatternKind::Flash { .. } => {
                self.level = true;
                pins.digital_write(pin, true);
            }
            PatternKind::Pulse { .. } => {}
        }
    }

    /// Advance by `dt_ms`. Does nothing until started.
    pub fn update<P: PinController>(&mut self, dt_ms: u32, pins: &mut P) {
        let Some(pin) = self.pin else {
            return;
        };
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);

        match self.kind {
            PatternKind::Static { .. } => {}
            PatternKind::Flash { period_ms } => {
                if self.elapsed_ms > period_ms {
                    self.elapsed_ms = 0;
                    self.level = !self.level;
                    pins.digital_write(pin, self.level);
                }
            }
            PatternKind::Pulse { period_ms } => {
                if self.elapsed_ms >= period_ms {
                    self.elapsed_ms %= period_ms;
                }
                pins.analog_write(pin, pulse_duty(self.elapsed_ms, period_ms));
            }
        }
    }

    /// Detach and drive the pin dark.
    pub fn stop<P: PinController>(&mut self, pins: &mut P) {
        let Some(pin) = self.pin.take() else {
            return;
        };
        match self.kind {
            PatternKind::Pulse { .. } => pins.analog_write(pin, 0),
            _ => pins.digital_write(pin, false),
        }
        self.level = false;
    }
}

fn period<N: ConfigNode>(node: &N) -> Result<u32, ConfigError> {
    let period: u32 = require_int(node, "period")?;
    if period == 0 {
        return Err(ConfigError::InvalidField("period"));
    }
    Ok(period)
}

/// sin(k * pi / 128) in Q15 for k = 0..=64.
const QUARTER_SINE: [u16; 65] = [
    0, 804, 1608, 2410, 3212, 4011, 4808, 5602,
    6393, 7179, 7962, 8739, 9512, 10278, 11039, 11793,
    12539, 13279, 14010, 14732, 15446, 16151, 16846, 17530,
    18204, 18868, 19519, 20159, 20787, 21403, 22005, 22594,
    23170, 23731, 24279, 24811, 25329, 25832, 26319, 26790,
    27245, 27683, 28105, 28510, 28898, 29268, 29621, 29956,
    30273, 30571, 30852, 31113, 31356, 31580, 31785, 31971,
    32137, 32285, 32412, 32521, 32609, 32678, 32728, 32757,
    32767,
];

const QUARTER_STEPS: u64 = 64;

/// Pulse brightness at `elapsed_ms` into a `period_ms` cycle:
/// `255 * sin^2(pi * elapsed / period)`, i.e. a raised cosine.
pub fn pulse_duty(elapsed_ms: u32, period_ms: u32) -> u8 {
    if period_ms == 0 {
        return 0;
    }
    let elapsed = u64::from(elapsed_ms % period_ms);
    // Position along half a sine wave, 0..=128.
    let mut step = elapsed * 2 * QUARTER_STEPS / u64::from(period_ms);
    if step > QUARTER_STEPS {
        step = 2 * QUARTER_STEPS - step;
    }
    let s = u64::from(QUARTER_SINE[step as usize]);
    let full = u64::from(QUARTER_SINE[QUARTER_SINE.len() - 1]);
    (s * s * 255 / (full * full)) as u8
}
