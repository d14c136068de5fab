//! Physical component registry.
//!
//! [`HwDefinition::build`] reads the `components` array in two passes:
//! the first counts each kind so the per-kind vectors are allocated once
//! at their final size, the second fills them in declaration order.
//! Building is pure; [`HwDefinition::init`] touches the pins.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use serde::Serialize;

use crate::config::{DEFAULT_DEBOUNCE_MS, MAX_GPIO};
use crate::document::{int_or, require_int, truthy, ConfigNode};
use crate::error::ConfigError;
use crate::hal::{PinController, PinMode};

/// Colour with 0-255 channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Channels from `r`/`g`/`b`, each defaulting to `default`.
    pub fn parse<N: ConfigNode>(node: &N, default: u8) -> Result<Self, ConfigError> {
        Ok(Self {
            r: int_or(node, "r", default)?,
            g: int_or(node, "g", default)?,
            b: int_or(node, "b", default)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComponentKind {
    Led,
    RgbLed,
    Button,
    Encoder,
}

impl ComponentKind {
    /// Kind named by a component's `type`, `None` for unknown kinds.
    pub fn from_type(name: &str) -> Option<Self> {
        match name {
            "led" => Some(ComponentKind::Led),
            "rgbled" => Some(ComponentKind::RgbLed),
            "button" | "pushbutton" => Some(ComponentKind::Button),
            "encoder" | "rotaryencoder" => Some(ComponentKind::Encoder),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Led {
    pub id: u16,
    pub pin: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbLed {
    pub id: u16,
    /// Red channel pin.
    pub pin: u8,
    pub gpin: u8,
    pub bpin: u8,
    pub color: Rgb,
    /// Shows the active profile's colour.
    pub indicator: bool,
}

impl RgbLed {
    pub fn show<P: PinController>(&mut self, color: Rgb, pins: &mut P) {
        self.color = color;
        pins.analog_write(self.pin, color.r);
        pins.analog_write(self.gpin, color.g);
        pins.analog_write(self.bpin, color.b);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub id: u16,
    pub pin: u8,
    pub mode: PinMode,
    /// Pin level that means "pressed".
    pub active_high: bool,
    pub debounce_ms: u32,
}

impl Button {
    pub fn is_active(&self, level: bool) -> bool {
        level == self.active_high
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoder {
    pub id: u16,
    pub pin: u8,
    pub pin2: u8,
    pub mode: PinMode,
}

/// Per-kind component counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComponentCounts {
    pub leds: usize,
    pub rgb_leds: usize,
    pub buttons: usize,
    pub encoders: usize,
}

impl ComponentCounts {
    fn add(&mut self, kind: ComponentKind) {
        match kind {
            ComponentKind::Led => self.leds += 1,
            ComponentKind::RgbLed => self.rgb_leds += 1,
            ComponentKind::Button => self.buttons += 1,
            ComponentKind::Encoder => self.encoders += 1,
        }
    }
}

/// The deck's components, one vector per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HwDefinition {
    leds: Vec<Led>,
    rgb_leds: Vec<RgbLed>,
    buttons: Vec<Button>,
    encoders: Vec<Encoder>,
}

impl HwDefinition {
    pub fn build<N: ConfigNode>(root: &N) -> Result<Self, ConfigError> {
        let entries: &[N] = match root.field("components") {
            None => &[],
            Some(list) => list
                .elements()
                .ok_or(ConfigError::InvalidField("components"))?,
        };

        let mut counts = ComponentCounts::default();
        for entry in entries {
            if let Some(kind) = kind_of(entry)? {
                counts.add(kind);
            }
        }

        let mut hw = Self {
            leds: Vec::with_capacity(counts.leds),
            rgb_leds: Vec::with_capacity(counts.rgb_leds),
            buttons: Vec::with_capacity(counts.buttons),
            encoders: Vec::with_capacity(counts.encoders),
        };
        let mut ids = BTreeSet::new();

        for entry in entries {
            let Some(kind) = kind_of(entry)? else {
                continue;
            };
            let id: u16 = require_int(entry, "id")?;
            if !ids.insert(id) {
                return Err(ConfigError::DuplicateComponent(id));
            }
            let pin = pin_field(entry, "pin")?;

            match kind {
                ComponentKind::Led => hw.leds.push(Led { id, pin }),
                ComponentKind::RgbLed => hw.rgb_leds.push(RgbLed {
                    id,
                    pin,
                    gpin: pin_field(entry, "gpin")?,
                    bpin: pin_field(entry, "bpin")?,
                    color: Rgb::parse(entry, 0)?,
                    indicator: truthy(entry, "indicator"),
                }),
                ComponentKind::Button => {
                    let mode = input_mode(entry, PinMode::InputPullUp)?;
                    let active_high = match entry.field("detect") {
                        Some(_) => require_int::<_, u8>(entry, "detect")? != 0,
                        None => mode != PinMode::InputPullUp,
                    };
                    hw.buttons.push(Button {
                        id,
                        pin,
                        mode,
                        active_high,
                        debounce_ms: int_or(entry, "debounce", DEFAULT_DEBOUNCE_MS)?,
                    });
                }
                ComponentKind::Encoder => hw.encoders.push(Encoder {
                    id,
                    pin,
                    pin2: pin_field(entry, "pin2")?,
                    mode: input_mode(entry, PinMode::Input)?,
                }),
            }
        }

        debug!(
            "Hardware: {} leds, {} rgb, {} buttons, {} encoders",
            hw.leds.len(),
            hw.rgb_leds.len(),
            hw.buttons.len(),
            hw.encoders.len()
        );
        Ok(hw)
    }

    /// Configure pin modes and drive outputs to their initial values.
    pub fn init<P: PinController>(&mut self, pins: &mut P) {
        for led in &self.leds {
            pins.set_mode(led.pin, PinMode::Output);
            pins.digital_write(led.pin, false);
        }
        for rgb in &mut self.rgb_leds {
            for pin in [rgb.pin, rgb.gpin, rgb.bpin] {
                pins.set_mode(pin, PinMode::Output);
            }
            let color = rgb.color;
            rgb.show(color, pins);
        }
        for button in &self.buttons {
            pins.set_mode(button.pin, button.mode);
        }
        for encoder in &self.encoders {
            pins.set_mode(encoder.pin, encoder.mode);
            pins.set_mode(encoder.pin2, encoder.mode);
        }
    }

    /// Drive every indicator RGB LED to `color`.
    pub fn show_indicator<P: PinController>(&mut self, color: Rgb, pins: &mut P) {
        for rgb in self.rgb_leds.iter_mut().filter(|rgb| rgb.indicator) {
            rgb.show(color, pins);
        }
    }

    pub fn counts(&self) -> ComponentCounts {
        ComponentCounts {
            leds: self.leds.len(),
            rgb_leds: self.rgb_leds.len(),
            buttons: self.buttons.len(),
            encoders: self.encoders.len(),
        }
    }

    pub fn leds(&self) -> &[Led] {
        &self.leds
    }

    pub fn rgb_leds(&self) -> &[RgbLed] {
        &self.rgb_leds
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn encoders(&self) -> &[Encoder] {
        &self.encoders
    }

    pub fn led(&self, id: u16) -> Option<&Led> {
        self.leds.iter().find(|led| led.id == id)
    }

    pub fn button_index(&self, id: u16) -> Option<usize> {
        self.buttons.iter().position(|b| b.id == id)
    }

    pub fn encoder_index(&self, id: u16) -> Option<usize> {
        self.encoders.iter().position(|e| e.id == id)
    }

    /// Whether `id` names a bindable input.
    pub fn is_input(&self, id: u16) -> bool {
        self.button_index(id).is_some() || self.encoder_index(id).is_some()
    }
}

fn kind_of<N: ConfigNode>(entry: &N) -> Result<Option<ComponentKind>, ConfigError> {
    let name = entry
        .field("type")
        .ok_or(ConfigError::MissingField("type"))?
        .text()
        .ok_or(ConfigError::InvalidField("type"))?;
    let kind = ComponentKind::from_type(name);
    if kind.is_none() {
        debug!("Skipping component of unknown type");
    }
    Ok(kind)
}

fn pin_field<N: ConfigNode>(entry: &N, key: &'static str) -> Result<u8, ConfigError> {
    let pin: u8 = require_int(entry, key)?;
    if pin > MAX_GPIO {
        return Err(ConfigError::InvalidField(key));
    }
    Ok(pin)
}

fn input_mode<N: ConfigNode>(entry: &N, default: PinMode) -> Result<PinMode, ConfigError> {
    let Some(node) = entry.field("input_type") else {
        return Ok(default);
    };
    match node.text() {
        Some("INPUT") => Ok(PinMode::Input),
        Some("INPUT_PULLUP") => Ok(PinMode::InputPullUp),
        Some("INPUT_PULLDOWN") => Ok(PinMode::InputPullDown),
        _ => Err(ConfigError::InvalidField("input_type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakePins, PinWrite};
    use serde_json::json;

    #[test]
    fn counts_and_order_follow_declaration() {
        let doc = json!({"components": [
            {"type": "button", "id": 1, "pin": 2},
            {"type": "led", "id": 10, "pin": 13},
            {"type": "button", "id": 3, "pin": 4},
            {"type": "encoder", "id": 5, "pin": 6, "pin2": 7},
            {"type": "slider", "id": 8, "pin": 9},
            {"type": "pushbutton", "id": 0, "pin": 11},
        ]});
        let hw = HwDefinition::build(&doc).unwrap();

        assert_eq!(
            hw.counts(),
            ComponentCounts {
                leds: 1,
                rgb_leds: 0,
                buttons: 3,
                encoders: 1
            }
        );
        let ids: Vec<u16> = hw.buttons().iter().map(|b| b.id).collect();
        assert_eq!(ids, [1, 3, 0]);
        assert_eq!(hw.button_index(3), Some(1));
        assert_eq!(hw.encoder_index(5), Some(0));
        assert!(hw.is_input(5));
        assert!(!hw.is_input(10));
        assert!(!hw.is_input(8), "unknown kinds are skipped");
    }

    #[test]
    fn missing_document_sections_give_empty_definition() {
        let hw = HwDefinition::build(&json!({})).unwrap();
        assert_eq!(hw.counts(), ComponentCounts::default());
    }

    #[test]
    fn required_fields() {
        let cases = [
            (json!({"pin": 2, "id": 1}), ConfigError::MissingField("type")),
            (json!({"type": 4, "pin": 2, "id": 1}), ConfigError::InvalidField("type")),
            (json!({"type": "led", "id": 1}), ConfigError::MissingField("pin")),
            (json!({"type": "led", "pin": 2}), ConfigError::MissingField("id")),
            (json!({"type": "led", "pin": 99, "id": 1}), ConfigError::InvalidField("pin")),
            (json!({"type": "encoder", "pin": 2, "id": 1}), ConfigError::MissingField("pin2")),
            (json!({"type": "rgbled", "pin": 2, "gpin": 3, "id": 1}), ConfigError::MissingField("bpin")),
        ];
        for (component, expected) in cases {
            let doc = json!({"components": [component]});
            assert_eq!(HwDefinition::build(&doc), Err(expected));
        }
    }

    #[test]
    fn duplicate_ids_rejected_across_kinds() {
        let doc = json!({"components": [
            {"type": "led", "id": 1, "pin": 2},
            {"type": "button", "id": 1, "pin": 3},
        ]});
        assert_eq!(
            HwDefinition::build(&doc),
            Err(ConfigError::DuplicateComponent(1))
        );
    }

    #[test]
    fn button_polarity_defaults_follow_pull() {
        let doc = json!({"components": [
            {"type": "button", "id": 1, "pin": 2},
            {"type": "button", "id": 2, "pin": 3, "input_type": "INPUT_PULLDOWN"},
            {"type": "button", "id": 3, "pin": 4, "detect": 1, "debounce": 25},
        ]});
        let hw = HwDefinition::build(&doc).unwrap();
        let [a, b, c] = hw.buttons() else {
            panic!("expected three buttons");
        };
        assert_eq!(a.mode, PinMode::InputPullUp);
        assert!(!a.active_high);
        assert_eq!(a.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(b.active_high);
        assert!(c.active_high);
        assert_eq!(c.debounce_ms, 25);
    }

    #[test]
    fn unknown_input_type_rejected() {
        let doc = json!({"components": [
            {"type": "button", "id": 1, "pin": 2, "input_type": "ANALOG"},
        ]});
        assert_eq!(
            HwDefinition::build(&doc),
            Err(ConfigError::InvalidField("input_type"))
        );
    }

    #[test]
    fn init_configures_pins_and_drives_rgb() {
        let doc = json!({"components": [
            {"type": "led", "id": 1, "pin": 13},
            {"type": "rgbled", "id": 2, "pin": 20, "gpin": 21, "bpin": 22, "r": 10, "g": 20, "b": 30},
            {"type": "encoder", "id": 3, "pin": 6, "pin2": 7},
        ]});
        let mut hw = HwDefinition::build(&doc).unwrap();
        let mut pins = FakePins::default();
        hw.init(&mut pins);

        assert_eq!(pins.mode(13), Some(PinMode::Output));
        assert_eq!(pins.mode(22), Some(PinMode::Output));
        assert_eq!(pins.mode(6), Some(PinMode::Input));
        assert_eq!(pins.mode(7), Some(PinMode::Input));
        assert!(pins.writes.contains(&PinWrite::Analog(21, 20)));
        assert_eq!(pins.duty(22), 30);
    }

    #[test]
    fn indicator_leds_follow_profile_colour() {
        let doc = json!({"components": [
            {"type": "rgbled", "id": 1, "pin": 20, "gpin": 21, "bpin": 22, "indicator": true},
            {"type": "rgbled", "id": 2, "pin": 23, "gpin": 24, "bpin": 25},
        ]});
        let mut hw = HwDefinition::build(&doc).unwrap();
        let mut pins = FakePins::default();
        hw.show_indicator(Rgb { r: 1, g: 2, b: 3 }, &mut pins);

        assert_eq!(hw.rgb_leds()[0].color, Rgb { r: 1, g: 2, b: 3 });
        assert_eq!(hw.rgb_leds()[1].color, Rgb::default());
        assert_eq!(pins.writes.len(), 3);
    }
}
