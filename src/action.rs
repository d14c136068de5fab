//! Actions a binding can fire.
//!
//! Each variant is a plain value built once from its configuration
//! object. `perform` emits HID traffic and keeps no state between calls,
//! so invoking an action twice sends the same events twice.

use alloc::string::String;

use crate::document::{int_or, int_saturating_i8, require_int, truthy, ConfigNode};
use crate::error::ConfigError;
use crate::hid::keyboard::{KEY_SLOTS, MOD_ALT, MOD_CTRL, MOD_GUI, MOD_SHIFT};
use crate::hid::HidSink;

/// `type` discriminants in the configuration document.
pub const ACTION_MOUSE: i64 = 1;
pub const ACTION_KEYBOARD: i64 = 2;
pub const ACTION_INSTANT_KEY: i64 = 3;
pub const ACTION_SWITCH_PROFILE: i64 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Mouse(MouseAction),
    Keyboard(KeyboardAction),
    /// Press then immediately release one key.
    InstantKey { key: u8 },
    SwitchProfile(ProfileTarget),
}

/// Mouse motion, scroll and button changes in one action.
///
/// When both `press` and `release` are set a single `perform` sends a
/// full click; that is how an "instant click" is configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MouseAction {
    pub move_x: i8,
    pub move_y: i8,
    pub scroll_x: i8,
    pub scroll_y: i8,
    pub button: u8,
    pub press: bool,
    pub release: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyboardAction {
    /// Key chord: modifier mask plus up to six usages.
    Keys { modifiers: u8, keys: [u8; KEY_SLOTS] },
    /// Literal text typed one character at a time.
    Text(String),
}

/// Which profile a `SwitchProfile` action selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileTarget {
    Index(usize),
    /// Relative move through the profile list, wrapping at both ends.
    Step(i32),
}

/// Side effect of an action on the deck itself, applied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionEffect {
    None,
    SwitchProfile(ProfileTarget),
}

impl Action {
    /// Build an action from its object. Unknown or missing `type` gives
    /// `Ok(None)`: an empty slot is legitimate.
    pub fn parse<N: ConfigNode>(node: &N) -> Result<Option<Action>, ConfigError> {
        let Some(kind) = node.field("type").and_then(ConfigNode::int) else {
            return Ok(None);
        };

        let action = match kind {
            ACTION_MOUSE => Action::Mouse(MouseAction::parse(node)?),
            ACTION_KEYBOARD => Action::Keyboard(KeyboardAction::parse(node)?),
            ACTION_INSTANT_KEY => Action::InstantKey {
                key: require_int(node, "key")?,
            },
            ACTION_SWITCH_PROFILE => Action::SwitchProfile(ProfileTarget::parse(node)?),
            other => {
                debug!("Unknown action type {} - slot left empty", other);
                return Ok(None);
            }
        };
        Ok(Some(action))
    }

    /// Fire the action. Profile switches are returned to the caller
    /// instead of being applied here.
    pub fn perform<H: HidSink>(&self, hid: &mut H) -> ActionEffect {
        match self {
            Action::Mouse(mouse) => mouse.perform(hid),
            Action::Keyboard(keyboard) => keyboard.perform(hid),
            Action::InstantKey { key } => {
                hid.press_key(*key);
                hid.release_key(*key);
            }
            Action::SwitchProfile(target) => return ActionEffect::SwitchProfile(*target),
        }
        ActionEffect::None
    }
}

impl MouseAction {
    fn parse<N: ConfigNode>(node: &N) -> Result<Self, ConfigError> {
        Ok(Self {
            move_x: int_saturating_i8(node, "movex")?,
            move_y: int_saturating_i8(node, "movey")?,
            scroll_x: int_saturating_i8(node, "scrollx")?,
            scroll_y: int_saturating_i8(node, "scrolly")?,
            button: int_or(node, "button", 0)?,
            press: truthy(node, "press"),
            release: truthy(node, "release"),
        })
    }

    fn perform<H: HidSink>(&self, hid: &mut H) {
        if self.move_x != 0 || self.move_y != 0 {
            hid.mouse_move(self.move_x, self.move_y);
        }
        if self.scroll_x != 0 || self.scroll_y != 0 {
            hid.mouse_scroll(self.scroll_y, self.scroll_x);
        }
        if self.press {
            hid.mouse_press(self.button);
        }
        if self.release {
            hid.mouse_release(self.button);
        }
    }
}

impl KeyboardAction {
    fn parse<N: ConfigNode>(node: &N) -> Result<Self, ConfigError> {
        if let Some(list) = node.field("keys") {
            let items = list.elements().ok_or(ConfigError::InvalidField("keys"))?;
            let mut keys = [0u8; KEY_SLOTS];
            for (slot, item) in keys.iter_mut().zip(items) {
                *slot = item
                    .int()
                    .and_then(|k| u8::try_from(k).ok())
                    .ok_or(ConfigError::InvalidField("keys"))?;
            }
            if items.len() > KEY_SLOTS {
                warn!("Keyboard action lists {} keys - extra keys ignored", items.len());
            }
            return Ok(KeyboardAction::Keys {
                modifiers: Self::modifiers(node)?,
                keys,
            });
        }

        if let Some(text) = node.field("print") {
            let text = text.text().ok_or(ConfigError::InvalidField("print"))?;
            return Ok(KeyboardAction::Text(String::from(text)));
        }

        Ok(KeyboardAction::Keys {
            modifiers: Self::modifiers(node)?,
            keys: [0; KEY_SLOTS],
        })
    }

    fn modifiers<N: ConfigNode>(node: &N) -> Result<u8, ConfigError> {
        let mut mods: u8 = int_or(node, "mods", 0)?;
        for (key, bit) in [
            ("ctrl", MOD_CTRL),
            ("shift", MOD_SHIFT),
            ("alt", MOD_ALT),
            ("gui", MOD_GUI),
        ] {
            if truthy(node, key) {
                mods |= bit;
            }
        }
        Ok(mods)
    }

    fn perform<H: HidSink>(&self, hid: &mut H) {
        match self {
            KeyboardAction::Text(text) => hid.type_text(text),
            KeyboardAction::Keys { modifiers, keys } => {
                for slot in 0..KEY_SLOTS {
                    hid.set_key(slot, 0);
                }
                // Modifiers must reach the host before the keys they modify.
                hid.set_modifier(*modifiers);
                hid.send_now();

                for (slot, key) in keys.iter().enumerate() {
                    hid.set_key(slot, *key);
                }
                hid.send_now();
            }
        }
    }
}

impl ProfileTarget {
    fn parse<N: ConfigNode>(node: &N) -> Result<Self, ConfigError> {
        if node.field("profile").is_some() {
            return Ok(ProfileTarget::Index(require_int(node, "profile")?));
        }
        Ok(ProfileTarget::Step(int_or(node, "step", 1)?))
    }

    /// Resolve against a profile list of length `count` (never zero).
    pub fn resolve(self, current: usize, count: usize) -> Option<usize> {
        match self {
            ProfileTarget::Index(index) => (index < count).then_some(index),
            ProfileTarget::Step(step) => {
                let count = i64::try_from(count).ok()?;
                let next = (current as i64 + i64::from(step)).rem_euclid(count);
                usize::try_from(next).ok()
            }
        }
    }
}
