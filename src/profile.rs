//! Profiles and their bindings.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::action::Action;
use crate::document::{require_int, ConfigNode};
use crate::error::ConfigError;
use crate::hardware::{HwDefinition, Rgb};
use crate::pattern::LedPattern;

/// LED pattern that runs while its binding's profile is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
    /// Id of the target LED component.
    pub led: u16,
    pub pattern: LedPattern,
}

/// One input mapped to up to two actions.
///
/// For buttons `action1` fires on press and `action2` on release; for
/// encoders `action1` fires on a negative turn and `action2` on a
/// positive one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub id: u16,
    pub action1: Option<Action>,
    pub action2: Option<Action>,
    pub feedback: Option<Feedback>,
}

impl Binding {
    pub fn build<N: ConfigNode>(node: &N) -> Result<Self, ConfigError> {
        let id = require_int(node, "id")?;
        let action = |key: &str| match node.field(key) {
            Some(doc) => Action::parse(doc),
            None => Ok(None),
        };

        let feedback = match node.field("pattern") {
            None => None,
            Some(doc) => match LedPattern::parse(doc)? {
                Some(pattern) => Some(Feedback {
                    led: require_int(doc, "led")?,
                    pattern,
                }),
                None => None,
            },
        };

        Ok(Self {
            id,
            action1: action("action1")?,
            action2: action("action2")?,
            feedback,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    /// Shown on indicator RGB LEDs while active.
    pub color: Rgb,
    bindings: Vec<Binding>,
}

impl Profile {
    pub fn build<N: ConfigNode>(node: &N) -> Result<Self, ConfigError> {
        let name = match node.field("name") {
            None => String::new(),
            Some(name) => String::from(name.text().ok_or(ConfigError::InvalidField("name"))?),
        };

        let entries = match node.field("bindings") {
            None => &[][..],
            Some(list) => list.elements().ok_or(ConfigError::InvalidField("bindings"))?,
        };

        let mut seen = BTreeSet::new();
        let mut bindings = Vec::with_capacity(entries.len());
        for entry in entries {
            let binding = Binding::build(entry)?;
            if !seen.insert(binding.id) {
                return Err(ConfigError::DuplicateBinding(binding.id));
            }
            bindings.push(binding);
        }

        Ok(Self {
            name,
            color: Rgb::parse(node, 255)?,
            bindings,
        })
    }

    /// A profile with no bindings.
    pub fn empty(name: &str) -> Self {
        Self {
            name: String::from(name),
            color: Rgb::WHITE,
            bindings: Vec::new(),
        }
    }

    /// Check every binding against the hardware it will drive.
    pub fn validate(&self, hw: &HwDefinition) -> Result<(), ConfigError> {
        for binding in &self.bindings {
            if !hw.is_input(binding.id) {
                return Err(ConfigError::UnknownInput(binding.id));
            }
            if let Some(feedback) = &binding.feedback {
                if hw.led(feedback.led).is_none() {
                    return Err(ConfigError::UnknownLed(feedback.led));
                }
            }
        }
        Ok(())
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Index of the binding for input `id`.
    pub fn binding_index(&self, id: u16) -> Option<usize> {
        self.bindings.iter().position(|b| b.id == id)
    }

    #[cfg(test)]
    pub fn binding(&self, id: u16) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id == id)
    }
}
