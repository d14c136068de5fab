//! The live deck: hardware, profiles and dispatcher built from one
//! configuration document.
//!
//! Every change goes through `&mut Deck` between ticks. A rebuild parses
//! and validates the whole document before anything is touched, so a
//! rejected document leaves the running configuration as it was.

use alloc::vec::Vec;

use crate::action::ProfileTarget;
use crate::config::DEFAULT_ENCODER_THRESHOLD;
use crate::dispatch::{Dispatcher, TickReport};
use crate::document::{int_or, ConfigNode};
use crate::error::ConfigError;
use crate::hal::{Debouncer, IntervalDebouncer, PinController, QuadratureCounter, QuadratureDecoder};
use crate::hardware::HwDefinition;
use crate::hid::HidSink;
use crate::profile::Profile;

/// A parsed and validated configuration document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub hardware: HwDefinition,
    /// Never empty.
    pub profiles: Vec<Profile>,
    pub active: usize,
    pub encoder_threshold: u32,
}

impl Configuration {
    pub fn build<N: ConfigNode>(root: &N) -> Result<Self, ConfigError> {
        let hardware = HwDefinition::build(root)?;

        let entries = root
            .field("profiles")
            .ok_or(ConfigError::NoProfiles)?
            .elements()
            .ok_or(ConfigError::InvalidField("profiles"))?;
        if entries.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let mut profiles = Vec::with_capacity(entries.len());
        for entry in entries {
            let profile = Profile::build(entry)?;
            profile.validate(&hardware)?;
            profiles.push(profile);
        }

        let active: usize = int_or(root, "active", 0)?;
        if active >= profiles.len() {
            return Err(ConfigError::InvalidField("active"));
        }

        Ok(Self {
            hardware,
            profiles,
            active,
            encoder_threshold: int_or(root, "encoder_threshold", DEFAULT_ENCODER_THRESHOLD)?,
        })
    }

    /// Parse a JSON document.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        let root: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| ConfigError::Syntax)?;
        Self::build(&root)
    }

    /// No components and a single empty profile.
    pub fn empty() -> Self {
        Self {
            hardware: HwDefinition::default(),
            profiles: alloc::vec![Profile::empty("default")],
            active: 0,
            encoder_threshold: DEFAULT_ENCODER_THRESHOLD,
        }
    }
}

pub struct Deck<D = IntervalDebouncer, Q = QuadratureCounter> {
    config: Configuration,
    dispatcher: Dispatcher<D, Q>,
    generation: u32,
    source: Option<Vec<u8>>,
}

impl<D: Debouncer, Q: QuadratureDecoder> Deck<D, Q> {
    /// Deck with nothing configured.
    pub fn empty() -> Self {
        let config = Configuration::empty();
        let dispatcher = Dispatcher::new(&config.hardware, config.encoder_threshold);
        Self {
            config,
            dispatcher,
            generation: 0,
            source: None,
        }
    }

    pub fn from_document<P: PinController>(bytes: &[u8], pins: &mut P) -> Result<Self, ConfigError> {
        let mut deck = Self::empty();
        deck.rebuild(bytes, pins)?;
        Ok(deck)
    }

    /// Replace the whole configuration with the document in `bytes`.
    ///
    /// On error nothing changes: no pin is touched and the previous
    /// configuration keeps running.
    pub fn rebuild<P: PinController>(&mut self, bytes: &[u8], pins: &mut P) -> Result<(), ConfigError> {
        let config = Configuration::parse(bytes)?;
        self.install(config, pins);
        self.source = Some(bytes.to_vec());
        info!(
            "Configuration loaded: {} profiles, generation {}",
            self.config.profiles.len(),
            self.generation
        );
        Ok(())
    }

    fn install<P: PinController>(&mut self, mut config: Configuration, pins: &mut P) {
        self.dispatcher.shutdown(pins);
        config.hardware.init(pins);

        let mut dispatcher = Dispatcher::new(&config.hardware, config.encoder_threshold);
        self.generation = self.generation.wrapping_add(1);
        let profile = &config.profiles[config.active];
        dispatcher.activate(&config.hardware, profile, self.generation, pins);
        config.hardware.show_indicator(profile.color, pins);

        self.config = config;
        self.dispatcher = dispatcher;
    }

    /// Make another profile active. Returns `false` when `target` names
    /// no profile.
    pub fn switch_profile<P: PinController>(&mut self, target: ProfileTarget, pins: &mut P) -> bool {
        let count = self.config.profiles.len();
        let Some(next) = target.resolve(self.config.active, count) else {
            warn!("Profile switch to {} rejected - {} profiles", target, count);
            return false;
        };
        if next == self.config.active {
            return true;
        }

        self.config.active = next;
        self.generation = self.generation.wrapping_add(1);
        let profile = &self.config.profiles[next];
        self.dispatcher
            .activate(&self.config.hardware, profile, self.generation, pins);
        self.config.hardware.show_indicator(profile.color, pins);
        info!("Active profile {}", next);
        true
    }

    /// One dispatch tick. A profile switch requested by an action takes
    /// effect after the tick.
    pub fn tick<P: PinController, H: HidSink>(&mut self, pins: &mut P, hid: &mut H, now_ms: u64) -> TickReport {
        let profile = &self.config.profiles[self.config.active];
        let report = self
            .dispatcher
            .tick(&self.config.hardware, profile, pins, hid, now_ms);
        if let Some(target) = report.switch {
            self.switch_profile(target, pins);
        }
        report
    }

    pub fn sample_encoders<P: PinController>(&mut self, pins: &mut P) {
        self.dispatcher.sample_encoders(&self.config.hardware, pins);
    }

    /// Flash the LED component `id` so the host can find it.
    pub fn identify_led<P: PinController>(&mut self, id: u16, pins: &mut P) -> Result<(), ConfigError> {
        let pin = self.config.hardware.led(id).ok_or(ConfigError::UnknownLed(id))?.pin;
        self.dispatcher.identify(pin, pins);
        Ok(())
    }

    pub fn hardware(&self) -> &HwDefinition {
        &self.config.hardware
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.config.profiles
    }

    pub fn active_index(&self) -> usize {
        self.config.active
    }

    pub fn active_profile(&self) -> &Profile {
        &self.config.profiles[self.config.active]
    }

    pub fn encoder_threshold(&self) -> u32 {
        self.config.encoder_threshold
    }

    /// Bumped by every rebuild and profile switch.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn dispatcher(&self) -> &Dispatcher<D, Q> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<D, Q> {
        &mut self.dispatcher
    }

    /// The document the running configuration was built from, if any.
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }
}

impl<D: Debouncer, Q: QuadratureDecoder> Default for Deck<D, Q> {
    fn default() -> Self {
        Self::empty()
    }
}
