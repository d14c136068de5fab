//! Per-tick input dispatch.
//!
//! The dispatcher holds the live input state (debouncers, quadrature
//! decoders) for one [`HwDefinition`] and a lookup table from each input
//! to its binding in the active [`Profile`]. The table is replaced as a
//! whole by [`Dispatcher::activate`], between ticks, so a tick always
//! resolves every input against a single profile.

use alloc::vec::Vec;

use crate::action::{Action, ActionEffect, ProfileTarget};
use crate::config::{IDENTIFY_FLASH_MS, IDENTIFY_FLASH_PERIOD_MS, MAX_TICK_EVENTS};
use crate::hal::{
    Debouncer, IntervalDebouncer, PinController, QuadratureCounter, QuadratureDecoder,
};
use crate::hardware::HwDefinition;
use crate::hid::HidSink;
use crate::pattern::{LedPattern, PatternKind};
use crate::profile::Profile;

/// An input edge seen during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    Button { id: u16, pressed: bool },
    Encoder { id: u16, delta: i32 },
}

/// What a tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// At least one input produced an edge.
    pub fired: bool,
    pub events: heapless::Vec<InputEvent, MAX_TICK_EVENTS>,
    /// Profile switch requested by an action, applied by the caller.
    pub switch: Option<ProfileTarget>,
}

impl TickReport {
    fn record(&mut self, event: InputEvent) {
        self.fired = true;
        if self.events.push(event).is_err() {
            warn!("Tick event list full - event not reported");
        }
    }

    fn perform<H: HidSink>(&mut self, action: Option<&Action>, hid: &mut H) {
        let Some(action) = action else {
            return;
        };
        if let ActionEffect::SwitchProfile(target) = action.perform(hid) {
            self.switch = Some(target);
        }
    }
}

struct ButtonSlot<D> {
    debouncer: D,
    binding: Option<usize>,
}

struct EncoderSlot<Q> {
    decoder: Q,
    binding: Option<usize>,
    last_delta: i32,
}

struct Identify {
    pattern: LedPattern,
    remaining_ms: u32,
}

pub struct Dispatcher<D = IntervalDebouncer, Q = QuadratureCounter> {
    buttons: Vec<ButtonSlot<D>>,
    encoders: Vec<EncoderSlot<Q>>,
    feedback: Vec<LedPattern>,
    identify: Option<Identify>,
    threshold: u32,
    generation: u32,
    last_tick_ms: Option<u64>,
}

impl<D: Debouncer, Q: QuadratureDecoder> Dispatcher<D, Q> {
    /// Input state for every button and encoder of `hw`, with nothing
    /// bound until [`activate`](Self::activate) is called.
    pub fn new(hw: &HwDefinition, threshold: u32) -> Self {
        Self {
            buttons: hw
                .buttons()
                .iter()
                .map(|b| ButtonSlot {
                    debouncer: D::with_interval(b.debounce_ms),
                    binding: None,
                })
                .collect(),
            encoders: hw
                .encoders()
                .iter()
                .map(|e| EncoderSlot {
                    decoder: Q::attach(e.pin, e.pin2),
                    binding: None,
                    last_delta: 0,
                })
                .collect(),
            feedback: Vec::new(),
            identify: None,
            threshold,
            generation: 0,
            last_tick_ms: None,
        }
    }

    /// Route inputs to `profile`'s bindings and restart its feedback
    /// patterns. `generation` tags the table for diagnostics.
    pub fn activate<P: PinController>(
        &mut self,
        hw: &HwDefinition,
        profile: &Profile,
        generation: u32,
        pins: &mut P,
    ) {
        for pattern in &mut self.feedback {
            pattern.stop(pins);
        }

        let mut feedback = Vec::new();
        for binding in profile.bindings() {
            let Some(fb) = &binding.feedback else {
                continue;
            };
            let Some(led) = hw.led(fb.led) else {
                continue;
            };
            let mut pattern = fb.pattern.clone();
            pattern.start(led.pin, pins);
            feedback.push(pattern);
        }

        for (slot, button) in self.buttons.iter_mut().zip(hw.buttons()) {
            slot.binding = profile.binding_index(button.id);
        }
        for (slot, encoder) in self.encoders.iter_mut().zip(hw.encoders()) {
            slot.binding = profile.binding_index(encoder.id);
        }
        self.feedback = feedback;
        self.generation = generation;
    }

    /// Feed one sample of every encoder's pins to its decoder.
    pub fn sample_encoders<P: PinController>(&mut self, hw: &HwDefinition, pins: &mut P) {
        for (slot, encoder) in self.encoders.iter_mut().zip(hw.encoders()) {
            let a = pins.digital_read(encoder.pin);
            let b = pins.digital_read(encoder.pin2);
            slot.decoder.sample(a, b);
        }
    }

    /// Poll inputs, fire bound actions, then advance LED patterns.
    pub fn tick<P: PinController, H: HidSink>(
        &mut self,
        hw: &HwDefinition,
        profile: &Profile,
        pins: &mut P,
        hid: &mut H,
        now_ms: u64,
    ) -> TickReport {
        let dt_ms = self
            .last_tick_ms
            .map_or(0, |last| now_ms.saturating_sub(last));
        self.last_tick_ms = Some(now_ms);

        let bindings = profile.bindings();
        let mut report = TickReport::default();

        for (slot, button) in self.buttons.iter_mut().zip(hw.buttons()) {
            let level = pins.digital_read(button.pin);
            slot.debouncer.update(button.is_active(level), now_ms);

            let pressed = if slot.debouncer.pressed() {
                true
            } else if slot.debouncer.released() {
                false
            } else {
                continue;
            };

            report.record(InputEvent::Button {
                id: button.id,
                pressed,
            });
            let binding = slot.binding.and_then(|i| bindings.get(i));
            let action = binding.and_then(|b| {
                if pressed {
                    b.action1.as_ref()
                } else {
                    b.action2.as_ref()
                }
            });
            report.perform(action, hid);
        }

        for (slot, encoder) in self.encoders.iter_mut().zip(hw.encoders()) {
            let delta = slot.decoder.read_and_reset();
            if delta == 0 {
                continue;
            }
            slot.last_delta = delta;
            if delta.unsigned_abs() < self.threshold {
                continue;
            }

            report.record(InputEvent::Encoder {
                id: encoder.id,
                delta,
            });
            let binding = slot.binding.and_then(|i| bindings.get(i));
            let action = binding.and_then(|b| {
                if delta < 0 {
                    b.action1.as_ref()
                } else {
                    b.action2.as_ref()
                }
            });
            report.perform(action, hid);
        }

        self.update_patterns(u32::try_from(dt_ms).unwrap_or(u32::MAX), pins);
        report
    }

    /// Flash the LED on `pin` for a while, overriding its feedback pattern.
    pub fn identify<P: PinController>(&mut self, pin: u8, pins: &mut P) {
        self.end_identify(pins);
        let mut pattern = LedPattern::new(PatternKind::Flash {
            period_ms: IDENTIFY_FLASH_PERIOD_MS,
        });
        pattern.start(pin, pins);
        self.identify = Some(Identify {
            pattern,
            remaining_ms: IDENTIFY_FLASH_MS,
        });
    }

    /// Stop every pattern this dispatcher drives.
    pub fn shutdown<P: PinController>(&mut self, pins: &mut P) {
        if let Some(mut identify) = self.identify.take() {
            identify.pattern.stop(pins);
        }
        for pattern in &mut self.feedback {
            pattern.stop(pins);
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_identifying(&self) -> bool {
        self.identify.is_some()
    }

    /// Last non-zero delta read from encoder `index`.
    pub fn last_delta(&self, index: usize) -> Option<i32> {
        self.encoders.get(index).map(|slot| slot.last_delta)
    }

    pub fn encoder_mut(&mut self, index: usize) -> Option<&mut Q> {
        self.encoders.get_mut(index).map(|slot| &mut slot.decoder)
    }

    /// Running feedback patterns, in binding order.
    pub fn feedback(&self) -> &[LedPattern] {
        &self.feedback
    }

    fn update_patterns<P: PinController>(&mut self, dt_ms: u32, pins: &mut P) {
        let identify_pin = self.identify.as_ref().and_then(|i| i.pattern.pin());
        for pattern in &mut self.feedback {
            if identify_pin.is_some() && pattern.pin() == identify_pin {
                continue;
            }
            pattern.update(dt_ms, pins);
        }

        if let Some(identify) = &mut self.identify {
            identify.pattern.update(dt_ms, pins);
            identify.remaining_ms = identify.remaining_ms.saturating_sub(dt_ms);
            if identify.remaining_ms == 0 {
                self.end_identify(pins);
            }
        }
    }

    fn end_identify<P: PinController>(&mut self, pins: &mut P) {
        let Some(mut identify) = self.identify.take() else {
            return;
        };
        let pin = identify.pattern.pin();
        identify.pattern.stop(pins);
        // Hand the LED back to its feedback pattern.
        for pattern in &mut self.feedback {
            if let Some(pin) = pin.filter(|p| pattern.pin() == Some(*p)) {
                pattern.start(pin, pins);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakePins, HidCall, RecordingHid, ScriptedDecoder};
    use serde_json::json;

    type TestDispatcher = Dispatcher<IntervalDebouncer, ScriptedDecoder>;

    struct Rig {
        hw: HwDefinition,
        profile: Profile,
        dispatcher: TestDispatcher,
        pins: FakePins,
        hid: RecordingHid,
    }

    impl Rig {
        fn new(profile: serde_json::Value) -> Self {
            let hw = HwDefinition::build(&json!({"components": [
                {"type": "button", "id": 2, "pin": 5, "debounce": 0},
                {"type": "encoder", "id": 3, "pin": 6, "pin2": 7},
                {"type": "led", "id": 4, "pin": 13},
            ]}))
            .unwrap();
            let profile = Profile::build(&profile).unwrap();
            let mut pins = FakePins::default();
            let mut dispatcher = TestDispatcher::new(&hw, 3);
            dispatcher.activate(&hw, &profile, 1, &mut pins);
            Self {
                hw,
                profile,
                dispatcher,
                pins,
                hid: RecordingHid::default(),
            }
        }

        fn tick(&mut self, now_ms: u64) -> TickReport {
            self.dispatcher
                .tick(&self.hw, &self.profile, &mut self.pins, &mut self.hid, now_ms)
        }

        fn turn(&mut self, delta: i32, now_ms: u64) -> TickReport {
            self.dispatcher.encoder_mut(0).unwrap().pending = delta;
            self.tick(now_ms)
        }
    }

    fn keys_profile() -> serde_json::Value {
        json!({"bindings": [
            {"id": 2, "action1": {"type": 3, "key": 4}, "action2": {"type": 3, "key": 5}},
            {"id": 3, "action1": {"type": 3, "key": 80}, "action2": {"type": 3, "key": 79}},
        ]})
    }

    #[test]
    fn no_edge_no_action() {
        let mut rig = Rig::new(keys_profile());
        let report = rig.tick(0);
        assert!(!report.fired);
        assert!(report.events.is_empty());
        assert!(rig.hid.calls.is_empty());
    }

    #[test]
    fn press_fires_action1_release_fires_action2() {
        let mut rig = Rig::new(keys_profile());
        rig.pins.set_input(5, false);
        let report = rig.tick(0);
        assert!(report.fired);
        assert_eq!(
            report.events.as_slice(),
            &[InputEvent::Button { id: 2, pressed: true }]
        );
        assert_eq!(rig.hid.calls, [HidCall::Press(4), HidCall::Release(4)]);

        rig.hid.calls.clear();
        rig.tick(5);
        assert!(rig.hid.calls.is_empty(), "held button fires once");

        rig.pins.set_input(5, true);
        rig.tick(10);
        assert_eq!(rig.hid.calls, [HidCall::Press(5), HidCall::Release(5)]);
    }

    #[test]
    fn encoder_below_threshold_is_ignored() {
        let mut rig = Rig::new(keys_profile());
        for delta in [1, -2, 2] {
            let report = rig.turn(delta, 0);
            assert!(!report.fired);
        }
        assert!(rig.hid.calls.is_empty());
        assert_eq!(rig.dispatcher.last_delta(0), Some(2));
    }

    #[test]
    fn encoder_direction_selects_exactly_one_action() {
        let mut rig = Rig::new(keys_profile());
        rig.turn(-5, 0);
        assert_eq!(rig.hid.calls, [HidCall::Press(80), HidCall::Release(80)]);

        rig.hid.calls.clear();
        let report = rig.turn(7, 5);
        assert_eq!(rig.hid.calls, [HidCall::Press(79), HidCall::Release(79)]);
        assert_eq!(
            report.events.as_slice(),
            &[InputEvent::Encoder { id: 3, delta: 7 }]
        );
        assert_eq!(rig.dispatcher.last_delta(0), Some(7));
    }

    #[test]
    fn unbound_input_reports_event_without_action() {
        let mut rig = Rig::new(json!({"bindings": []}));
        rig.pins.set_input(5, false);
        let report = rig.tick(0);
        assert!(report.fired);
        assert!(rig.hid.calls.is_empty());
    }

    #[test]
    fn switch_profile_action_is_reported() {
        let mut rig = Rig::new(json!({"bindings": [
            {"id": 2, "action1": {"type": 4, "step": -1}},
        ]}));
        rig.pins.set_input(5, false);
        let report = rig.tick(0);
        assert_eq!(report.switch, Some(ProfileTarget::Step(-1)));
    }

    #[test]
    fn feedback_patterns_start_on_activate_and_tick() {
        let mut rig = Rig::new(json!({"bindings": [
            {"id": 2, "pattern": {"type": 1, "period": 10, "led": 4}},
        ]}));
        assert!(rig.pins.level(13), "flash starts on");

        rig.tick(0);
        rig.tick(11);
        assert!(!rig.pins.level(13));
        assert_eq!(rig.dispatcher.feedback().len(), 1);
    }

    #[test]
    fn activate_replaces_binding_table() {
        let mut rig = Rig::new(keys_profile());
        let other = Profile::build(&json!({"bindings": [
            {"id": 2, "action1": {"type": 3, "key": 30}},
        ]}))
        .unwrap();
        rig.dispatcher.activate(&rig.hw, &other, 2, &mut rig.pins);
        rig.profile = other;
        assert_eq!(rig.dispatcher.generation(), 2);

        rig.pins.set_input(5, false);
        rig.tick(0);
        rig.turn(-9, 5);
        assert_eq!(rig.hid.calls, [HidCall::Press(30), HidCall::Release(30)]);
    }

    #[test]
    fn identify_overrides_feedback_then_restores_it() {
        let mut rig = Rig::new(json!({"bindings": [
            {"id": 2, "pattern": {"type": 2, "state": true, "led": 4}},
        ]}));
        rig.dispatcher.identify(13, &mut rig.pins);
        assert!(rig.dispatcher.is_identifying());

        rig.tick(0);
        rig.tick(u64::from(IDENTIFY_FLASH_MS));
        assert!(!rig.dispatcher.is_identifying());
        assert!(rig.pins.level(13), "static pattern restored");
    }

    #[test]
    fn sample_encoders_feeds_every_decoder() {
        let mut rig = Rig::new(keys_profile());
        rig.dispatcher.sample_encoders(&rig.hw, &mut rig.pins);
        rig.dispatcher.sample_encoders(&rig.hw, &mut rig.pins);
        assert_eq!(rig.dispatcher.encoder_mut(0).unwrap().samples, 2);
    }
}
