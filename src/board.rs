//! nRF52840 implementation of [`PinController`].
//!
//! GPIOs are claimed lazily the first time the configuration touches
//! them. The pins in [`PWM_PINS`] belong to the PWM0 block for the
//! whole run and are never handed out as plain GPIO.

use embassy_nrf::gpio::{AnyPin, Flex, OutputDrive, Pull};
use embassy_nrf::peripherals::PWM0;
use embassy_nrf::pwm::{Prescaler, SimplePwm};

use crate::config::{MAX_GPIO, PWM_PINS};
use crate::hal::{PinController, PinMode};

const PIN_COUNT: usize = MAX_GPIO as usize + 1;

/// PWM counter top; one step per duty unit.
const PWM_MAX_DUTY: u16 = 255;

pub struct BoardPins {
    gpio: [Option<Flex<'static>>; PIN_COUNT],
    pwm: SimplePwm<'static, PWM0>,
}

impl BoardPins {
    /// Take the PWM block and its four output pins.
    pub fn new(pwm0: PWM0) -> Self {
        // SAFETY: PWM_PINS are excluded from `flex`, so each is owned
        // only by the PWM driver.
        let [p0, p1, p2, p3] = PWM_PINS.map(|pin| unsafe { AnyPin::steal(pin) });
        let mut pwm = SimplePwm::new_4ch(pwm0, p0, p1, p2, p3);
        pwm.set_prescaler(Prescaler::Div16);
        pwm.set_max_duty(PWM_MAX_DUTY);
        for channel in 0..PWM_PINS.len() {
            pwm.set_duty(channel, compare_for(0));
        }

        Self {
            gpio: core::array::from_fn(|_| None),
            pwm,
        }
    }

    fn pwm_channel(pin: u8) -> Option<usize> {
        PWM_PINS.iter().position(|&p| p == pin)
    }

    fn flex(&mut self, pin: u8) -> Option<&mut Flex<'static>> {
        if pin > MAX_GPIO || Self::pwm_channel(pin).is_some() {
            return None;
        }
        let slot = &mut self.gpio[usize::from(pin)];
        if slot.is_none() {
            // SAFETY: pins reach this point at most once, and nothing
            // else in the firmware claims numbered GPIOs.
            *slot = Some(Flex::new(unsafe { AnyPin::steal(pin) }));
        }
        slot.as_mut()
    }
}

/// The PWM block holds the output low until the compare value, so the
/// on-time is `max - compare`.
fn compare_for(duty: u8) -> u16 {
    PWM_MAX_DUTY - u16::from(duty)
}

impl PinController for BoardPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        if let Some(channel) = Self::pwm_channel(pin) {
            if mode != PinMode::Output {
                warn!("Pin {} is PWM-only - input mode ignored", pin);
            }
            self.pwm.set_duty(channel, compare_for(0));
            return;
        }
        let Some(flex) = self.flex(pin) else {
            warn!("Pin {} out of range", pin);
            return;
        };
        match mode {
            PinMode::Input => flex.set_as_input(Pull::None),
            PinMode::InputPullUp => flex.set_as_input(Pull::Up),
            PinMode::InputPullDown => flex.set_as_input(Pull::Down),
            PinMode::Output => {
                flex.set_low();
                flex.set_as_output(OutputDrive::Standard);
            }
        }
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        if Self::pwm_channel(pin).is_some() {
            self.analog_write(pin, if high { u8::MAX } else { 0 });
        } else if let Some(flex) = self.flex(pin) {
            if high {
                flex.set_high();
            } else {
                flex.set_low();
            }
        }
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        self.flex(pin).map(|flex| flex.is_high()).unwrap_or(false)
    }

    fn analog_write(&mut self, pin: u8, duty: u8) {
        match Self::pwm_channel(pin) {
            Some(channel) => self.pwm.set_duty(channel, compare_for(duty)),
            None => self.digital_write(pin, duty >= 128),
        }
    }
}
