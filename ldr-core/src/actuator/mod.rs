//! PWM actuator abstractions shared by firmware and host targets.
//!
//! [`PwmChannel`] models the two-phase duty update found on LEDC/timer
//! peripherals: a staged value only reaches the pin after `commit`. The
//! [`ToneActuator`] layers the alarm's on/off state on top and only touches
//! the channel on a state edge.

use core::fmt;

use crate::error::InitError;

/// Bit resolution of a PWM duty register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DutyResolution {
    bits: u8,
}

impl DutyResolution {
    /// Validates a resolution between 1 and 16 bits.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::InvalidResolution`] for `0` or more than 16 bits.
    pub const fn new(bits: u8) -> Result<Self, InitError> {
        if bits == 0 || bits > 16 {
            Err(InitError::InvalidResolution(bits))
        } else {
            Ok(Self { bits })
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    /// Number of duty steps per period (`2^bits`).
    #[must_use]
    pub const fn steps(self) -> u32 {
        1u32 << self.bits
    }

    /// Largest accepted duty value (`2^bits - 1`).
    #[must_use]
    pub const fn max_duty(self) -> u16 {
        u16::MAX >> (16 - self.bits)
    }

    /// Duty producing a 50 % square wave (`2^(bits - 1)`).
    #[must_use]
    pub const fn half_duty(self) -> u16 {
        1 << (self.bits - 1)
    }
}

/// Expresses a resolution-relative duty in timer compare counts.
///
/// `timer_max` is the timer's full-period compare value. The result is
/// `duty * (timer_max + 1) / 2^bits`, capped at `timer_max`.
#[must_use]
pub fn scale_duty_to_counts(duty: u16, resolution: DutyResolution, timer_max: u16) -> u16 {
    let period = u64::from(timer_max) + 1;
    let counts = u64::from(duty) * period / u64::from(resolution.steps());
    u16::try_from(counts.min(u64::from(timer_max))).unwrap_or(timer_max)
}

/// Checks that a timer period can represent every duty step.
///
/// # Errors
///
/// Returns [`InitError::PwmResolutionUnavailable`] when `timer_max` is below
/// the resolution's largest duty.
pub fn ensure_timer_resolution(resolution: DutyResolution, timer_max: u16) -> Result<(), InitError> {
    if timer_max < resolution.max_duty() {
        Err(InitError::PwmResolutionUnavailable {
            required: resolution.max_duty(),
            available: timer_max,
        })
    } else {
        Ok(())
    }
}

/// A configured PWM output with a double-buffered duty register.
///
/// Callers must keep `duty <= resolution().max_duty()`; implementations do not
/// clamp.
pub trait PwmChannel {
    /// Stages a new duty value.
    fn set_duty(&mut self, duty: u16);

    /// Applies the staged duty to the output.
    fn commit(&mut self);

    /// Resolution the channel was configured with.
    fn resolution(&self) -> DutyResolution;
}

impl<P: PwmChannel + ?Sized> PwmChannel for &mut P {
    fn set_duty(&mut self, duty: u16) {
        (**self).set_duty(duty);
    }

    fn commit(&mut self) {
        (**self).commit();
    }

    fn resolution(&self) -> DutyResolution {
        (**self).resolution()
    }
}

/// Logical output state of the alarm actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ActuatorState {
    #[default]
    Off,
    On,
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::Off => f.write_str("off"),
            ActuatorState::On => f.write_str("on"),
        }
    }
}

/// Passive buzzer driven with a 50 % tone while on and 0 % while off.
///
/// The actuator starts `Off` and assumes the channel was configured with a
/// zero duty. Requests matching the current state perform no hardware write.
pub struct ToneActuator<P: PwmChannel> {
    pwm: P,
    state: ActuatorState,
}

impl<P: PwmChannel> ToneActuator<P> {
    /// Wraps a channel whose output is currently silent.
    #[must_use]
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            state: ActuatorState::Off,
        }
    }

    /// Current logical state.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Starts the tone. Returns `true` when the hardware was written.
    pub fn turn_on(&mut self) -> bool {
        if self.state == ActuatorState::On {
            return false;
        }

        let duty = self.pwm.resolution().half_duty();
        self.write(duty);
        self.state = ActuatorState::On;
        true
    }

    /// Silences the tone. Returns `true` when the hardware was written.
    pub fn turn_off(&mut self) -> bool {
        if self.state == ActuatorState::Off {
            return false;
        }

        self.write(0);
        self.state = ActuatorState::Off;
        true
    }

    /// Drives the actuator toward `target`, returning `true` on an edge.
    pub fn set_state(&mut self, target: ActuatorState) -> bool {
        match target {
            ActuatorState::On => self.turn_on(),
            ActuatorState::Off => self.turn_off(),
        }
    }

    /// Provides access to the wrapped channel.
    #[must_use]
    pub fn channel(&self) -> &P {
        &self.pwm
    }

    /// Consumes the actuator and returns the wrapped channel.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.pwm
    }

    fn write(&mut self, duty: u16) {
        self.pwm.set_duty(duty);
        self.pwm.commit();
    }
}
