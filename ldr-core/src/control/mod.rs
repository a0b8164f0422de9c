//! Sensor-to-actuator control loop.
//!
//! [`ControlLoop`] owns everything one image needs at runtime: the sample
//! source, the immutable calibration table, and the actuation policy. The
//! executor (an Embassy task on the MCU, the emulator session on the host)
//! calls [`ControlLoop::step`] once per period and logs the returned
//! [`Iteration`].

use core::fmt;
use core::num::NonZeroU16;

use crate::actuator::{ActuatorState, PwmChannel, ToneActuator};
use crate::calibration::{AdcProfile, CalibrationTable, FactoryTrim};
use crate::config::LabConfig;
use crate::mapping::{ThresholdPolicy, map_to_duty};
use crate::sampling::{SampleSource, oversample};

/// Severity attached to a loop log line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// Per-iteration result of a [`ControlPolicy`].
pub trait Outcome: Copy {
    /// Severity of the iteration's log line.
    fn level(&self) -> LogLevel;

    /// Writes the iteration's log line.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying formatter.
    fn describe(&self, raw: u16, millivolts: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Actuator state entered during this iteration, if it changed.
    fn transition(&self) -> Option<ActuatorState> {
        None
    }
}

/// Turns an averaged raw code into an actuator command and applies it.
pub trait ControlPolicy {
    type Outcome: Outcome;

    fn apply(&mut self, raw: u16) -> Self::Outcome;
}

/// Duty written by the dimmer during one iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DimmerCommand {
    pub duty: u16,
}

impl Outcome for DimmerCommand {
    fn level(&self) -> LogLevel {
        LogLevel::Info
    }

    fn describe(&self, raw: u16, millivolts: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Raw ADC: {raw} ({millivolts} mV), Mapped Duty: {}",
            self.duty
        )
    }
}

/// Alarm state after one iteration and whether it changed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlarmCommand {
    pub state: ActuatorState,
    pub changed: bool,
}

impl Outcome for AlarmCommand {
    fn level(&self) -> LogLevel {
        match self.state {
            ActuatorState::On => LogLevel::Warn,
            ActuatorState::Off => LogLevel::Info,
        }
    }

    fn describe(&self, raw: u16, millivolts: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            ActuatorState::On => write!(
                f,
                "ALERT! Low light detected. ADC: {raw} ({millivolts} mV)"
            ),
            ActuatorState::Off => write!(f, "Light level OK. ADC: {raw} ({millivolts} mV)"),
        }
    }

    fn transition(&self) -> Option<ActuatorState> {
        self.changed.then_some(self.state)
    }
}

/// Challenge 1 policy: brightness proportional to light.
///
/// The duty is staged and committed on every iteration.
pub struct LinearDimmer<P: PwmChannel> {
    pwm: P,
    adc_max: u16,
}

impl<P: PwmChannel> LinearDimmer<P> {
    #[must_use]
    pub fn new(pwm: P, adc: AdcProfile) -> Self {
        Self {
            pwm,
            adc_max: adc.max_code(),
        }
    }

    /// Provides access to the wrapped channel.
    #[must_use]
    pub fn channel(&self) -> &P {
        &self.pwm
    }
}

impl<P: PwmChannel> ControlPolicy for LinearDimmer<P> {
    type Outcome = DimmerCommand;

    fn apply(&mut self, raw: u16) -> DimmerCommand {
        let duty = map_to_duty(raw, self.adc_max, self.pwm.resolution().max_duty());
        self.pwm.set_duty(duty);
        self.pwm.commit();
        DimmerCommand { duty }
    }
}

/// Challenge 2 policy: tone while the light level is below the threshold.
pub struct ThresholdAlarm<P: PwmChannel> {
    tone: ToneActuator<P>,
    policy: ThresholdPolicy,
    adc: AdcProfile,
}

impl<P: PwmChannel> ThresholdAlarm<P> {
    #[must_use]
    pub fn new(pwm: P, policy: ThresholdPolicy, adc: AdcProfile) -> Self {
        Self {
            tone: ToneActuator::new(pwm),
            policy,
            adc,
        }
    }

    /// Current actuator state.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        self.tone.state()
    }

    /// Threshold the alarm compares against.
    #[must_use]
    pub fn threshold(&self) -> u16 {
        self.policy.threshold()
    }

    /// Provides access to the wrapped channel.
    #[must_use]
    pub fn channel(&self) -> &P {
        self.tone.channel()
    }
}

impl<P: PwmChannel> ControlPolicy for ThresholdAlarm<P> {
    type Outcome = AlarmCommand;

    fn apply(&mut self, raw: u16) -> AlarmCommand {
        let target = self.policy.decide(self.adc.width.clamp(raw));
        let changed = self.tone.set_state(target);
        AlarmCommand {
            state: self.tone.state(),
            changed,
        }
    }
}

/// Record of one loop pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Iteration<O> {
    pub index: u32,
    pub raw: u16,
    pub millivolts: u32,
    pub outcome: O,
}

impl<O: Outcome> Iteration<O> {
    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.outcome.level()
    }
}

impl<O: Outcome> fmt::Display for Iteration<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outcome.describe(self.raw, self.millivolts, f)
    }
}

/// Single owner of the runtime state of one lab image.
pub struct ControlLoop<S, C> {
    source: S,
    calibration: CalibrationTable,
    policy: C,
    samples: NonZeroU16,
    iterations: u32,
}

impl<S: SampleSource, C: ControlPolicy> ControlLoop<S, C> {
    #[must_use]
    pub fn new(source: S, calibration: CalibrationTable, policy: C, samples: NonZeroU16) -> Self {
        Self {
            source,
            calibration,
            policy,
            samples,
            iterations: 0,
        }
    }

    /// Characterizes the converter from `trim` and builds the loop.
    pub fn characterize<T>(config: &LabConfig, source: S, trim: &mut T, policy: C) -> Self
    where
        T: FactoryTrim + ?Sized,
    {
        let calibration = CalibrationTable::characterize(config.adc, config.fallback_vref_mv, trim);
        Self::new(source, calibration, policy, config.samples)
    }

    /// Sample, average, map, and apply once.
    pub fn step(&mut self) -> Iteration<C::Outcome> {
        let raw = oversample(&mut self.source, self.samples);
        let millivolts = self.calibration.raw_to_millivolts(raw);
        let outcome = self.policy.apply(raw);

        let index = self.iterations;
        self.iterations = self.iterations.wrapping_add(1);

        Iteration {
            index,
            raw,
            millivolts,
            outcome,
        }
    }

    #[must_use]
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    #[must_use]
    pub fn policy(&self) -> &C {
        &self.policy
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Number of completed iterations (wrapping).
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::DutyResolution;
    use crate::calibration::{CalibrationSource, NoFactoryTrim};
    use crate::config::{ALARM_CONFIG, DIMMER_CONFIG};

    struct Constant(u16);

    impl SampleSource for Constant {
        fn read_raw(&mut self) -> u16 {
            self.0
        }
    }

    #[derive(Default)]
    struct SpyPwm {
        staged: Option<u16>,
        output: u16,
        set_calls: usize,
    }

    impl PwmChannel for SpyPwm {
        fn set_duty(&mut self, duty: u16) {
            self.staged = Some(duty);
            self.set_calls += 1;
        }

        fn commit(&mut self) {
            if let Some(duty) = self.staged.take() {
                self.output = duty;
            }
        }

        fn resolution(&self) -> DutyResolution {
            DutyResolution::new(10).unwrap()
        }
    }

    #[test]
    fn dimmer_writes_every_iteration() {
        let policy = LinearDimmer::new(SpyPwm::default(), DIMMER_CONFIG.adc);
        let mut control =
            ControlLoop::characterize(&DIMMER_CONFIG, Constant(2048), &mut NoFactoryTrim, policy);

        let first = control.step();
        let second = control.step();

        assert_eq!(first.outcome.duty, 511);
        assert_eq!(second.index, 1);
        assert_eq!(control.policy().channel().set_calls, 2);
        assert_eq!(control.policy().channel().output, 511);
        assert_eq!(
            control.calibration().source(),
            CalibrationSource::DefaultReference
        );
    }

    #[test]
    fn dimmer_log_line_matches_exercise_format() {
        let policy = LinearDimmer::new(SpyPwm::default(), DIMMER_CONFIG.adc);
        let mut control =
            ControlLoop::characterize(&DIMMER_CONFIG, Constant(4095), &mut NoFactoryTrim, policy);

        let iteration = control.step();
        assert_eq!(iteration.level(), LogLevel::Info);
        assert_eq!(
            iteration.to_string(),
            "Raw ADC: 4095 (3902 mV), Mapped Duty: 1023"
        );
    }

    #[test]
    fn alarm_log_levels_follow_state() {
        let policy = ThresholdAlarm::new(
            SpyPwm::default(),
            ThresholdPolicy::new(ALARM_CONFIG.threshold),
            ALARM_CONFIG.adc,
        );
        let mut control =
            ControlLoop::characterize(&ALARM_CONFIG, Constant(0), &mut NoFactoryTrim, policy);

        let dark = control.step();
        assert_eq!(dark.level(), LogLevel::Warn);
        assert_eq!(dark.to_string(), "ALERT! Low light detected. ADC: 0 (0 mV)");

        control.source_mut().0 = 4095;
        let bright = control.step();
        assert_eq!(bright.level(), LogLevel::Info);
        assert!(bright.outcome.changed);
        assert_eq!(
            bright.to_string(),
            "Light level OK. ADC: 4095 (3902 mV)"
        );
    }

    #[test]
    fn alarm_clamps_out_of_range_codes() {
        let policy = ThresholdAlarm::new(
            SpyPwm::default(),
            ThresholdPolicy::new(5000),
            ALARM_CONFIG.adc,
        );
        let mut control =
            ControlLoop::characterize(&ALARM_CONFIG, Constant(u16::MAX), &mut NoFactoryTrim, policy);

        // Clamped to 4095, which is still below the oversized threshold.
        assert_eq!(control.step().outcome.state, ActuatorState::On);
    }
}
