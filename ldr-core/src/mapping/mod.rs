//! Light-level to actuator command policies.
//!
//! Both policies work on the averaged raw code, never on the converted
//! millivolts: the LDR divider is not assumed linear in volts, so the voltage
//! is only reported.

use crate::actuator::ActuatorState;

/// Full-scale code of the 12-bit converter used by the labs.
pub const ADC_MAX: u16 = 4095;

/// Full-scale duty of the 10-bit PWM used by the labs.
pub const DUTY_MAX: u16 = 1023;

/// Averaged code below which the alarm sounds.
pub const DEFAULT_THRESHOLD: u16 = 1000;

/// Linearly rescales a raw code from `0..=adc_max` onto `0..=duty_max`.
///
/// The code is clamped to `adc_max` first, so the result never exceeds
/// `duty_max`. A zero `adc_max` maps everything to `0`.
#[must_use]
pub fn map_to_duty(raw: u16, adc_max: u16, duty_max: u16) -> u16 {
    if adc_max == 0 {
        return 0;
    }

    let clamped = raw.min(adc_max);
    let scaled = u32::from(clamped) * u32::from(duty_max) / u32::from(adc_max);
    u16::try_from(scaled).unwrap_or(duty_max)
}

/// Challenge 1 mapping: 12-bit converter code to 10-bit LED duty.
#[must_use]
pub fn map_adc_to_duty(raw: u16) -> u16 {
    map_to_duty(raw, ADC_MAX, DUTY_MAX)
}

/// Challenge 2 decision: sound while the averaged code is below `threshold`.
///
/// There is no dead band; readings hovering at the threshold flip the
/// decision on every iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ThresholdPolicy {
    threshold: u16,
}

impl ThresholdPolicy {
    #[must_use]
    pub const fn new(threshold: u16) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub const fn threshold(&self) -> u16 {
        self.threshold
    }

    #[must_use]
    pub const fn decide(&self, raw: u16) -> ActuatorState {
        if raw < self.threshold {
            ActuatorState::On
        } else {
            ActuatorState::Off
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_stays_within_resolution_for_every_code() {
        for raw in 0..=ADC_MAX {
            assert!(map_adc_to_duty(raw) <= DUTY_MAX, "raw {raw} exceeded duty range");
        }
    }

    #[test]
    fn duty_is_monotonic() {
        let mut previous = map_adc_to_duty(0);
        for raw in 1..=ADC_MAX {
            let duty = map_adc_to_duty(raw);
            assert!(duty >= previous, "duty dropped at raw {raw}");
            previous = duty;
        }
    }

    #[test]
    fn codes_above_full_scale_clamp() {
        assert_eq!(map_adc_to_duty(4095), 1023);
        assert_eq!(map_adc_to_duty(4096), 1023);
        assert_eq!(map_adc_to_duty(u16::MAX), 1023);
    }

    #[test]
    fn reference_points_truncate() {
        assert_eq!(map_adc_to_duty(0), 0);
        assert_eq!(map_adc_to_duty(2048), 511);
        assert_eq!(map_adc_to_duty(4), 0);
        assert_eq!(map_adc_to_duty(5), 1);
    }

    #[test]
    fn generic_mapping_handles_other_resolutions() {
        assert_eq!(map_to_duty(1023, 1023, 255), 255);
        assert_eq!(map_to_duty(512, 1023, 255), 127);
        assert_eq!(map_to_duty(10, 0, 255), 0);
        assert_eq!(map_to_duty(u16::MAX, u16::MAX, u16::MAX), u16::MAX);
    }

    #[test]
    fn threshold_is_exclusive() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.decide(0), ActuatorState::On);
        assert_eq!(policy.decide(999), ActuatorState::On);
        assert_eq!(policy.decide(1000), ActuatorState::Off);
        assert_eq!(policy.decide(4095), ActuatorState::Off);
    }
}
