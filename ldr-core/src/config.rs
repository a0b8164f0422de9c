//! Compile-time presets for the two lab images.

use core::num::NonZeroU16;
use core::time::Duration;

use crate::actuator::DutyResolution;
use crate::calibration::{AdcProfile, AdcWidth, Attenuation};
use crate::error::InitError;
use crate::mapping::DEFAULT_THRESHOLD;
use crate::sampling::OVERSAMPLE_COUNT;

/// Fixed cadence of the control loop.
pub const LOOP_PERIOD: Duration = Duration::from_millis(100);

/// Reference voltage assumed when the part carries no factory trim.
pub const DEFAULT_VREF_MV: u16 = 1100;

/// LED carrier frequency for the dimmer image.
pub const DIMMER_PWM_HZ: u32 = 5_000;

/// Buzzer tone frequency for the alarm image.
pub const ALARM_PWM_HZ: u32 = 2_000;

/// Duty register width of both images.
pub const DUTY_BITS: u8 = 10;

/// Converter setup shared by both images: 12-bit codes, 11 dB input range.
pub const LAB_ADC_PROFILE: AdcProfile = AdcProfile::new(AdcWidth::Bits12, Attenuation::Db11);

/// Which lab exercise an image implements.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LabVariant {
    /// Challenge 1: LED brightness follows the light level.
    Dimmer,
    /// Challenge 2: buzzer sounds while the light level is low.
    Alarm,
}

impl LabVariant {
    /// Tag prefixed to every log line of the image.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            LabVariant::Dimmer => "LDR_LED_Control",
            LabVariant::Alarm => "LDR_PassiveBuzzer_LED",
        }
    }

    /// Startup banner printed once peripherals are configured.
    #[must_use]
    pub const fn banner(self) -> &'static str {
        match self {
            LabVariant::Dimmer => "LDR to LED Control Initialized.",
            LabVariant::Alarm => "LDR Passive Buzzer Alert with Status LED Initialized.",
        }
    }

    /// Preset matching the variant.
    #[must_use]
    pub const fn config(self) -> LabConfig {
        match self {
            LabVariant::Dimmer => DIMMER_CONFIG,
            LabVariant::Alarm => ALARM_CONFIG,
        }
    }
}

/// Every tunable of a lab image, fixed at compile time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LabConfig {
    pub variant: LabVariant,
    pub adc: AdcProfile,
    pub fallback_vref_mv: u16,
    pub samples: NonZeroU16,
    pub period: Duration,
    pub pwm_frequency_hz: u32,
    pub duty_bits: u8,
    /// Only consulted by the alarm image.
    pub threshold: u16,
}

impl LabConfig {
    /// Replaces the converter profile and fallback reference, e.g. for a board
    /// whose ADC has no input attenuator.
    #[must_use]
    pub const fn with_converter(mut self, adc: AdcProfile, fallback_vref_mv: u16) -> Self {
        self.adc = adc;
        self.fallback_vref_mv = fallback_vref_mv;
        self
    }

    /// Validated duty resolution for the PWM channel.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::InvalidResolution`] when `duty_bits` is outside
    /// `1..=16`.
    pub const fn duty_resolution(&self) -> Result<DutyResolution, InitError> {
        DutyResolution::new(self.duty_bits)
    }
}

pub const DIMMER_CONFIG: LabConfig = LabConfig {
    variant: LabVariant::Dimmer,
    adc: LAB_ADC_PROFILE,
    fallback_vref_mv: DEFAULT_VREF_MV,
    samples: OVERSAMPLE_COUNT,
    period: LOOP_PERIOD,
    pwm_frequency_hz: DIMMER_PWM_HZ,
    duty_bits: DUTY_BITS,
    threshold: DEFAULT_THRESHOLD,
};

pub const ALARM_CONFIG: LabConfig = LabConfig {
    variant: LabVariant::Alarm,
    pwm_frequency_hz: ALARM_PWM_HZ,
    ..DIMMER_CONFIG
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_use_ten_bit_duty() {
        let resolution = DIMMER_CONFIG.duty_resolution().unwrap();
        assert_eq!(resolution.max_duty(), 1023);
        assert_eq!(ALARM_CONFIG.duty_resolution(), Ok(resolution));
    }

    #[test]
    fn out_of_range_duty_width_fails_bring_up() {
        let config = LabConfig {
            duty_bits: 17,
            ..DIMMER_CONFIG
        };
        assert_eq!(config.duty_resolution(), Err(InitError::InvalidResolution(17)));
    }
}
