//! Pin assignment and converter constants for the STM32G0B1 lab board.

use ldr_core::calibration::{AdcProfile, AdcWidth, Attenuation};
use ldr_core::config::{ALARM_CONFIG, DIMMER_CONFIG, LabConfig};

/// The G0 converter has no input attenuator and measures against VDDA.
pub const BOARD_ADC_PROFILE: AdcProfile = AdcProfile::new(AdcWidth::Bits12, Attenuation::Db0);

/// Nominal VDDA assumed when the VREFINT measurement is unusable.
pub const NOMINAL_VDDA_MV: u16 = 3_300;

/// VDDA at which the factory `VREFINT_CAL` word was measured.
pub const VREFINT_CAL_MV: u32 = 3_000;

/// `VDDA = 3000 mV * VREFINT_CAL / VREFINT_DATA`.
///
/// `None` for a zero reading or a result that does not fit in `u16`.
#[must_use]
pub fn vdda_millivolts(calibration: u16, reading: u16) -> Option<u16> {
    if reading == 0 {
        return None;
    }
    let millivolts = VREFINT_CAL_MV * u32::from(calibration) / u32::from(reading);
    u16::try_from(millivolts).ok()
}

pub const LDR_PIN: &str = "PA0";
pub const PWM_PIN: &str = "PA6";
pub const PWM_TIMER: &str = "TIM3 CH1";
pub const STATUS_LED_PIN: &str = "PA5";

pub const DIMMER: LabConfig = DIMMER_CONFIG.with_converter(BOARD_ADC_PROFILE, NOMINAL_VDDA_MV);
pub const ALARM: LabConfig = ALARM_CONFIG.with_converter(BOARD_ADC_PROFILE, NOMINAL_VDDA_MV);

#[cfg(test)]
mod tests {
    use super::*;
    use ldr_core::calibration::{CalibrationSource, CalibrationTable, NoFactoryTrim};

    #[test]
    fn board_presets_keep_lab_timing() {
        assert_eq!(DIMMER.period, DIMMER_CONFIG.period);
        assert_eq!(ALARM.pwm_frequency_hz, 2_000);
        assert_eq!(ALARM.threshold, 1_000);
        assert_eq!(DIMMER.adc.attenuation, Attenuation::Db0);
    }

    #[test]
    fn fallback_full_scale_is_nominal_vdda() {
        let table =
            CalibrationTable::characterize(DIMMER.adc, DIMMER.fallback_vref_mv, &mut NoFactoryTrim);
        assert_eq!(table.source(), CalibrationSource::DefaultReference);
        assert_eq!(table.raw_to_millivolts(4095), 3_300);
    }

    #[test]
    fn vdda_scales_against_factory_word() {
        assert_eq!(vdda_millivolts(1_650, 1_650), Some(3_000));
        assert_eq!(vdda_millivolts(1_650, 1_500), Some(3_300));
        assert_eq!(vdda_millivolts(1_650, 0), None);
        assert_eq!(vdda_millivolts(u16::MAX, 1), None);
    }
}
