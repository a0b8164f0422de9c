//! Factory calibration of the STM32G0 converter.
//!
//! The G0 has no two-point ADC trim. What it does carry is `VREFINT_CAL`, the
//! internal reference measured at a 3.0 V VDDA during production. Sampling
//! VREFINT at startup and scaling against that word yields the actual VDDA,
//! which is the converter's full-scale reference.

use core::ptr;

use embassy_stm32::adc::{Adc, SampleTime, VrefInt};
use embassy_stm32::peripherals::ADC1;
use ldr_core::calibration::{AdcProfile, FactoryTrim, TrimAvailability, TwoPointTrim};

use crate::board::vdda_millivolts;

/// Factory-programmed calibration constant sampled at 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

/// Reads the factory-trimmed VREFINT calibration constant.
#[must_use]
pub fn read_vrefint_calibration() -> u16 {
    unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
}

/// Borrows the converter long enough to measure VDDA against VREFINT.
pub struct VrefintTrim<'a, 'd> {
    adc: &'a mut Adc<'d, ADC1>,
    channel: VrefInt,
    calibration: u16,
}

impl<'a, 'd> VrefintTrim<'a, 'd> {
    /// Enables the internal voltage reference.
    pub fn new(adc: &'a mut Adc<'d, ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        let channel = adc.enable_vrefint();
        Self {
            adc,
            channel,
            calibration: read_vrefint_calibration(),
        }
    }

    fn read_once(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.channel)
    }
}

impl FactoryTrim for VrefintTrim<'_, '_> {
    fn availability(&self) -> TrimAvailability {
        // Erased flash reads back as all ones.
        TrimAvailability::new(false, self.calibration != 0 && self.calibration != u16::MAX)
    }

    fn two_point(&mut self, _: AdcProfile) -> Option<TwoPointTrim> {
        None
    }

    fn reference_millivolts(&mut self) -> Option<u16> {
        if !self.availability().reference {
            return None;
        }

        // First conversion after enabling VREFINT is unsettled.
        let _ = self.read_once();
        let reading = self.read_once();
        vdda_millivolts(self.calibration, reading)
    }
}
