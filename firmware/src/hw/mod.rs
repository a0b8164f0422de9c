//! Embassy adapters implementing the `ldr-core` hardware traits.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::{ADC1, TIM3};
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;
use ldr_core::actuator::{
    DutyResolution, PwmChannel, ensure_timer_resolution, scale_duty_to_counts,
};
use ldr_core::error::InitError;
use ldr_core::sampling::SampleSource;

mod trim;

pub use trim::VrefintTrim;

/// LDR divider on an ADC1 input, read with blocking single conversions.
pub struct LightSensor<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
}

impl<'d> LightSensor<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self { adc, channel }
    }
}

impl SampleSource for LightSensor<'_> {
    fn read_raw(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.channel)
    }
}

/// TIM3 channel driven through the two-phase duty update.
///
/// Duties are expressed in the configured resolution and scaled to timer
/// counts on commit.
pub struct TimerPwm<'d> {
    channel: SimplePwmChannel<'d, TIM3>,
    resolution: DutyResolution,
    timer_max: u16,
    staged: Option<u16>,
}

impl<'d> TimerPwm<'d> {
    /// Enables the channel at 0 % duty.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::PwmResolutionUnavailable`] when the timer period at
    /// the configured carrier cannot represent every step of `resolution`.
    pub fn new(
        mut channel: SimplePwmChannel<'d, TIM3>,
        resolution: DutyResolution,
    ) -> Result<Self, InitError> {
        let timer_max = channel.max_duty_cycle();
        ensure_timer_resolution(resolution, timer_max)?;

        channel.set_duty_cycle(0);
        channel.enable();

        Ok(Self {
            channel,
            resolution,
            timer_max,
            staged: None,
        })
    }
}

impl PwmChannel for TimerPwm<'_> {
    fn set_duty(&mut self, duty: u16) {
        self.staged = Some(duty);
    }

    fn commit(&mut self) {
        if let Some(duty) = self.staged.take() {
            let counts = scale_duty_to_counts(duty, self.resolution, self.timer_max);
            self.channel.set_duty_cycle(counts);
        }
    }

    fn resolution(&self) -> DutyResolution {
        self.resolution
    }
}
