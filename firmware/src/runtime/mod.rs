//! Peripheral bring-up and the periodic control task.
//!
//! Bring-up characterizes the converter, configures TIM3 for the image's
//! carrier and hands a fully built [`ControlLoop`] to a single Embassy task.
//! Configuration errors are fatal and surface through the panic handler.

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Level, Output, OutputType, Speed};
use embassy_stm32::peripherals::{ADC1, PA6, TIM3};
use embassy_stm32::time::hz;
use embassy_stm32::timer::Ch1;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::Peri;
use embassy_time::{Duration, Timer};
use ldr_core::calibration::{CalibrationTable, FactoryTrim};
use ldr_core::config::LabConfig;
use ldr_core::control::{ControlLoop, ControlPolicy, LinearDimmer, ThresholdAlarm};
use ldr_core::error::InitError;
use ldr_core::mapping::ThresholdPolicy;
use ldr_core::sampling::SampleSource;

use crate::board;
use crate::hw::{LightSensor, TimerPwm, VrefintTrim};
use crate::telemetry::Telemetry;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub type DimmerLoop = ControlLoop<LightSensor<'static>, LinearDimmer<TimerPwm<'static>>>;
pub type AlarmLoop = ControlLoop<LightSensor<'static>, ThresholdAlarm<TimerPwm<'static>>>;

/// Brings up the dimmer image and spawns its control task.
pub fn start_dimmer(spawner: Spawner) {
    let config = board::DIMMER;
    let hal::Peripherals {
        ADC1, PA0, PA6, TIM3, ..
    } = hal::init(hal::Config::default());

    let mut telemetry = Telemetry::new(config.variant);
    let mut adc = Adc::new(ADC1);
    let calibration = characterize_converter(&mut adc, &config, &mut telemetry);
    let pwm = configure_pwm(TIM3, PA6, &config).expect("PWM configuration");
    let sensor = LightSensor::new(adc, PA0.degrade_adc());
    telemetry.startup(&config);

    let control = ControlLoop::new(
        sensor,
        calibration,
        LinearDimmer::new(pwm, config.adc),
        config.samples,
    );

    spawner
        .spawn(dimmer_task(control, telemetry, config.period))
        .expect("failed to spawn control task");
}

/// Brings up the alarm image, lights the status LED and spawns its control task.
pub fn start_alarm(spawner: Spawner) {
    let config = board::ALARM;
    let hal::Peripherals {
        ADC1,
        PA0,
        PA5,
        PA6,
        TIM3,
        ..
    } = hal::init(hal::Config::default());

    let mut telemetry = Telemetry::new(config.variant);
    let mut adc = Adc::new(ADC1);
    let calibration = characterize_converter(&mut adc, &config, &mut telemetry);
    let pwm = configure_pwm(TIM3, PA6, &config).expect("PWM configuration");
    let sensor = LightSensor::new(adc, PA0.degrade_adc());

    let status_led = Output::new(PA5, Level::High, Speed::Low);
    telemetry.startup(&config);
    telemetry.status_led_on();

    let control = ControlLoop::new(
        sensor,
        calibration,
        ThresholdAlarm::new(pwm, ThresholdPolicy::new(config.threshold), config.adc),
        config.samples,
    );

    spawner
        .spawn(alarm_task(control, telemetry, status_led, config.period))
        .expect("failed to spawn control task");
}

/// Measures VDDA against the factory VREFINT word and logs the outcome.
fn characterize_converter(
    adc: &mut Adc<'static, ADC1>,
    config: &LabConfig,
    telemetry: &mut Telemetry,
) -> CalibrationTable {
    let mut trim = VrefintTrim::new(adc);
    let availability = trim.availability();
    let table = CalibrationTable::characterize(config.adc, config.fallback_vref_mv, &mut trim);
    telemetry.calibration(availability, &table);
    table
}

/// Configures TIM3 CH1 on PA6 at the image's carrier frequency.
fn configure_pwm(
    timer: Peri<'static, TIM3>,
    pin: Peri<'static, PA6>,
    config: &LabConfig,
) -> Result<TimerPwm<'static>, InitError> {
    let resolution = config.duty_resolution()?;
    let pin: PwmPin<'_, TIM3, Ch1> = PwmPin::new(pin, OutputType::PushPull);
    let pwm = SimplePwm::new(
        timer,
        Some(pin),
        None,
        None,
        None,
        hz(config.pwm_frequency_hz),
        Default::default(),
    );
    TimerPwm::new(pwm.split().ch1, resolution)
}

#[embassy_executor::task]
async fn dimmer_task(control: DimmerLoop, telemetry: Telemetry, period: core::time::Duration) -> ! {
    run(control, telemetry, period).await
}

#[embassy_executor::task]
async fn alarm_task(
    control: AlarmLoop,
    telemetry: Telemetry,
    status_led: Output<'static>,
    period: core::time::Duration,
) -> ! {
    // Dropping the driver would float PA5.
    let _status_led = status_led;
    run(control, telemetry, period).await
}

/// Sample, apply and log once per period, forever.
async fn run<S, C>(
    mut control: ControlLoop<S, C>,
    mut telemetry: Telemetry,
    period: core::time::Duration,
) -> !
where
    S: SampleSource,
    C: ControlPolicy,
{
    let period = Duration::from_micros(u64::try_from(period.as_micros()).unwrap_or(u64::MAX));
    loop {
        let iteration = control.step();
        telemetry.iteration(&iteration);
        Timer::after(period).await;
    }
}
