use ldr_core::actuator::{ActuatorState, DutyResolution, PwmChannel};
use ldr_core::calibration::NoFactoryTrim;
use ldr_core::config::ALARM_CONFIG;
use ldr_core::control::{ControlLoop, ThresholdAlarm};
use ldr_core::mapping::ThresholdPolicy;
use ldr_core::sampling::SampleSource;
use ldr_core::telemetry::{TelemetryEventKind, TelemetryRecorder};

struct Level(u16);

impl SampleSource for Level {
    fn read_raw(&mut self) -> u16 {
        self.0
    }
}

/// Counts duty writes so redundant hardware access shows up.
#[derive(Default)]
struct SpyPwm {
    staged: Option<u16>,
    output: u16,
    set_duty_calls: usize,
}

impl PwmChannel for SpyPwm {
    fn set_duty(&mut self, duty: u16) {
        self.staged = Some(duty);
        self.set_duty_calls += 1;
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

fn alarm_at(raw: u16) -> ControlLoop<Level, ThresholdAlarm<SpyPwm>> {
    let policy = ThresholdAlarm::new(
        SpyPwm::default(),
        ThresholdPolicy::new(ALARM_CONFIG.threshold),
        ALARM_CONFIG.adc,
    );
    ControlLoop::characterize(&ALARM_CONFIG, Level(raw), &mut NoFactoryTrim, policy)
}

#[test]
fn starts_silent() {
    let control = alarm_at(4095);
    assert_eq!(control.policy().state(), ActuatorState::Off);
    assert_eq!(control.policy().channel().set_duty_calls, 0);
}

#[test]
fn low_light_turns_on_exactly_once() {
    let mut control = alarm_at(999);

    let first = control.step();
    let second = control.step();

    assert_eq!(first.outcome.state, ActuatorState::On);
    assert!(first.outcome.changed);
    assert_eq!(second.outcome.state, ActuatorState::On);
    assert!(!second.outcome.changed);

    let pwm = control.policy().channel();
    assert_eq!(pwm.set_duty_calls, 1, "second identical reading must not write");
    assert_eq!(pwm.output, 512, "tone is a 50% square wave");
}

#[test]
fn threshold_itself_counts_as_bright() {
    let mut control = alarm_at(1000);

    assert_eq!(control.step().outcome.state, ActuatorState::Off);
    assert_eq!(control.policy().channel().set_duty_calls, 0);
}

#[test]
fn recovering_light_silences_the_tone() {
    let mut control = alarm_at(200);
    control.step();

    control.source_mut().0 = 3000;
    let iteration = control.step();

    assert_eq!(iteration.outcome.state, ActuatorState::Off);
    assert!(iteration.outcome.changed);
    assert_eq!(control.policy().channel().output, 0);
    assert_eq!(control.policy().channel().set_duty_calls, 2);
}

#[test]
fn readings_hovering_at_threshold_chatter_every_iteration() {
    // No dead band is applied: 999/1000 alternation flips the buzzer each pass.
    let mut control = alarm_at(999);
    let mut telemetry = TelemetryRecorder::new();

    for index in 0..10u16 {
        control.source_mut().0 = if index % 2 == 0 { 999 } else { 1000 };
        let iteration = control.step();
        telemetry.record_iteration(&iteration);
    }

    assert_eq!(telemetry.transitions(), 10);
    assert_eq!(control.policy().channel().set_duty_calls, 10);
    assert_eq!(
        telemetry.latest().map(|record| record.event),
        Some(TelemetryEventKind::ActuatorOff)
    );
}
