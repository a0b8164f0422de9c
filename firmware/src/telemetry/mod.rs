//! Log output for the lab images.
//!
//! Messages are rendered through `core::fmt::Display`, so the same text goes
//! to defmt/RTT on the MCU and to stdout on host builds. Alarm edges and the
//! chosen calibration source are also kept in the core telemetry ring.

use core::fmt;

use ldr_core::calibration::{CalibrationTable, TrimAvailability};
use ldr_core::config::{LabConfig, LabVariant};
use ldr_core::control::{Iteration, LogLevel, Outcome};
use ldr_core::telemetry::TelemetryRecorder;

use crate::board;

/// Owns the event ring and tags every line with the image's log tag.
pub struct Telemetry {
    tag: &'static str,
    recorder: TelemetryRecorder,
}

impl Telemetry {
    #[must_use]
    pub const fn new(variant: LabVariant) -> Self {
        Self {
            tag: variant.tag(),
            recorder: TelemetryRecorder::new(),
        }
    }

    /// Logs which factory trims exist and which one the table was built from.
    pub fn calibration(&mut self, availability: TrimAvailability, table: &CalibrationTable) {
        emit_log(LogLevel::Info, self.tag, &availability.two_point_label());
        emit_log(LogLevel::Info, self.tag, &availability.reference_label());
        emit_log(LogLevel::Info, self.tag, &table.source());
        self.recorder.record_characterization(table.source());
    }

    /// Logs the startup banner and pin assignment.
    pub fn startup(&self, config: &LabConfig) {
        emit_log(LogLevel::Info, self.tag, &config.variant.banner());
        emit_log(LogLevel::Info, self.tag, &PinSummary(config));
        if config.variant == LabVariant::Alarm {
            emit_log(
                LogLevel::Info,
                self.tag,
                &format_args!("Threshold: ADC < {}", config.threshold),
            );
        }
    }

    /// Logs that the status LED has been driven high.
    pub fn status_led_on(&self) {
        emit_log(
            LogLevel::Info,
            self.tag,
            &format_args!("Status LED ON ({})", board::STATUS_LED_PIN),
        );
    }

    /// Logs one loop pass and records actuator edges.
    pub fn iteration<O: Outcome>(&mut self, iteration: &Iteration<O>) {
        emit_log(iteration.level(), self.tag, iteration);
        if self.recorder.record_iteration(iteration).is_some()
            && let Some(record) = self.recorder.latest()
        {
            emit_log(LogLevel::Info, self.tag, record);
        }
    }

    #[must_use]
    pub fn recorder(&self) -> &TelemetryRecorder {
        &self.recorder
    }
}

struct PinSummary<'a>(&'a LabConfig);

impl fmt::Display for PinSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = match self.0.variant {
            LabVariant::Dimmer => "LED",
            LabVariant::Alarm => "Buzzer",
        };
        write!(
            f,
            "LDR on {}, {} on {} ({}, {} Hz)",
            board::LDR_PIN,
            output,
            board::PWM_PIN,
            board::PWM_TIMER,
            self.0.pwm_frequency_hz
        )
    }
}

#[cfg(target_os = "none")]
fn emit_log<T: fmt::Display>(level: LogLevel, tag: &'static str, message: &T) {
    let message = defmt::Display2Format(message);
    match level {
        LogLevel::Info => defmt::info!("{}: {}", tag, message),
        LogLevel::Warn => defmt::warn!("{}: {}", tag, message),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log<T: fmt::Display>(level: LogLevel, tag: &'static str, message: &T) {
    let level = match level {
        LogLevel::Info => "I",
        LogLevel::Warn => "W",
    };
    println!("{level} ({tag}): {message}");
}
