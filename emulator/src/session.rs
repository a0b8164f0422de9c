use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant as HostInstant};

use ldr_core::actuator::{DutyResolution, PwmChannel};
use ldr_core::calibration::{
    AdcProfile, CalibrationTable, FactoryTrim, TrimAvailability, TrimPoint, TwoPointTrim,
};
use ldr_core::config::{LabConfig, LabVariant};
use ldr_core::control::{ControlLoop, ControlPolicy, LinearDimmer, LogLevel, ThresholdAlarm};
use ldr_core::error::InitError;
use ldr_core::mapping::ThresholdPolicy;
use ldr_core::sampling::SampleSource;
use ldr_core::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecorder};
use winnow::ascii::{Caseless, alpha1, dec_uint, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;

/// Upper bound on iterations a single `tick` or `sweep` may run.
pub const MAX_TICKS: u32 = 1_000;

/// Burned-in trim points of the simulated part.
pub const SIMULATED_TWO_POINT: TwoPointTrim =
    TwoPointTrim::new(TrimPoint::new(160, 150), TrimPoint::new(2580, 2450));

/// Factory reference voltage of the simulated part.
pub const SIMULATED_VREF_MV: u16 = 1114;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "light",
        "light <raw>               - set the ADC code the simulated LDR produces",
    ),
    (
        "tick",
        "tick [n]                  - run n control-loop iterations (default 1)",
    ),
    (
        "sweep",
        "sweep <from> <to> <step>  - step the light level, one iteration per level",
    ),
    (
        "status",
        "status                    - show calibration, actuator, and telemetry state",
    ),
    (
        "help",
        "help [topic]              - show help for a command",
    ),
    ("exit", "exit                      - close the session"),
];

/// Factory calibration data the simulated part carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrimProfile {
    /// Two-point trim plus a factory reference voltage.
    TwoPoint,
    /// Factory reference voltage only.
    Vref,
    /// No factory data; the default reference applies.
    Absent,
}

impl TrimProfile {
    pub fn tag(self) -> &'static str {
        match self {
            TrimProfile::TwoPoint => "two-point",
            TrimProfile::Vref => "vref",
            TrimProfile::Absent => "none",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("two-point") {
            Ok(Self::TwoPoint)
        } else if tag.eq_ignore_ascii_case("vref") {
            Ok(Self::Vref)
        } else if tag.eq_ignore_ascii_case("none") {
            Ok(Self::Absent)
        } else {
            Err(format!("Unknown trim profile `{tag}`"))
        }
    }
}

pub fn variant_from_tag(tag: &str) -> Result<LabVariant, String> {
    if tag.eq_ignore_ascii_case("dimmer") {
        Ok(LabVariant::Dimmer)
    } else if tag.eq_ignore_ascii_case("alarm") {
        Ok(LabVariant::Alarm)
    } else {
        Err(format!("Unknown variant `{tag}`"))
    }
}

pub fn variant_tag(variant: LabVariant) -> &'static str {
    match variant {
        LabVariant::Dimmer => "dimmer",
        LabVariant::Alarm => "alarm",
    }
}

/// Which image to simulate and where to keep the transcript.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionOptions {
    pub variant: LabVariant,
    pub trim: TrimProfile,
    pub transcript: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            variant: LabVariant::Dimmer,
            trim: TrimProfile::TwoPoint,
            transcript: None,
        }
    }
}

/// Parsed emulator command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    Light(u16),
    Tick(u32),
    Sweep { from: u16, to: u16, step: u16 },
    Status,
    Help(Option<&'a str>),
    Exit,
}

/// Parses one command line; the error is the `ERR` line to print.
pub fn parse_command(line: &str) -> Result<Command<'_>, String> {
    command
        .parse(line)
        .map_err(|err| format!("ERR syntax at column {}: `{line}`", err.offset() + 1))
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    alt((light, tick, sweep, status, help, exit)).parse_next(input)
}

fn light<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded((Caseless("light"), space1), dec_uint)
        .map(Command::Light)
        .parse_next(input)
}

fn tick<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("tick"), opt(preceded(space1, dec_uint)))
        .map(|count: Option<u32>| Command::Tick(count.unwrap_or(1)))
        .parse_next(input)
}

fn sweep<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("sweep"), space1),
        (
            dec_uint,
            preceded(space1, dec_uint),
            preceded(space1, dec_uint),
        ),
    )
    .map(|(from, to, step): (u16, u16, u16)| Command::Sweep { from, to, step })
    .parse_next(input)
}

fn status<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    Caseless("status").value(Command::Status).parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("help"), opt(preceded(space1, alpha1)))
        .map(Command::Help)
        .parse_next(input)
}

fn exit<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    alt((Caseless("exit"), Caseless("quit")))
        .value(Command::Exit)
        .parse_next(input)
}

/// Simulated LDR divider; reads saturate at the converter's full scale.
#[derive(Debug)]
pub struct SimulatedSensor {
    level: u16,
    max_code: u16,
    reads: u64,
}

impl SimulatedSensor {
    fn new(profile: AdcProfile) -> Self {
        Self {
            level: 0,
            max_code: profile.max_code(),
            reads: 0,
        }
    }
}

impl SampleSource for SimulatedSensor {
    fn read_raw(&mut self) -> u16 {
        self.reads += 1;
        self.level.min(self.max_code)
    }
}

/// PWM channel that remembers the committed duty and counts writes.
#[derive(Debug)]
pub struct RecordingPwm {
    resolution: DutyResolution,
    staged: Option<u16>,
    output: u16,
    writes: u32,
}

impl RecordingPwm {
    fn new(resolution: DutyResolution) -> Self {
        Self {
            resolution,
            staged: None,
            output: 0,
            writes: 0,
        }
    }
}

impl PwmChannel for RecordingPwm {
    fn set_duty(&mut self, duty: u16) {
        self.staged = Some(duty);
        self.writes += 1;
    }

    fn commit(&mut self) {
        if let Some(duty) = self.staged.take() {
            self.output = duty;
        }
    }

    fn resolution(&self) -> DutyResolution {
        self.resolution
    }
}

struct SimulatedTrim(TrimProfile);

impl FactoryTrim for SimulatedTrim {
    fn availability(&self) -> TrimAvailability {
        match self.0 {
            TrimProfile::TwoPoint => TrimAvailability::new(true, true),
            TrimProfile::Vref => TrimAvailability::new(false, true),
            TrimProfile::Absent => TrimAvailability::default(),
        }
    }

    fn two_point(&mut self, _: AdcProfile) -> Option<TwoPointTrim> {
        self.availability().two_point.then_some(SIMULATED_TWO_POINT)
    }

    fn reference_millivolts(&mut self) -> Option<u16> {
        self.availability().reference.then_some(SIMULATED_VREF_MV)
    }
}

type DimmerRig = ControlLoop<SimulatedSensor, LinearDimmer<RecordingPwm>>;
type AlarmRig = ControlLoop<SimulatedSensor, ThresholdAlarm<RecordingPwm>>;

/// The image under simulation.
enum Rig {
    Dimmer(DimmerRig),
    Alarm(AlarmRig),
}

impl Rig {
    fn build(config: &LabConfig, trim: &mut SimulatedTrim) -> Result<Self, InitError> {
        let sensor = SimulatedSensor::new(config.adc);
        let pwm = RecordingPwm::new(config.duty_resolution()?);
        let rig = match config.variant {
            LabVariant::Dimmer => {
                let policy = LinearDimmer::new(pwm, config.adc);
                Rig::Dimmer(ControlLoop::characterize(config, sensor, trim, policy))
            }
            LabVariant::Alarm => {
                let policy =
                    ThresholdAlarm::new(pwm, ThresholdPolicy::new(config.threshold), config.adc);
                Rig::Alarm(ControlLoop::characterize(config, sensor, trim, policy))
            }
        };
        Ok(rig)
    }

    fn sensor(&self) -> &SimulatedSensor {
        match self {
            Rig::Dimmer(control) => control.source(),
            Rig::Alarm(control) => control.source(),
        }
    }

    fn sensor_mut(&mut self) -> &mut SimulatedSensor {
        match self {
            Rig::Dimmer(control) => control.source_mut(),
            Rig::Alarm(control) => control.source_mut(),
        }
    }

    fn calibration(&self) -> &CalibrationTable {
        match self {
            Rig::Dimmer(control) => control.calibration(),
            Rig::Alarm(control) => control.calibration(),
        }
    }

    fn pwm(&self) -> &RecordingPwm {
        match self {
            Rig::Dimmer(control) => control.policy().channel(),
            Rig::Alarm(control) => control.policy().channel(),
        }
    }

    fn iterations(&self) -> u32 {
        match self {
            Rig::Dimmer(control) => control.iterations(),
            Rig::Alarm(control) => control.iterations(),
        }
    }

    fn step(&mut self, tag: &str, telemetry: &mut TelemetryRecorder, lines: &mut Vec<String>) {
        match self {
            Rig::Dimmer(control) => step_into(control, tag, telemetry, lines),
            Rig::Alarm(control) => step_into(control, tag, telemetry, lines),
        }
    }
}

fn step_into<C: ControlPolicy>(
    control: &mut ControlLoop<SimulatedSensor, C>,
    tag: &str,
    telemetry: &mut TelemetryRecorder,
    lines: &mut Vec<String>,
) {
    let iteration = control.step();
    lines.push(log_line(iteration.level(), tag, &iteration));
    if telemetry.record_iteration(&iteration).is_some()
        && let Some(record) = telemetry.latest()
    {
        lines.push(log_line(LogLevel::Info, tag, record));
    }
}

/// Renders a line the way the firmware's host log mirror does.
fn log_line(level: LogLevel, tag: &str, message: &impl fmt::Display) -> String {
    let level = match level {
        LogLevel::Info => "I",
        LogLevel::Warn => "W",
    };
    format!("{level} ({tag}): {message}")
}

pub struct Session {
    config: LabConfig,
    trim: TrimProfile,
    rig: Rig,
    telemetry: TelemetryRecorder,
    transcript: TranscriptLogger,
    started_at: HostInstant,
    startup: Vec<String>,
    closed: bool,
}

impl Session {
    /// Characterizes the simulated converter and renders the startup log.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let config = options.variant.config();
        let mut transcript =
            TranscriptLogger::open(options.transcript.as_deref(), &config, options.trim)?;

        let mut trim = SimulatedTrim(options.trim);
        let availability = trim.availability();
        let rig =
            Rig::build(&config, &mut trim).map_err(|err| io::Error::other(err.to_string()))?;

        let mut telemetry = TelemetryRecorder::new();
        let source = rig.calibration().source();
        telemetry.record_characterization(source);

        let startup = startup_lines(&config, availability, &rig);
        for line in &startup {
            transcript.append_line(Duration::ZERO, TranscriptRole::Emulator, line)?;
        }

        Ok(Self {
            config,
            trim: options.trim,
            rig,
            telemetry,
            transcript,
            started_at: HostInstant::now(),
            startup,
            closed: false,
        })
    }

    /// Log lines the image emits before its first iteration.
    pub fn startup_lines(&self) -> &[String] {
        &self.startup
    }

    /// Set once `exit` has been handled.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(message) => vec![message],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Light(raw) => self.set_light(raw),
            Command::Tick(count) => self.tick(count),
            Command::Sweep { from, to, step } => self.sweep(from, to, step),
            Command::Status => self.status(),
            Command::Help(topic) => help_lines(topic),
            Command::Exit => {
                self.closed = true;
                vec!["Session closed.".to_string()]
            }
        }
    }

    fn set_light(&mut self, raw: u16) -> Vec<String> {
        let sensor = self.rig.sensor_mut();
        sensor.level = raw;
        if raw > sensor.max_code {
            vec![format!(
                "light level set to {raw} (reads as {})",
                sensor.max_code
            )]
        } else {
            vec![format!("light level set to {raw}")]
        }
    }

    fn tick(&mut self, count: u32) -> Vec<String> {
        if count == 0 || count > MAX_TICKS {
            return vec![format!("ERR range tick count must be 1..={MAX_TICKS}")];
        }

        let tag = self.config.variant.tag();
        let mut lines = Vec::new();
        for _ in 0..count {
            self.rig.step(tag, &mut self.telemetry, &mut lines);
        }
        lines
    }

    /// Runs one iteration per level from `from` to `to`, always ending on `to`.
    fn sweep(&mut self, from: u16, to: u16, step: u16) -> Vec<String> {
        if step == 0 {
            return vec!["ERR range sweep step must be non-zero".to_string()];
        }

        let span = u32::from(from.abs_diff(to));
        let iterations = span.div_ceil(u32::from(step)) + 1;
        if iterations > MAX_TICKS {
            return vec![format!(
                "ERR range sweep runs {iterations} iterations, limit is {MAX_TICKS}"
            )];
        }

        let tag = self.config.variant.tag();
        let mut lines = Vec::new();
        let mut level = from;
        loop {
            self.rig.sensor_mut().level = level;
            self.rig.step(tag, &mut self.telemetry, &mut lines);
            if level == to {
                break;
            }
            level = if from <= to {
                level.saturating_add(step).min(to)
            } else {
                level.saturating_sub(step).max(to)
            };
        }
        lines
    }

    fn status(&self) -> Vec<String> {
        let table = self.rig.calibration();
        let pwm = self.rig.pwm();
        let sensor = self.rig.sensor();
        let iterations = self.rig.iterations();
        let uptime_ms = u128::from(iterations) * self.config.period.as_millis();

        let mut lines = vec![
            format!(
                "variant={} trim={} iterations={iterations} uptime={uptime_ms} ms (simulated)",
                variant_tag(self.config.variant),
                self.trim.tag(),
            ),
            format!(
                "light={} ({} mV) samples-read={}",
                sensor.level,
                table.raw_to_millivolts(sensor.level),
                sensor.reads
            ),
            format!(
                "calibration: {} full-scale={} mV",
                table.source(),
                table.raw_to_millivolts(table.profile().max_code())
            ),
            format!(
                "pwm: {} Hz duty={}/{} writes={}",
                self.config.pwm_frequency_hz,
                pwm.output,
                pwm.resolution.max_duty(),
                pwm.writes
            ),
        ];

        if let Rig::Alarm(control) = &self.rig {
            lines.push(format!(
                "alarm: {} threshold=ADC < {} transitions={}",
                control.policy().state(),
                control.policy().threshold(),
                self.telemetry.transitions()
            ));
        }

        lines.push(format!(
            "telemetry: {}/{TELEMETRY_RING_CAPACITY} records",
            self.telemetry.len()
        ));
        lines.extend(
            self.telemetry
                .oldest_first()
                .map(|record| format!("  {record}")),
        );
        lines
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn startup_lines(config: &LabConfig, availability: TrimAvailability, rig: &Rig) -> Vec<String> {
    let tag = config.variant.tag();
    let output = match config.variant {
        LabVariant::Dimmer => "LED",
        LabVariant::Alarm => "Buzzer",
    };

    let mut lines = vec![
        log_line(LogLevel::Info, tag, &availability.two_point_label()),
        log_line(LogLevel::Info, tag, &availability.reference_label()),
        log_line(LogLevel::Info, tag, &rig.calibration().source()),
        log_line(LogLevel::Info, tag, &config.variant.banner()),
        log_line(
            LogLevel::Info,
            tag,
            &format_args!(
                "LDR on simulated ADC ({}), {output} on simulated PWM ({} Hz, {}-bit)",
                config.adc.attenuation,
                config.pwm_frequency_hz,
                config.duty_bits
            ),
        ),
    ];

    if config.variant == LabVariant::Alarm {
        lines.push(log_line(
            LogLevel::Info,
            tag,
            &format_args!("Threshold: ADC < {}", config.threshold),
        ));
        lines.push(log_line(LogLevel::Info, tag, &"Status LED ON (simulated)"));
    }

    lines
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

struct TranscriptLogger {
    writer: Option<BufWriter<File>>,
}

impl TranscriptLogger {
    fn open(path: Option<&Path>, config: &LabConfig, trim: TrimProfile) -> io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self { writer: None });
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Some(BufWriter::new(file)),
        };

        logger.write_header(config, trim)?;
        Ok(logger)
    }

    fn write_header(&mut self, config: &LabConfig, trim: TrimProfile) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writeln!(
            writer,
            "# LDR lab emulator transcript: {} (trim={})",
            variant_tag(config.variant),
            trim.tag()
        )?;
        writeln!(writer, "# Timestamps are milliseconds since session start")?;
        writeln!(writer)?;
        writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writeln!(
            writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
