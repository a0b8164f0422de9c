use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use ldr_core::config::LabVariant;
use session::{Session, SessionOptions, TrimProfile};

const TRANSCRIPT_DIR: &str = "transcripts";

struct Scenario {
    name: &'static str,
    variant: LabVariant,
    trim: TrimProfile,
    commands: &'static [&'static str],
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "dimmer-dark",
        variant: LabVariant::Dimmer,
        trim: TrimProfile::TwoPoint,
        commands: &["light 0", "tick", "status"],
    },
    Scenario {
        name: "dimmer-bright",
        variant: LabVariant::Dimmer,
        trim: TrimProfile::TwoPoint,
        commands: &["light 4095", "tick", "status"],
    },
    Scenario {
        name: "dimmer-midscale",
        variant: LabVariant::Dimmer,
        trim: TrimProfile::Vref,
        commands: &["light 2048", "tick", "status"],
    },
    Scenario {
        name: "dimmer-sweep-untrimmed",
        variant: LabVariant::Dimmer,
        trim: TrimProfile::Absent,
        commands: &["sweep 0 4095 512", "status"],
    },
    Scenario {
        name: "alarm-low-light",
        variant: LabVariant::Alarm,
        trim: TrimProfile::TwoPoint,
        commands: &["light 999", "tick 2", "status"],
    },
    Scenario {
        name: "alarm-chatter",
        variant: LabVariant::Alarm,
        trim: TrimProfile::TwoPoint,
        commands: &["sweep 998 1001 1", "sweep 1001 998 1", "status"],
    },
];

fn main() -> io::Result<()> {
    for scenario in SCENARIOS {
        record_scenario(scenario)?;
    }
    Ok(())
}

fn record_scenario(scenario: &Scenario) -> io::Result<()> {
    let path = Path::new(TRANSCRIPT_DIR).join(format!("{}.log", scenario.name));
    let mut session = Session::new(SessionOptions {
        variant: scenario.variant,
        trim: scenario.trim,
        transcript: Some(path.clone()),
    })?;

    for command in scenario.commands {
        let _ = session.handle_command(command)?;
    }

    println!("wrote {}", path.display());
    Ok(())
}
