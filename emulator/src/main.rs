mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{Session, SessionOptions, TrimProfile, variant_from_tag};

const USAGE: &str =
    "Usage: ldr-emulator [--variant <dimmer|alarm>] [--trim <two-point|vref|none>] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options)?;
    let mut line = String::new();

    for startup in session.startup_lines() {
        writeln!(writer, "{startup}")?;
    }
    writeln!(
        writer,
        "LDR lab emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let responses = session.handle_command(&line)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }

        if session.is_closed() {
            break;
        }
    }

    Ok(())
}

fn parse_args<I>(mut args: I) -> Result<SessionOptions, String>
where
    I: Iterator<Item = String>,
{
    let mut options = SessionOptions::default();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--variant" => {
                options.variant = variant_from_tag(&flag_value(&flag, inline, &mut args)?)?;
            }
            "--trim" => {
                options.trim = TrimProfile::from_tag(&flag_value(&flag, inline, &mut args)?)?;
            }
            "--transcript" => {
                options.transcript = Some(PathBuf::from(flag_value(&flag, inline, &mut args)?));
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}

fn flag_value<I>(flag: &str, inline: Option<String>, args: &mut I) -> Result<String, String>
where
    I: Iterator<Item = String>,
{
    inline
        .or_else(|| args.next())
        .ok_or_else(|| format!("Expected value after {flag}"))
}
