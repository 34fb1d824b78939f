mod chain;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::time::Duration;

use crossterm::style::Stylize;
use shiftin_core::lines::Level;

use session::{OutputLine, Session, SessionOptions, TranscriptProfile};

const USAGE: &str =
    "Usage: shiftin-emulator [--length <bits>] [--clock-us <us>] [--reset-us <us>] [--no-reset] [--start-us <us>]";

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(TranscriptProfile::Interactive, &options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Shift-in bus emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for output in session.banner()? {
        print_line(&mut writer, &output)?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for output in session.handle_command(trimmed)? {
            print_line(&mut writer, &output)?;
        }
    }

    Ok(())
}

/// Prints a line, highlighting occupied contacts in cycle reports.
fn print_line<W: Write>(writer: &mut W, line: &OutputLine) -> io::Result<()> {
    let OutputLine::Cycle {
        sequence,
        bits,
        took_us,
    } = line
    else {
        return writeln!(writer, "{line}");
    };

    write!(writer, "cycle #{sequence} bits=")?;
    for bit in bits {
        match bit {
            Level::High => write!(writer, "{}", "1".yellow().bold())?,
            Level::Low => write!(writer, "{}", "0".dark_grey())?,
        }
    }
    writeln!(writer, " took={took_us}us")
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<SessionOptions, String> {
    let mut options = SessionOptions::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        if flag == "--no-reset" {
            options.reset_line = false;
            continue;
        }

        let value = match inline.or_else(|| args.next()) {
            Some(value) => value,
            None => return Err(format!("Expected value after {flag}")),
        };

        match flag.as_str() {
            "--length" => options.length = parse_number(&flag, &value)?,
            "--clock-us" => {
                options.clock_period = Duration::from_micros(parse_number(&flag, &value)?);
            }
            "--reset-us" => {
                options.reset_period = Duration::from_micros(parse_number(&flag, &value)?);
            }
            "--start-us" => options.start_us = parse_number(&flag, &value)?,
            _ => return Err(format!("Unknown option `{flag}`")),
        }
    }

    Ok(options)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for {flag}"))
}
