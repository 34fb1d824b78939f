use std::io;

#[allow(dead_code)]
#[path = "../chain.rs"]
mod chain;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, SessionOptions, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Occupancy)?;
    record_profile(TranscriptProfile::Reconfigure)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let options = match profile {
        TranscriptProfile::Reconfigure => SessionOptions {
            length: 8,
            reset_line: false,
            ..SessionOptions::default()
        },
        TranscriptProfile::Occupancy | TranscriptProfile::Interactive => SessionOptions {
            length: 8,
            ..SessionOptions::default()
        },
    };

    let mut session = Session::new(profile, &options)?;
    let _ = session.banner()?;
    match profile {
        TranscriptProfile::Reconfigure => record_reconfigure(&mut session),
        TranscriptProfile::Occupancy | TranscriptProfile::Interactive => {
            record_occupancy(&mut session)
        }
    }
}

fn record_occupancy(session: &mut Session) -> io::Result<()> {
    for line in [
        "help",
        "inputs 1000_0001",
        "run 5ms",
        "inputs 0000_0000",
        "run 5ms",
        "status",
        "run 5ms",
        "status",
    ] {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

fn record_reconfigure(session: &mut Session) -> io::Result<()> {
    for line in [
        "inputs 0110_0110",
        "step 20",
        "length 4",
        "status",
        "run 3ms",
        "length 0",
        "help length",
        "status",
    ] {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
