use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use shiftin_core::config::{
    ConfigError, DEFAULT_CLOCK_PERIOD, DEFAULT_RESET_PERIOD, RegisterConfig, RegisterLength,
};
use shiftin_core::console::HELP_TOPICS;
use shiftin_core::console::commands::{
    AdvanceReport, CommandError, CommandExecutor, CommandOutcome, ConsoleTarget, HelpReply,
};
use shiftin_core::console::grammar::InputPattern;
use shiftin_core::console::status::{StatusFormatter, StatusSnapshot};
use shiftin_core::driver::{PollOutcome, ShiftIn};
use shiftin_core::lines::{Level, LineId, LineRoles, Micros, elapsed_since};
use shiftin_core::telemetry::CycleTelemetry;

use crate::chain::{BusEvent, EventLog, MAX_CONTACTS, SimulatedChain, VirtualClock};

const DATA_LINE: LineId = LineId(0);
const CLOCK_LINE: LineId = LineId(1);
const LOAD_LINE: LineId = LineId(2);
const RESET_LINE: LineId = LineId(3);

/// Longest virtual time a single `run` may cover.
pub const MAX_RUN: Duration = Duration::from_secs(10);
/// Cycle lines kept per command; later cycles are only counted.
pub const NARRATION_LIMIT: usize = 64;

/// Knobs exposed on the emulator command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionOptions {
    pub length: RegisterLength,
    pub clock_period: Duration,
    pub reset_period: Duration,
    pub reset_line: bool,
    /// Initial counter value, e.g. close to `u32::MAX` to exercise wraparound.
    pub start_us: Micros,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            length: 16,
            clock_period: DEFAULT_CLOCK_PERIOD,
            reset_period: DEFAULT_RESET_PERIOD,
            reset_line: true,
            start_us: 0,
        }
    }
}

impl SessionOptions {
    fn register_config(&self) -> RegisterConfig {
        let reset = self.reset_line.then_some(RESET_LINE);
        RegisterConfig::new(
            LineRoles::new(DATA_LINE, CLOCK_LINE, LOAD_LINE, reset),
            self.clock_period,
            self.reset_period,
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Occupancy,
    Reconfigure,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-session.log",
            TranscriptProfile::Occupancy => "transcripts/emulator-occupancy.log",
            TranscriptProfile::Reconfigure => "transcripts/emulator-reconfigure.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Shift-in emulator session transcript",
            TranscriptProfile::Occupancy => "Shift-in emulator occupancy transcript",
            TranscriptProfile::Reconfigure => "Shift-in emulator length change transcript",
        }
    }
}

/// One line of emulator output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutputLine {
    Text(String),
    /// Bits delivered during one finished cycle, in index order.
    Cycle {
        sequence: u32,
        bits: Vec<Level>,
        took_us: Micros,
    },
}

impl OutputLine {
    fn text(line: impl Into<String>) -> Self {
        Self::Text(line.into())
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLine::Text(text) => f.write_str(text),
            OutputLine::Cycle {
                sequence,
                bits,
                took_us,
            } => {
                write!(f, "cycle #{sequence} bits=")?;
                for bit in bits {
                    write!(f, "{}", bit.as_char())?;
                }
                write!(f, " took={took_us}us")
            }
        }
    }
}

type BusDriver = ShiftIn<SimulatedChain, VirtualClock, EventLog>;

/// Driver wired to the simulated chain, plus what it reported so far.
pub struct Bench {
    driver: BusDriver,
    telemetry: CycleTelemetry,
    cycle_bits: Vec<Level>,
    narration: Vec<OutputLine>,
    cycles_narrated: usize,
    cycles_omitted: u32,
}

impl Bench {
    fn new(options: &SessionOptions) -> io::Result<Self> {
        let config = options.register_config();
        let chain = SimulatedChain::new(config.lines, usize::from(options.length));
        let clock = VirtualClock::starting_at(options.start_us);
        let driver = ShiftIn::new(chain, clock, config, options.length, EventLog::default())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        if let Some(line) = driver.port().misconfigured().first() {
            return Err(io::Error::other(format!(
                "driver configured {line} with the wrong direction"
            )));
        }

        Ok(Self {
            driver,
            telemetry: CycleTelemetry::new(),
            cycle_bits: Vec::new(),
            narration: Vec::new(),
            cycles_narrated: 0,
            cycles_omitted: 0,
        })
    }

    /// Counter time left before the current gate lets the next poll through.
    fn until_gate(&self) -> Micros {
        let status = self.driver.status();
        let elapsed = elapsed_since(status.last_transition, self.driver.clock().now());
        status
            .pending_sleep
            .saturating_add(1)
            .saturating_sub(elapsed)
    }

    fn poll(&mut self, report: &mut AdvanceReport) {
        let outcome = self.driver.poll();
        let PollOutcome::Advanced(step) = outcome else {
            return;
        };

        report.transitions += 1;
        if step.sample.is_some() {
            report.bits += 1;
        }
        if step.cycle_complete {
            report.cycles += 1;
        }

        let closed = self.telemetry.observe(&outcome);
        let events: Vec<BusEvent> = self.driver.handler_mut().drain().collect();
        for event in events {
            match event {
                BusEvent::Bit(sample) => self.cycle_bits.push(sample.level),
                BusEvent::CycleComplete => {
                    let bits = std::mem::take(&mut self.cycle_bits);
                    let Some(summary) = closed else {
                        continue;
                    };
                    if self.cycles_narrated < NARRATION_LIMIT {
                        self.cycles_narrated += 1;
                        self.narration.push(OutputLine::Cycle {
                            sequence: summary.sequence,
                            bits,
                            took_us: summary.duration_us,
                        });
                    } else {
                        self.cycles_omitted += 1;
                    }
                }
            }
        }
    }

    fn advance_clock(&mut self, delta: Micros, report: &mut AdvanceReport) {
        self.driver.clock_mut().advance(delta);
        report.elapsed_us += u64::from(delta);
    }

    fn take_narration(&mut self) -> Vec<OutputLine> {
        let mut lines = std::mem::take(&mut self.narration);
        let omitted = std::mem::take(&mut self.cycles_omitted);
        if omitted > 0 {
            lines.push(OutputLine::text(format!("... {omitted} more cycles not shown")));
        }
        self.cycles_narrated = 0;
        lines
    }

    fn now(&self) -> Micros {
        self.driver.clock().now()
    }
}

impl ConsoleTarget for Bench {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.driver, &self.telemetry)
    }

    fn set_length(&mut self, length: RegisterLength) -> Result<(), ConfigError> {
        self.driver.set_length(length)?;
        self.telemetry.discard_open_cycle();
        self.cycle_bits.clear();
        self.driver.handler_mut().drain().for_each(drop);
        Ok(())
    }

    fn step(&mut self, count: u32) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        while report.transitions < count {
            let wait = self.until_gate();
            self.advance_clock(wait, &mut report);
            self.poll(&mut report);
        }
        report
    }

    fn run_for(&mut self, duration: Duration) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        if duration > MAX_RUN {
            self.narration.push(OutputLine::text(format!(
                "run limited to {}s",
                MAX_RUN.as_secs()
            )));
        }
        let budget = duration.min(MAX_RUN);
        let mut remaining = u64::try_from(budget.as_micros()).unwrap_or(u64::MAX);

        loop {
            let wait = self.until_gate();
            if u64::from(wait) > remaining {
                // `remaining < wait` here.
                let rest = Micros::try_from(remaining).unwrap_or(wait);
                self.advance_clock(rest, &mut report);
                break;
            }
            self.advance_clock(wait, &mut report);
            remaining -= u64::from(wait);
            self.poll(&mut report);
        }
        report
    }

    fn set_inputs(&mut self, pattern: InputPattern<'_>) -> Result<usize, CommandError<'static>> {
        let provided = pattern.len();
        if provided > MAX_CONTACTS {
            return Err(CommandError::PatternTooLong {
                provided,
                max: MAX_CONTACTS,
            });
        }
        self.driver.port_mut().set_contacts(pattern.levels());
        Ok(provided)
    }
}

pub struct Session {
    executor: CommandExecutor<Bench>,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: TranscriptProfile, options: &SessionOptions) -> io::Result<Self> {
        let bench = Bench::new(options)?;
        let transcript = TranscriptLogger::new(profile)?;

        Ok(Self {
            executor: CommandExecutor::new(bench),
            transcript,
            started_at: HostInstant::now(),
        })
    }

    /// Lines describing the configured chain, printed once at start-up.
    pub fn banner(&mut self) -> io::Result<Vec<OutputLine>> {
        let snapshot = self.executor.target().snapshot();
        let formatter = StatusFormatter::new(&snapshot);
        let lines: Vec<OutputLine> = formatter.lines().into_iter().map(OutputLine::Text).collect();
        self.record_output(self.started_at.elapsed(), &lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<OutputLine>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match self.executor.execute(trimmed) {
            Ok(outcome) => self.describe_outcome(outcome),
            Err(CommandError::UnknownTopic(topic)) => vec![
                OutputLine::text(format!("No help available for `{topic}`.")),
                OutputLine::text(format!("Available topics: {}", help_topic_list())),
            ],
            Err(err) => vec![OutputLine::text(format!("ERR {err}"))],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn describe_outcome(&mut self, outcome: CommandOutcome) -> Vec<OutputLine> {
        match outcome {
            CommandOutcome::Status(snapshot) => StatusFormatter::new(&snapshot)
                .lines()
                .into_iter()
                .map(OutputLine::Text)
                .collect(),
            CommandOutcome::LengthChanged(length) => vec![OutputLine::text(format!(
                "OK length={length} cycle restarted"
            ))],
            CommandOutcome::Advanced(report) => {
                let bench = self.executor.target_mut();
                let mut lines = bench.take_narration();
                let state = bench.snapshot().driver.state;
                lines.push(OutputLine::text(format!(
                    "OK advanced transitions={} bits={} cycles={} elapsed={}us now={}us state={state}",
                    report.transitions,
                    report.bits,
                    report.cycles,
                    report.elapsed_us,
                    bench.now(),
                )));
                lines
            }
            CommandOutcome::InputsApplied(contacts) => {
                let chain = self.executor.target().driver.port();
                let occupied = chain
                    .pending_load()
                    .iter()
                    .filter(|level| level.is_high())
                    .count();
                vec![OutputLine::text(format!(
                    "OK inputs contacts={contacts} latched-occupied={occupied} chain={}",
                    chain.contacts()
                ))]
            }
            CommandOutcome::Help(HelpReply::Topic(detail)) => vec![OutputLine::text(detail)],
            CommandOutcome::Help(HelpReply::All) => {
                let mut lines = vec![OutputLine::text("Available commands:")];
                for (_, detail) in HELP_TOPICS {
                    lines.push(OutputLine::text(format!("  {detail}")));
                }
                lines.push(OutputLine::text(
                    "Type `help <topic>` for a specific command.",
                ));
                lines
            }
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[OutputLine]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, &line.to_string())?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are host milliseconds since session start; bus time is virtual"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(length: RegisterLength) -> CommandExecutor<Bench> {
        let options = SessionOptions {
            length,
            ..SessionOptions::default()
        };
        CommandExecutor::new(Bench::new(&options).expect("valid options"))
    }

    fn cycle_lines(lines: &[OutputLine]) -> Vec<String> {
        lines
            .iter()
            .filter(|line| matches!(line, OutputLine::Cycle { .. }))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn steps_through_two_cycles_of_a_loaded_chain() {
        let mut executor = executor(3);
        executor.execute("inputs 101").unwrap();
        // Res1 opens the first cycle; 13 more transitions close each one.
        executor.execute("step 27").unwrap();

        let cycles = cycle_lines(&executor.target_mut().take_narration());
        assert_eq!(cycles.len(), 2);
        assert!(cycles[0].starts_with("cycle #0 bits=101 took="));
        assert!(cycles[1].starts_with("cycle #1 bits=101 took="));
    }

    #[test]
    fn run_for_respects_the_duration_budget() {
        let mut executor = executor(8);
        let bench = executor.target_mut();
        let start = bench.now();
        let report = bench.run_for(Duration::from_micros(1_000));
        assert_eq!(report.elapsed_us, 1_000);
        assert_eq!(bench.now(), start.wrapping_add(1_000));
        assert!(report.transitions > 0);
        assert_eq!(report.cycles, 1);
    }

    #[test]
    fn wrapping_start_keeps_cycles_flowing() {
        let options = SessionOptions {
            length: 2,
            start_us: Micros::MAX - 500,
            ..SessionOptions::default()
        };
        let mut executor = CommandExecutor::new(Bench::new(&options).expect("valid options"));
        executor.execute("inputs 11").unwrap();
        let Ok(CommandOutcome::Advanced(report)) = executor.execute("run 5ms") else {
            panic!("expected run to advance");
        };
        assert!(report.cycles >= 2);

        let cycles = cycle_lines(&executor.target_mut().take_narration());
        assert!(!cycles.is_empty());
        assert!(cycles.iter().all(|line| line.contains("bits=11 ")));
    }

    #[test]
    fn occupancy_latches_until_the_next_reset_pulse() {
        let mut executor = executor(2);
        executor.execute("inputs 10").unwrap();
        executor.execute("inputs 00").unwrap();

        // Latched into the first load, then cleared by that cycle's reset pulse.
        executor.execute("step 11").unwrap();
        let cycles = cycle_lines(&executor.target_mut().take_narration());
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].starts_with("cycle #0 bits=10 "));

        executor.execute("step 10").unwrap();
        let cycles = cycle_lines(&executor.target_mut().take_narration());
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].starts_with("cycle #1 bits=00 "));
    }

    #[test]
    fn length_change_discards_the_open_cycle() {
        let mut executor = executor(4);
        executor.execute("step 9").unwrap();
        assert_eq!(
            executor.execute("length 2"),
            Ok(CommandOutcome::LengthChanged(2))
        );

        executor.execute("step").unwrap();
        let status = executor.target().snapshot().driver;
        assert_eq!(status.length, 2);
        assert_eq!(status.next_bit, 0);
        assert!(cycle_lines(&executor.target_mut().take_narration()).is_empty());

        executor.execute("step 10").unwrap();
        let cycles = cycle_lines(&executor.target_mut().take_narration());
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].starts_with("cycle #0 bits=00 "));
    }

    #[test]
    fn long_runs_are_capped_and_summarized() {
        let mut executor = executor(1);
        let Ok(CommandOutcome::Advanced(report)) = executor.execute("run 100000s") else {
            panic!("expected run to advance");
        };
        assert_eq!(
            report.elapsed_us,
            u64::try_from(MAX_RUN.as_micros()).unwrap()
        );

        let lines = executor.target_mut().take_narration();
        assert_eq!(lines[0], OutputLine::text("run limited to 10s"));
        assert_eq!(cycle_lines(&lines).len(), NARRATION_LIMIT);
        let tail = lines.last().unwrap().to_string();
        assert!(tail.starts_with("... ") && tail.ends_with(" more cycles not shown"));

        // The next command narrates afresh.
        executor.execute("step 10").unwrap();
        let lines = executor.target_mut().take_narration();
        assert_eq!(cycle_lines(&lines).len(), 1);
        assert!(!lines.iter().any(|line| line.to_string().starts_with("...")));
    }

    #[test]
    fn period_at_counter_limit_is_rejected() {
        let options = SessionOptions {
            reset_period: Duration::from_micros(u64::from(Micros::MAX)),
            ..SessionOptions::default()
        };
        let Err(err) = Bench::new(&options) else {
            panic!("period equal to the counter range must be rejected");
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn too_many_contacts_are_rejected() {
        let mut executor = executor(4);
        let pattern = "1".repeat(MAX_CONTACTS + 1);
        let line = format!("inputs {pattern}");
        assert_eq!(
            executor.execute(&line),
            Err(CommandError::PatternTooLong {
                provided: MAX_CONTACTS + 1,
                max: MAX_CONTACTS,
            })
        );
    }
}
