//! Operator console
//!
//! Reads one command per line from stdin. An empty line asks for live
//! statistics; single letters select the other reports.
//!
//! Input is read on a plain OS thread, not the runtime's blocking pool, so
//! the runtime can shut down while a read is still pending.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;
use tracing::debug;

/// Commands available during a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Empty line
    LiveStats,
    /// `s`
    SessionInfo,
    /// `c`
    CycleReport,
    /// `e`
    ErrorReport,
    /// `p`
    PerformanceReport,
    /// `a`
    ToggleAutoStop,
    /// `q`
    Quit,
    /// Anything else, kept for the error message
    Unknown(String),
}

impl OperatorCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => OperatorCommand::LiveStats,
            "s" => OperatorCommand::SessionInfo,
            "c" => OperatorCommand::CycleReport,
            "e" => OperatorCommand::ErrorReport,
            "p" => OperatorCommand::PerformanceReport,
            "a" => OperatorCommand::ToggleAutoStop,
            "q" => OperatorCommand::Quit,
            other => OperatorCommand::Unknown(other.to_string()),
        }
    }
}

/// Help line listing the accepted commands
pub const COMMAND_HELP: &str = "Available commands: ENTER, s, c, e, p, a, q";

/// Spawn a thread reading commands from stdin
///
/// The channel closes when stdin reaches end of file.
pub fn spawn_stdin_reader() -> mpsc::Receiver<OperatorCommand> {
    spawn_line_reader(io::BufReader::new(io::stdin()))
}

/// Spawn a thread parsing one command per line of `input`
///
/// The thread ends at end of input, on a read error, or once the receiver
/// is dropped and the next line arrives.
pub fn spawn_line_reader<R>(input: R) -> mpsc::Receiver<OperatorCommand>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);

    thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(OperatorCommand::parse(&line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("Operator input closed");
    });

    rx
}
