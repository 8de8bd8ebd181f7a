//! Command channel grammar.
//!
//! Commands are sent to the Player/Supervisor to control playback.
//! Unknown strings are dropped with a warning rather than propagated as
//! errors — the command channel is best-effort.

use std::fmt;
use std::str::FromStr;

/// A playback control command. All variants are idempotent: sending
/// `Pause` while already paused is a no-op, as is `Resume` while
/// playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Stop,
    /// Skip the remaining prefill wait and start playback immediately,
    /// even with a partial buffer.
    ForceStart,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Pause => "PAUSE",
            Command::Resume => "RESUME",
            Command::Stop => "STOP",
            Command::ForceStart => "FORCE_START",
        };
        write!(f, "{s}")
    }
}

/// Error returned for a command string that isn't part of the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAUSE" => Ok(Command::Pause),
            "RESUME" => Ok(Command::Resume),
            "STOP" => Ok(Command::Stop),
            "FORCE_START" | "FORCESTART" => Ok(Command::ForceStart),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands_case_insensitively() {
        assert_eq!("pause".parse::<Command>().unwrap(), Command::Pause);
        assert_eq!("Resume".parse::<Command>().unwrap(), Command::Resume);
        assert_eq!("STOP".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!(
            "force_start".parse::<Command>().unwrap(),
            Command::ForceStart
        );
    }

    #[test]
    fn rejects_unknown_command() {
        assert!("SHUFFLE".parse::<Command>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for cmd in [Command::Pause, Command::Resume, Command::Stop, Command::ForceStart] {
            assert_eq!(cmd.to_string().parse::<Command>().unwrap(), cmd);
        }
    }
}
