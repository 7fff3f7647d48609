//! Operator commands typed on stdin

use std::fmt;
use std::str::FromStr;

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Start recording if idle, stop if recording
    ToggleRecording,
    /// Add a line to the header of the next recording
    Comment(String),
    /// Forget the pending header comments
    ClearComments,
    /// Empty the chart histories
    ClearHistory,
    /// Show the command list
    Help,
    /// Leave the program
    Quit,
}

/// Input that is not a known command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}', type 'help'", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for OperatorCommand {
    type Err = UnknownCommand;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "r" | "record" => Ok(Self::ToggleRecording),
            "c" | "comment" if rest.is_empty() => Ok(Self::ClearComments),
            "c" | "comment" => Ok(Self::Comment(rest.to_string())),
            "clear" => Ok(Self::ClearHistory),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            _ => Err(UnknownCommand(line.to_string())),
        }
    }
}

/// Command overview printed by `help`
pub const HELP: &str = "\
commands:
  r, record        start or stop recording
  c <text>         add a header comment line for the next recording
  c                forget pending comment lines
  clear            clear the chart histories
  q, quit, exit    quit";

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!("r".parse::<OperatorCommand>(), Ok(OperatorCommand::ToggleRecording));
        assert_eq!("  RECORD ".parse::<OperatorCommand>(), Ok(OperatorCommand::ToggleRecording));
        assert_eq!("clear".parse::<OperatorCommand>(), Ok(OperatorCommand::ClearHistory));
        assert_eq!("exit".parse::<OperatorCommand>(), Ok(OperatorCommand::Quit));
        assert_eq!("?".parse::<OperatorCommand>(), Ok(OperatorCommand::Help));
    }

    #[test]
    fn test_parse_comment_keeps_text() {
        assert_eq!(
            "c  sample 3, 25 um bubble ".parse::<OperatorCommand>(),
            Ok(OperatorCommand::Comment("sample 3, 25 um bubble".into()))
        );
        assert_eq!("c".parse::<OperatorCommand>(), Ok(OperatorCommand::ClearComments));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            "plot".parse::<OperatorCommand>(),
            Err(UnknownCommand("plot".into()))
        );
        assert!("".parse::<OperatorCommand>().is_err());
    }
}
