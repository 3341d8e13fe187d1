//! Keyboard input handling.

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    /// Press the action button.
    Press,
    /// Drop the link to the sensor.
    Disconnect,
    /// Shut down.
    Quit,
}

impl InputCommand {
    /// Parse one line of input. Returns `None` for anything unrecognized.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => Some(InputCommand::Press),
            "d" | "disconnect" => Some(InputCommand::Disconnect),
            "q" | "quit" | "exit" => Some(InputCommand::Quit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(InputCommand::parse(""), Some(InputCommand::Press));
        assert_eq!(InputCommand::parse("  \r"), Some(InputCommand::Press));
        assert_eq!(InputCommand::parse("d"), Some(InputCommand::Disconnect));
        assert_eq!(InputCommand::parse("D"), Some(InputCommand::Disconnect));
        assert_eq!(InputCommand::parse("q"), Some(InputCommand::Quit));
        assert_eq!(InputCommand::parse("quit"), Some(InputCommand::Quit));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(InputCommand::parse("x"), None);
        assert_eq!(InputCommand::parse("pair"), None);
    }
}
