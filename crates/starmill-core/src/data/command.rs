//! Machine commands and command batches

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single line of machine instruction text.
///
/// Immutable once constructed; cloning shares the underlying text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Command(Arc<str>);

impl Command {
    /// Create a new command from a line of text
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref().trim()))
    }

    /// The command text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.0.to_string()
    }
}

/// An ordered group of commands, acknowledged once as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    label: String,
    commands: Vec<Command>,
}

impl CommandBatch {
    /// Create an empty batch with a label used in logs
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    /// Create a batch from an ordered list of command lines
    pub fn from_lines<I, S>(label: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            label: label.into(),
            commands: lines.into_iter().map(Command::new).collect(),
        }
    }

    /// Append a command, preserving order
    pub fn push(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    /// Builder-style append
    pub fn with(mut self, command: impl Into<Command>) -> Self {
        self.push(command);
        self
    }

    /// Label used in logs
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Commands in submission order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the batch has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate over command text in order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(Command::as_str)
    }
}

impl<'a> IntoIterator for &'a CommandBatch {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order() {
        let batch = CommandBatch::from_lines("shutdown", ["M5", "$H", "M30"]);
        assert_eq!(batch.lines().collect::<Vec<_>>(), vec!["M5", "$H", "M30"]);
        assert_eq!(batch.label(), "shutdown");
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_command_trims_line_endings() {
        let command = Command::new("G0 Z-5\r\n");
        assert_eq!(command.as_str(), "G0 Z-5");
        assert_eq!(command.to_string().len(), 6);
    }

    #[test]
    fn test_batch_serializes_commands_as_text() {
        let batch = CommandBatch::from_lines("retract", ["G0 Z-5", "G0 X-5"]);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["commands"], serde_json::json!(["G0 Z-5", "G0 X-5"]));

        let back: CommandBatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn test_builder_append() {
        let batch = CommandBatch::new("plunge").with("G1 Z2.721 F355.600");
        assert_eq!(batch.commands()[0].as_str(), "G1 Z2.721 F355.600");
        assert!(!batch.is_empty());
    }
}
