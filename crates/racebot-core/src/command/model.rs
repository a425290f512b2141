use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Environment passed to a step. Ordered so generated output is stable.
pub type Env = BTreeMap<String, String>;

/// Command executed by a step: either an argument vector handed to the
/// process spawner as-is, or a single line interpreted by the agent's shell.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepCommand {
    Argv(Vec<String>),
    Shell(String),
}

impl StepCommand {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StepCommand::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn shell(line: impl Into<String>) -> Self {
        StepCommand::Shell(line.into())
    }

    /// Flattens the command into one space-joined line.
    pub fn to_shell_line(&self) -> String {
        match self {
            StepCommand::Argv(args) => args.join(" "),
            StepCommand::Shell(line) => line.clone(),
        }
    }

    /// Arguments of an argv command; a shell line has none.
    pub fn args(&self) -> &[String] {
        match self {
            StepCommand::Argv(args) => args,
            StepCommand::Shell(_) => &[],
        }
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_line())
    }
}
