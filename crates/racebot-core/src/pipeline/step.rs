use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::classify::benchmark::BenchmarkSpec;
use crate::command::model::{Env, StepCommand};
use crate::pipeline::context::RunContext;

/// Step class as understood by the executing framework.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Compile,
    Test,
    Shell,
}

/// Upload target, optionally qualified by the run's revision.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Fixed(String),
    /// Template whose `%s` slot receives the published revision.
    WithRevision(String),
}

impl Destination {
    pub fn resolve(&self, ctx: &RunContext) -> String {
        match self {
            Destination::Fixed(path) => path.clone(),
            Destination::WithRevision(template) => {
                template.replacen("%s", ctx.revision_or_unknown(), 1)
            }
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Fixed(path) | Destination::WithRevision(path) => f.write_str(path),
        }
    }
}

/// What the executor does for a step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Checkout {
        svnurl: String,
        mode: String,
    },
    Command {
        kind: CommandKind,
        command: StepCommand,
        env: Env,
    },
    Upload {
        source: String,
        destination: Destination,
        mode: u32,
    },
    Download {
        source: String,
        destination: String,
        mode: u32,
    },
}

/// Post-execution capability attached to a step.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Completion {
    /// Publish the step's trimmed output as the run's revision.
    CaptureRevision,
    /// Classify the step's output with a benchmark log processor.
    ProcessLog(BenchmarkSpec),
}

/// One immutable unit of work in a pipeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Step {
    pub action: StepAction,
    pub description: String,
    pub description_done: String,
    /// A failed fatal step aborts the rest of the pipeline.
    pub fatal: bool,
    pub timeout_secs: Option<u64>,
    pub completion: Option<Completion>,
}

impl Step {
    fn new(action: StepAction, description: &str, description_done: &str) -> Self {
        Self {
            action,
            description: description.to_string(),
            description_done: description_done.to_string(),
            fatal: true,
            timeout_secs: None,
            completion: None,
        }
    }

    pub fn command(
        kind: CommandKind,
        command: StepCommand,
        env: Env,
        description: &str,
        description_done: &str,
    ) -> Self {
        Self::new(
            StepAction::Command { kind, command, env },
            description,
            description_done,
        )
    }

    pub fn compile(command: StepCommand, description: &str, description_done: &str) -> Self {
        Self::command(
            CommandKind::Compile,
            command,
            Env::new(),
            description,
            description_done,
        )
    }

    pub fn shell(command: StepCommand, description: &str, description_done: &str) -> Self {
        Self::command(
            CommandKind::Shell,
            command,
            Env::new(),
            description,
            description_done,
        )
    }

    pub fn test(command: StepCommand, description: &str, description_done: &str) -> Self {
        Self::command(
            CommandKind::Test,
            command,
            Env::new(),
            description,
            description_done,
        )
    }

    pub fn checkout(svnurl: &str) -> Self {
        Self::new(
            StepAction::Checkout {
                svnurl: svnurl.to_string(),
                mode: "copy".to_string(),
            },
            "checking out sources",
            "checkout sources",
        )
    }

    pub fn upload(source: &str, destination: Destination, mode: u32) -> Self {
        let text = format!("upload {source}");
        Self::new(
            StepAction::Upload {
                source: source.to_string(),
                destination,
                mode,
            },
            &format!("uploading {source}"),
            &text,
        )
    }

    pub fn download(source: &str, destination: &str, mode: u32) -> Self {
        Self::new(
            StepAction::Download {
                source: source.to_string(),
                destination: destination.to_string(),
                mode,
            },
            &format!("downloading {destination}"),
            &format!("download {destination}"),
        )
    }

    /// Failure of this step no longer aborts the pipeline.
    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn command_line(&self) -> Option<&StepCommand> {
        match &self.action {
            StepAction::Command { command, .. } => Some(command),
            _ => None,
        }
    }

    pub fn env(&self) -> Option<&Env> {
        match &self.action {
            StepAction::Command { env, .. } => Some(env),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<CommandKind> {
        match &self.action {
            StepAction::Command { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
