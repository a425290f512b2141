//! Synthesis of race checker invocations against a unit test binary.
//!
//! Every front-end owns its wrapper script, its own flags and its own
//! environment; the branches below never share flags. The shared tail is
//! the mode flag plus the suppression and ignore files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::model::{Env, StepCommand};
use crate::error::ConfigError;
use crate::variant::Os;

pub const SUPPRESSIONS_FILE: &str = "unittest/racecheck_unittest.supp";
pub const IGNORE_FILE: &str = "unittest/racecheck_unittest.ignore";

/// Default advisory wall-clock limit for test steps.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(1800);

const VALGRIND_RELEASE: &str = "./tsan.sh";
const VALGRIND_DEBUG: &str = "./tsan-debug.sh";
const PIN_WRAPPER: &str = "tsan/tsan_pin.sh";
const PIN_WIN_RELEASE: &str = r"out\tsan-x86-windows\tsan.bat";
const PIN_WIN_DEBUG: &str = r"out\tsan-x86-windows\tsan-debug.bat";
const PIN_WIN_THREADED: &str = r"out\tsan-x86-windows\tsan_mt.bat";

const MODE_FLAG_PREFIX: &str = "--pure-happens-before";
const PIN_ONLY_FLAGS: [&str; 3] = ["--dbg", "--opt", "--mt"];
const PIN_WIN_SEPARATOR: &str = "--";

/// Instrumentation mechanism running the checker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Frontend {
    /// Dynamic binary translation under valgrind.
    Valgrind,
    /// Pin-based binary instrumentation on linux.
    Pin,
    /// Pin-based binary instrumentation on windows.
    PinWin,
}

impl Frontend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frontend::Valgrind => "valgrind",
            Frontend::Pin => "pin",
            Frontend::PinWin => "pin-win",
        }
    }

    fn wrappers(&self) -> &'static [&'static str] {
        match self {
            Frontend::Valgrind => &[VALGRIND_RELEASE, VALGRIND_DEBUG],
            Frontend::Pin => &[PIN_WRAPPER],
            Frontend::PinWin => &[PIN_WIN_RELEASE, PIN_WIN_DEBUG, PIN_WIN_THREADED],
        }
    }

    pub fn supports(&self, os: Os) -> bool {
        match self {
            Frontend::Valgrind | Frontend::Pin => os == Os::Linux,
            Frontend::PinWin => os == Os::Windows,
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frontend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valgrind" => Ok(Frontend::Valgrind),
            "pin" => Ok(Frontend::Pin),
            "pin-win" => Ok(Frontend::PinWin),
            other => Err(ConfigError::UnknownFrontend(other.to_string())),
        }
    }
}

/// Race detection algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pure happens-before.
    Phb,
    /// Hybrid lockset + happens-before.
    Hybrid,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Phb => "phb",
            Mode::Hybrid => "hybrid",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Mode::Phb => "--pure-happens-before=yes",
            Mode::Hybrid => "--pure-happens-before=no",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phb" => Ok(Mode::Phb),
            "hybrid" => Ok(Mode::Hybrid),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// How to run the checker for one test step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub frontend: Frontend,
    pub mode: Mode,
    pub debug: bool,
    pub threaded: bool,
    /// Checker arguments placed right after the wrapper.
    pub extra_args: Vec<String>,
    /// Arguments forwarded to the test binary.
    pub extra_test_args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Overrides the front-end's default wrapper script.
    pub frontend_binary: Option<String>,
    /// Pin install root exported to the pin front-end.
    pub pin_root: Option<String>,
    /// Tokens placed before the wrapper (e.g. a time limiter).
    pub prefix: Vec<String>,
    /// Shell text appended after the command; turns argv into a shell line.
    pub append_command: Option<String>,
}

impl RunConfig {
    pub fn new(frontend: Frontend, mode: Mode) -> Self {
        Self {
            frontend,
            mode,
            debug: false,
            threaded: false,
            extra_args: Vec::new(),
            extra_test_args: Vec::new(),
            timeout: Some(DEFAULT_TEST_TIMEOUT),
            frontend_binary: None,
            pin_root: None,
            prefix: Vec::new(),
            append_command: None,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra_test_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_test_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_frontend_binary(mut self, binary: impl Into<String>) -> Self {
        self.frontend_binary = Some(binary.into());
        self
    }

    pub fn with_pin_root(mut self, root: impl Into<String>) -> Self {
        self.pin_root = Some(root.into());
        self
    }

    pub fn with_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix = prefix.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_append_command(mut self, append: impl Into<String>) -> Self {
        self.append_command = Some(append.into());
        self
    }

    /// Rejects caller-supplied arguments that would add a second mode flag or
    /// smuggle in another frontend's flags or wrapper.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frontend = self.frontend.to_string();
        for arg in self.extra_args.iter().chain(&self.extra_test_args) {
            if arg.starts_with(MODE_FLAG_PREFIX) {
                return Err(ConfigError::ModeFlagInArgs(arg.clone()));
            }
            let pin_only = PIN_ONLY_FLAGS.contains(&arg.as_str());
            let separator = arg == PIN_WIN_SEPARATOR;
            if (pin_only && self.frontend != Frontend::Pin)
                || (separator && self.frontend != Frontend::PinWin)
            {
                return Err(ConfigError::ForeignFlag {
                    frontend,
                    flag: arg.clone(),
                });
            }
        }

        if let Some(binary) = &self.frontend_binary {
            let foreign = [Frontend::Valgrind, Frontend::Pin, Frontend::PinWin]
                .into_iter()
                .filter(|f| *f != self.frontend)
                .any(|f| f.wrappers().contains(&binary.as_str()));
            if foreign {
                return Err(ConfigError::ForeignWrapper {
                    frontend,
                    wrapper: binary.clone(),
                });
            }
        }
        Ok(())
    }

    /// `tsan-<frontend>[-MT] ([debug,]<mode>)`
    pub fn label(&self) -> String {
        let mut desc = Vec::new();
        if self.debug {
            desc.push("debug");
        }
        desc.push(self.mode.as_str());

        let mut label = format!("tsan-{}", self.frontend);
        if self.threaded {
            label.push_str("-MT");
        }
        format!("{} ({})", label, desc.join(","))
    }
}

/// A resolved checker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub command: StepCommand,
    pub env: Env,
    pub label: String,
}

/// Assembles `[prefix] <wrapper> <extra args> <frontend flags> <mode flag>
/// <suppressions> <ignore> [--] <binary> <extra test args>`.
pub fn synthesize_test(config: &RunConfig, test_binary: &str) -> Result<TestCommand, ConfigError> {
    config.validate()?;

    let mut env = Env::new();
    let mut flags: Vec<String> = Vec::new();

    let default_binary = match config.frontend {
        Frontend::Valgrind => {
            env.insert("VALGRIND_EXTRACT_DIR".into(), ".".into());
            if config.debug {
                VALGRIND_DEBUG
            } else {
                VALGRIND_RELEASE
            }
        }
        Frontend::Pin => {
            let build_flag = if config.debug { "--dbg" } else { "--opt" };
            flags.push(build_flag.to_string());
            if config.threaded {
                flags.push("--mt".into());
            }
            if let Some(root) = &config.pin_root {
                env.insert("PIN_ROOT".into(), root.clone());
            }
            env.insert("TS_ROOT".into(), "tsan".into());
            PIN_WRAPPER
        }
        Frontend::PinWin => match (config.threaded, config.debug) {
            (true, _) => PIN_WIN_THREADED,
            (false, true) => PIN_WIN_DEBUG,
            (false, false) => PIN_WIN_RELEASE,
        },
    };

    flags.push(config.mode.flag().into());
    flags.push(format!("--suppressions={SUPPRESSIONS_FILE}"));
    flags.push(format!("--ignore={IGNORE_FILE}"));

    // The windows wrapper forwards everything after `--` to the binary.
    if config.frontend == Frontend::PinWin {
        flags.push("--".into());
    }

    let binary = config
        .frontend_binary
        .clone()
        .unwrap_or_else(|| default_binary.to_string());

    let mut args: Vec<String> = config.prefix.clone();
    args.push(binary);
    args.extend(config.extra_args.iter().cloned());
    args.extend(flags);
    args.push(test_binary.to_string());
    args.extend(config.extra_test_args.iter().cloned());

    let command = match &config.append_command {
        Some(append) => {
            args.push(append.clone());
            StepCommand::Shell(args.join(" "))
        }
        None => StepCommand::Argv(args),
    };
    debug!(%command, frontend = %config.frontend, mode = %config.mode, "synthesized test command");

    Ok(TestCommand {
        command,
        env,
        label: config.label(),
    })
}
