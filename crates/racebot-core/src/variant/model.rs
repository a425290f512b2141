use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::variant::naming;

/// Target operating system of a unit test build.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Windows,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Os::Linux),
            "windows" => Ok(Os::Windows),
            other => Err(ConfigError::UnknownOs(other.to_string())),
        }
    }
}

/// Pointer width of the test binary.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "u32")]
pub enum Bits {
    X32,
    X64,
}

impl Bits {
    pub fn as_u32(&self) -> u32 {
        match self {
            Bits::X32 => 32,
            Bits::X64 => 64,
        }
    }

    /// Architecture token used in file names and `ARCH=` build flags.
    pub fn arch(&self) -> &'static str {
        match self {
            Bits::X64 => "amd64",
            Bits::X32 => "x86",
        }
    }
}

impl From<Bits> for u32 {
    fn from(bits: Bits) -> u32 {
        bits.as_u32()
    }
}

impl TryFrom<u32> for Bits {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            32 => Ok(Bits::X32),
            64 => Ok(Bits::X64),
            other => Err(ConfigError::UnsupportedBits(other)),
        }
    }
}

/// Compiler optimization level of the test binary.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "u32")]
pub enum OptLevel {
    O0,
    O1,
}

impl OptLevel {
    pub fn as_u32(&self) -> u32 {
        match self {
            OptLevel::O0 => 0,
            OptLevel::O1 => 1,
        }
    }
}

impl From<OptLevel> for u32 {
    fn from(opt: OptLevel) -> u32 {
        opt.as_u32()
    }
}

impl TryFrom<u32> for OptLevel {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OptLevel::O0),
            1 => Ok(OptLevel::O1),
            other => Err(ConfigError::UnsupportedOpt(other)),
        }
    }
}

/// One point in the unit test build matrix.
///
/// The full tuple is the identity of a build: it determines the artifact
/// name, the human-readable description, and the de-duplication key used
/// by the pipeline builder. Fields are private so that a suffix can only
/// enter through [`Variant::with_suffix`], which validates it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variant {
    os: Os,
    bits: Bits,
    opt: OptLevel,
    #[serde(rename = "static")]
    static_link: bool,
    extra_suffix: Option<String>,
}

impl Variant {
    pub fn new(os: Os, bits: Bits, opt: OptLevel, static_link: bool) -> Self {
        Self {
            os,
            bits,
            opt,
            static_link,
            extra_suffix: None,
        }
    }

    /// Builds a variant from raw matrix numbers, rejecting values outside
    /// the supported space.
    pub fn try_new(os: Os, bits: u32, opt: u32, static_link: bool) -> Result<Self, ConfigError> {
        Ok(Self::new(
            os,
            Bits::try_from(bits)?,
            OptLevel::try_from(opt)?,
            static_link,
        ))
    }

    /// Attaches a build suffix tag such as `-PIC`.
    ///
    /// The tag must start with `-`, must not contain `.` and must not start
    /// with `-static`. Artifact names stay injective that way: a suffix can
    /// never imitate the static marker or the `.exe` extension.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Result<Self, ConfigError> {
        let suffix = suffix.into();
        if suffix.len() < 2
            || !suffix.starts_with('-')
            || suffix.contains('.')
            || suffix.starts_with(naming::STATIC_SUFFIX)
        {
            return Err(ConfigError::InvalidSuffix(suffix));
        }
        self.extra_suffix = Some(suffix);
        Ok(self)
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn bits(&self) -> Bits {
        self.bits
    }

    pub fn opt(&self) -> OptLevel {
        self.opt
    }

    pub fn is_static(&self) -> bool {
        self.static_link
    }

    pub fn extra_suffix(&self) -> Option<&str> {
        self.extra_suffix.as_deref()
    }

    /// Same tuple with the suffix removed.
    pub(crate) fn without_suffix(&self) -> Self {
        Self {
            extra_suffix: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&naming::describe(self))
    }
}
