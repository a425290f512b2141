//! Synthesis of unit test build commands.
//!
//! A [`BuildRequest`] names the variant to build plus the PIC switch and any
//! extra make arguments. [`synthesize_build`] turns it into an immutable
//! [`BuildCommand`] in one pass, together with the *effective* variant: the
//! one whose artifact name the build will actually produce. Test steps must
//! use that effective variant, which is how a PIC build stays tied to the
//! `-PIC` suffix.

use serde::Serialize;
use tracing::debug;

use crate::command::model::StepCommand;
use crate::error::ConfigError;
use crate::variant::Variant;
use crate::variant::naming::{self, PIC_SUFFIX};

const PIC_FLAG: &str = "-fPIC";

/// What to build.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuildRequest {
    pub variant: Variant,
    pub pic: bool,
    pub extra_args: Vec<String>,
}

impl BuildRequest {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            pic: false,
            extra_args: Vec::new(),
        }
    }

    /// Request position-independent code.
    pub fn pic(mut self) -> Self {
        self.pic = true;
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// A fully resolved unit test build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub command: StepCommand,
    /// Variant the build output is named after.
    pub variant: Variant,
}

/// Builds `make -C unittest all OS=.. ARCH=.. OPT=.. STATIC=..` followed by
/// the PIC flag sets, the build suffix and the extra arguments.
pub fn synthesize_build(request: &BuildRequest) -> Result<BuildCommand, ConfigError> {
    if let Some(suffix) = naming::find_extra_build_suffix(&request.extra_args) {
        return Err(ConfigError::SuffixInExtraArgs(suffix.to_string()));
    }

    let variant = effective_variant(request)?;

    let mut args: Vec<String> = ["make", "-C", "unittest", "all"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(format!("OS={}", variant.os()));
    args.push(format!("ARCH={}", variant.bits().arch()));
    args.push(format!("OPT={}", variant.opt().as_u32()));
    args.push(format!("STATIC={}", u8::from(variant.is_static())));

    if request.pic {
        args.push(format!("EXTRA_CFLAGS={PIC_FLAG}"));
        args.push(format!("EXTRA_CXXFLAGS={PIC_FLAG}"));
    }
    if let Some(suffix) = variant.extra_suffix() {
        args.push(format!("EXTRA_BUILD_SUFFIX={suffix}"));
    }
    args.extend(request.extra_args.iter().cloned());

    let command = StepCommand::Argv(args);
    debug!(%command, variant = %variant, "synthesized build command");

    Ok(BuildCommand { command, variant })
}

fn effective_variant(request: &BuildRequest) -> Result<Variant, ConfigError> {
    let variant = &request.variant;
    match (request.pic, variant.extra_suffix()) {
        (true, None) => variant.clone().with_suffix(PIC_SUFFIX),
        (true, Some(PIC_SUFFIX)) => Ok(variant.clone()),
        (true, Some(other)) => Err(ConfigError::PicSuffixConflict {
            variant: variant.without_suffix().to_string(),
            suffix: other.to_string(),
        }),
        (false, Some(PIC_SUFFIX)) => Err(ConfigError::PicSuffixWithoutPic(variant.to_string())),
        (false, _) => Ok(variant.clone()),
    }
}
