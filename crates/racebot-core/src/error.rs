//! Error types surfaced while assembling or evaluating pipelines.
//!
//! Configuration problems are detected before any step is scheduled and
//! reported as [`ConfigError`]. Problems observed while walking the outcome
//! of an executed pipeline are reported as [`RunError`].

use thiserror::Error;

/// Invalid build/test configuration, raised at pipeline-assembly time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown frontend `{0}` (expected valgrind, pin or pin-win)")]
    UnknownFrontend(String),

    #[error("unknown mode `{0}` (expected phb or hybrid)")]
    UnknownMode(String),

    #[error("unknown os `{0}` (expected linux or windows)")]
    UnknownOs(String),

    #[error("unsupported bit width {0} (expected 32 or 64)")]
    UnsupportedBits(u32),

    #[error("unsupported optimization level {0} (expected 0 or 1)")]
    UnsupportedOpt(u32),

    #[error("invalid build suffix `{0}`: must start with '-', must not contain '.' and must not start with '-static'")]
    InvalidSuffix(String),

    #[error("PIC build of {variant} cannot carry the suffix `{suffix}`")]
    PicSuffixConflict { variant: String, suffix: String },

    #[error("variant {0} carries the PIC suffix but was not requested as a PIC build")]
    PicSuffixWithoutPic(String),

    #[error("EXTRA_BUILD_SUFFIX must come from the variant, found `{0}` in extra build arguments")]
    SuffixInExtraArgs(String),

    #[error("variant {0} is already built in this pipeline with different build parameters")]
    ConflictingBuild(String),

    #[error("no build of variant {0} is available to this pipeline")]
    MissingBuild(String),

    #[error("frontend {frontend} cannot run {os} test binaries")]
    FrontendOsMismatch { frontend: String, os: String },

    #[error("mode flag `{0}` in extra arguments; the mode is chosen by the run configuration")]
    ModeFlagInArgs(String),

    #[error("flag `{flag}` belongs to another frontend and cannot be passed to {frontend}")]
    ForeignFlag { frontend: String, flag: String },

    #[error("wrapper `{wrapper}` belongs to another frontend and cannot run {frontend}")]
    ForeignWrapper { frontend: String, wrapper: String },

    #[error("tool test step needs at least one arch/os target")]
    EmptyToolTests,

    #[error("duplicate builder name `{0}`")]
    DuplicateBuilder(String),

    #[error("unknown builder `{0}`")]
    UnknownBuilder(String),
}

/// Misuse of the pipeline-scoped revision slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("revision already published as `{existing}`, refusing to overwrite with `{attempted}`")]
    AlreadyPublished { existing: String, attempted: String },
}

/// Errors raised while recording step outcomes against a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("pipeline run has no pending step (finished or halted)")]
    NoPendingStep,

    #[error(transparent)]
    Revision(#[from] RevisionError),
}
