//! Deterministic naming derived from a [`Variant`].
//!
//! The artifact name is the join key between the build step that produces
//! a unit test binary and every test step that runs it, so both sides must
//! go through these functions.

use crate::variant::model::{Os, Variant};

/// Base name of the race checker unit test binary.
pub const DEFAULT_TEST_BASE_NAME: &str = "racecheck_unittest";

/// Directory (relative to the build root) holding built unit tests.
pub const BINARY_DIR: &str = "unittest/bin";

/// Literal appended for statically linked builds.
pub const STATIC_SUFFIX: &str = "-static";

/// Suffix tag carried by position-independent-code builds.
pub const PIC_SUFFIX: &str = "-PIC";

const EXTRA_BUILD_SUFFIX_ARG: &str = "EXTRA_BUILD_SUFFIX=";

/// `<base>-<os>-<arch>-O<opt>[-static][<suffix>][.exe]`
pub fn artifact_name(variant: &Variant, base_name: &str) -> String {
    let mut name = format!(
        "{}-{}-{}-O{}",
        base_name,
        variant.os(),
        variant.bits().arch(),
        variant.opt().as_u32()
    );
    if variant.is_static() {
        name.push_str(STATIC_SUFFIX);
    }
    if let Some(suffix) = variant.extra_suffix() {
        name.push_str(suffix);
    }
    if variant.os() == Os::Windows {
        name.push_str(".exe");
    }
    name
}

/// Path of the built test binary as seen from the build root.
pub fn binary_path(variant: &Variant, base_name: &str) -> String {
    format!("{}/{}", BINARY_DIR, artifact_name(variant, base_name))
}

/// `(os,bits,O<opt>[,static][,suffix])`
pub fn describe(variant: &Variant) -> String {
    let mut desc = vec![
        variant.os().to_string(),
        variant.bits().as_u32().to_string(),
        format!("O{}", variant.opt().as_u32()),
    ];
    if variant.is_static() {
        desc.push("static".to_string());
    }
    if let Some(suffix) = variant.extra_suffix() {
        desc.push(suffix.to_string());
    }
    format!("({})", desc.join(","))
}

/// Returns the value of the first `EXTRA_BUILD_SUFFIX=` argument, if any.
pub fn find_extra_build_suffix(args: &[String]) -> Option<&str> {
    args.iter()
        .find_map(|arg| arg.strip_prefix(EXTRA_BUILD_SUFFIX_ARG))
}
