//! Build metadata captured by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

pub fn build_target() -> &'static str {
    BUILD_TARGET
}

/// Version line used by `--version` and the startup banner
pub fn long_version() -> String {
    format!(
        "{} ({} built {} for {})",
        env!("CARGO_PKG_VERSION"),
        git_hash(),
        build_time(),
        build_target()
    )
}
