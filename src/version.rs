//! Build version with embedded git metadata.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git branch at build time, or "unknown" outside a checkout.
pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

/// Git commit SHA at build time, or "unknown" outside a checkout.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Build time in RFC 3339, or "unknown" when not embedded.
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// `{version}+{branch}.{short sha}`, suffixed with `.dirty` for builds from
/// a modified working tree.
pub fn version_string() -> String {
    let dirty = option_env!("VERGEN_GIT_DIRTY") == Some("true");
    format!(
        "{PKG_VERSION}+{GIT_BRANCH}.{}{}",
        &GIT_SHA[..7.min(GIT_SHA.len())],
        if dirty { ".dirty" } else { "" }
    )
}
