//! Version strings for the primes-api binary.
//!
//! Release builds may set `PRIMES_GIT_REV` at compile time to stamp the git
//! revision into `--version` and `/api/health`.

use std::sync::LazyLock;

/// The package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision baked in at build time (empty if not set).
pub const GIT_REV: &str = match option_env!("PRIMES_GIT_REV") {
    Some(rev) => rev,
    None => "",
};

static FULL_VERSION: LazyLock<String> = LazyLock::new(|| {
    if GIT_REV.is_empty() {
        PKG_VERSION.to_string()
    } else {
        format!("{} ({})", PKG_VERSION, GIT_REV)
    }
});

/// Returns `"X.Y.Z (rev)"` when a git revision was stamped, else `"X.Y.Z"`.
///
/// # Examples
///
/// ```
/// use primes_api::version::full_version;
///
/// assert!(full_version().starts_with(env!("CARGO_PKG_VERSION")));
/// ```
pub fn full_version() -> String {
    FULL_VERSION.clone()
}

/// Static version string for clap's `--version`.
pub fn clap_version() -> &'static str {
    FULL_VERSION.as_str()
}
