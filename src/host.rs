// src/host.rs

//! Host, platform and user detection.

/// Platform family, as far as lock-age semantics are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Name of the current host.
///
/// Falls back to the `HOSTNAME` / `COMPUTERNAME` environment variables and
/// finally to `"localhost"` when the OS refuses to tell.
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Application environment taken from `APPLICATION_ENV`, if set and non-empty.
pub fn application_env() -> Option<String> {
    std::env::var("APPLICATION_ENV")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Whether the current process may switch to another user.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

/// The null device for the current platform.
pub fn null_device() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}
