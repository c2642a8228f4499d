//! Backend capability probe
//!
//! Determines at startup (and again on every recovery attempt) whether the
//! native decoding library is loadable on this host. Unavailability is a
//! normal, expected outcome: downstream code treats it as routine and falls
//! back to the simulated decoder.
//!
//! All dynamic-library discovery side effects live here; nothing else in the
//! engine touches process-wide search-path state.

use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(target_os = "windows")]
const BACKEND_LIBRARY: &str = "libmpv-2.dll";
#[cfg(target_os = "macos")]
const BACKEND_LIBRARY: &str = "libmpv.2.dylib";
#[cfg(all(unix, not(target_os = "macos")))]
const BACKEND_LIBRARY: &str = "libmpv.so.2";

/// Result of probing for the native decoding backend
#[derive(Debug, Clone)]
pub enum BackendAvailability {
    /// Backend library loads; `path` is what `Library::new` accepted
    Available { path: PathBuf },
    /// Backend library cannot be loaded on this host
    Unavailable { reason: String },
}

/// Probe for the native decoding backend
///
/// Tries, in order: caller-supplied extra directories, the executable's
/// directory, the current working directory, and finally the bare library
/// soname (system resolver). The first candidate that actually loads wins;
/// the probe library handle is dropped immediately since construction
/// re-opens it (dlopen reference counting makes that cheap).
///
/// Never panics and never returns an error.
pub fn probe(extra_dirs: &[PathBuf]) -> BackendAvailability {
    let mut last_error = String::from("no candidate locations");

    for candidate in candidate_paths(extra_dirs) {
        debug!("Probing decoder backend at {}", candidate.display());
        match unsafe { Library::new(&candidate) } {
            Ok(lib) => {
                drop(lib);
                register_library_dir(&candidate);
                return BackendAvailability::Available { path: candidate };
            }
            Err(e) => {
                last_error = format!("{}: {}", candidate.display(), e);
            }
        }
    }

    BackendAvailability::Unavailable { reason: last_error }
}

/// Ordered candidate paths for the backend library
fn candidate_paths(extra_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = extra_dirs
        .iter()
        .map(|dir| dir.join(BACKEND_LIBRARY))
        .collect();

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            candidates.push(exe_dir.join(BACKEND_LIBRARY));
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(BACKEND_LIBRARY));
    }

    // Bare soname last: lets the system resolver find an installed copy
    candidates.push(PathBuf::from(BACKEND_LIBRARY));

    candidates
}

/// Register the found library's directory with the host's resolution
/// mechanism so later backend construction (and the library's own transitive
/// loads) succeed.
#[cfg(target_os = "windows")]
fn register_library_dir(candidate: &Path) {
    if let Some(dir) = candidate.parent().filter(|d| !d.as_os_str().is_empty()) {
        let current = std::env::var("PATH").unwrap_or_default();
        let dir_str = dir.to_string_lossy();
        if !current.split(';').any(|p| p == dir_str) {
            std::env::set_var("PATH", format!("{};{}", dir_str, current));
            debug!("Prepended {} to PATH for backend resolution", dir_str);
        }
    }
}

/// Non-Windows hosts resolve transitive dependencies via the library's own
/// rpath/soname machinery; nothing to register.
#[cfg(not(target_os = "windows"))]
fn register_library_dir(_candidate: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_missing_dirs_is_unavailable_or_system_copy() {
        // A bogus extra dir must never panic; the outcome depends on whether
        // the host has the backend installed system-wide.
        let result = probe(&[PathBuf::from("/nonexistent/dir")]);
        match result {
            BackendAvailability::Available { path } => {
                assert!(path.to_string_lossy().contains("mpv"));
            }
            BackendAvailability::Unavailable { reason } => {
                assert!(!reason.is_empty());
            }
        }
    }

    #[test]
    fn test_candidate_order_prefers_extra_dirs() {
        let extra = vec![PathBuf::from("/opt/showdeck")];
        let candidates = candidate_paths(&extra);
        assert!(candidates[0].starts_with("/opt/showdeck"));
        // Bare soname is always the last resort
        assert_eq!(
            candidates.last().unwrap(),
            &PathBuf::from(BACKEND_LIBRARY)
        );
    }
}
