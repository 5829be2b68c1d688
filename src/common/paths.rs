//! Socket and configuration paths
//!
//! Each run gets its own socket under `$XDG_RUNTIME_DIR/fugitive-harness/`
//! or `/tmp/fugitive-harness-<uid>/`, so concurrent runs never collide.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Name used for the socket directory and config/log locations
const APP_NAME: &str = "fugitive-harness";

/// Distinguishes sessions started by the same process
static SOCKET_SEQ: AtomicU32 = AtomicU32::new(0);

/// Directory that holds per-run sockets
#[cfg(unix)]
pub fn socket_dir() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join(APP_NAME);
        }
    }

    // Fallback to /tmp with uid for security
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
}

#[cfg(windows)]
pub fn socket_dir() -> PathBuf {
    std::env::temp_dir().join(APP_NAME)
}

/// A fresh socket path for one run
pub fn unique_socket_path() -> PathBuf {
    let seq = SOCKET_SEQ.fetch_add(1, Ordering::Relaxed);
    socket_dir().join(format!("nvim-{}-{}.sock", std::process::id(), seq))
}

/// Ensure the directory containing `socket` exists
///
/// On Unix, a newly created directory gets mode 0700
pub fn ensure_socket_dir(socket: &Path) -> io::Result<PathBuf> {
    let dir = socket
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid socket path"))?;

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    Ok(dir.to_path_buf())
}

/// Remove a socket file if it exists
///
/// Returns whether a file was removed.
pub fn remove_socket(socket: &Path) -> io::Result<bool> {
    match std::fs::remove_file(socket) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_paths_are_unique() {
        let a = unique_socket_path();
        let b = unique_socket_path();
        assert_ne!(a, b);
        assert_eq!(a.parent(), b.parent());
        assert!(a.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn test_remove_socket_is_quiet_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        assert!(!remove_socket(&path).unwrap());

        std::fs::write(&path, b"").unwrap();
        assert!(remove_socket(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_socket_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("nested").join("nvim.sock");
        let created = ensure_socket_dir(&socket).unwrap();
        assert!(created.is_dir());
    }
}
