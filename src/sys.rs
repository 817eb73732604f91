//! Safe wrappers for platform-specific unsafe operations.
//!
//! Every `unsafe` block in the codebase lives here. Call sites use the safe
//! public API and never touch `unsafe` directly.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// Return `true` if `path` exists and is a named pipe.
///
/// Symlinks are followed, so a link to a FIFO counts.
pub fn is_fifo(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.file_type().is_fifo())
        .unwrap_or(false)
}

/// Create a named pipe at `path` with the given permission bits.
///
/// # Safety
/// `mkfifo` is a standard POSIX call; we pass a valid NUL-terminated path and
/// check the return value.
pub fn make_fifo(path: &Path, mode: u32) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn set_env(key: &str, value: &str) {
    // SAFETY: Caller must ensure no other threads are reading environment
    // variables concurrently.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Remove an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn remove_env(key: &str) {
    // SAFETY: Caller must ensure no other threads are reading environment
    // variables concurrently.
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn make_fifo_creates_a_fifo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.fifo");
        make_fifo(&path, 0o600).expect("mkfifo");
        assert!(is_fifo(&path));
    }

    #[test]
    fn make_fifo_fails_if_path_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.fifo");
        make_fifo(&path, 0o600).expect("mkfifo");
        let err = make_fifo(&path, 0o600).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn regular_file_and_missing_path_are_not_fifos() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        assert!(!is_fifo(file.path()));
        assert!(!is_fifo(Path::new("/nonexistent_path_that_does_not_exist_xyz")));
    }

    #[test]
    fn set_env_and_read_back() {
        let _guard = ENV_LOCK.lock().expect("ENV_LOCK poisoned");
        const KEY: &str = "VSND_SYS_TEST_VAR";
        set_env(KEY, "hello");
        let value = std::env::var(KEY).expect("var should be set");
        assert_eq!(value, "hello");
        remove_env(KEY);
        assert!(
            std::env::var(KEY).is_err(),
            "var should be removed after remove_env"
        );
    }
}
