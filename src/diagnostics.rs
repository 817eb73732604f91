//! Output pipe diagnostics and setup.
//!
//! Verifies that every configured device has a usable named pipe, and creates
//! the missing ones for `vsnd init`.

use crate::config::Config;
use crate::device::sink::FifoSink;
use crate::sys;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Permission bits for pipes created by `vsnd init`.
const FIFO_MODE: u32 = 0o660;

/// Result of an output check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Pipe exists and can be opened for writing
    Ok,
    /// Nothing at the path
    NotFound,
    /// Path exists but is unusable
    Warning(String),
}

/// What `init` did for one output path.
#[derive(Debug, PartialEq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
    NotAFifo,
    Failed(String),
}

/// Check that `path` is a named pipe the device can open.
pub fn check_output(path: &Path) -> CheckResult {
    if std::fs::symlink_metadata(path).is_err() {
        return CheckResult::NotFound;
    }
    if !sys::is_fifo(path) {
        return CheckResult::Warning("exists but is not a named pipe".to_string());
    }
    match FifoSink::open(path) {
        Ok(_) => CheckResult::Ok,
        Err(e) => CheckResult::Warning(format!("cannot open for writing: {}", e)),
    }
}

/// Run the check for every configured device and print results.
///
/// Returns `true` if every enabled device is usable.
pub fn check_devices(config: &Config) -> bool {
    println!("Checking configured devices...\n");

    let mut ready = 0usize;
    let mut enabled = 0usize;
    for (id, device) in config.devices.iter().enumerate() {
        let name = device
            .id
            .clone()
            .unwrap_or_else(|| format!("vsnd{}", id));
        print!("[{}] {} → {}: ", id, name, device.output.display());

        if !device.enable {
            println!("{}", "- disabled".dimmed());
            continue;
        }
        enabled += 1;

        match check_output(&device.output) {
            CheckResult::Ok => {
                ready += 1;
                println!("{}", "✓ OK".green());
            }
            CheckResult::NotFound => {
                println!("{}", "✗ NOT FOUND".red());
                println!("  Create it with: vsnd init");
            }
            CheckResult::Warning(msg) => println!("{} {}", "⚠ WARNING:".yellow(), msg),
        }
    }

    println!();
    if enabled == 0 {
        println!("{}", "⚠ No device is enabled.".yellow());
    } else if ready == enabled {
        println!("{}", format!("✓ {ready} device(s) ready.").green());
    } else {
        println!(
            "{}",
            format!("⚠ {ready} of {enabled} enabled device(s) ready.").yellow()
        );
    }
    enabled > 0 && ready == enabled
}

/// Create a named pipe for every enabled device whose output is missing.
pub fn create_missing_fifos(config: &Config) -> Vec<(PathBuf, InitOutcome)> {
    config
        .devices
        .iter()
        .filter(|device| device.enable)
        .map(|device| (device.output.clone(), create_fifo(&device.output)))
        .collect()
}

fn create_fifo(path: &Path) -> InitOutcome {
    match check_output(path) {
        CheckResult::NotFound => {}
        _ if sys::is_fifo(path) => return InitOutcome::AlreadyExists,
        _ => return InitOutcome::NotAFifo,
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return InitOutcome::Failed(format!("cannot create {}: {}", parent.display(), e));
    }
    match sys::make_fifo(path, FIFO_MODE) {
        Ok(()) => InitOutcome::Created,
        Err(e) => InitOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn config_with(outputs: &[(&Path, bool)]) -> Config {
        Config {
            devices: outputs
                .iter()
                .map(|(path, enable)| DeviceConfig {
                    enable: *enable,
                    output: path.to_path_buf(),
                    ..DeviceConfig::default()
                })
                .collect(),
            ..Config::default()
        }
    }

    #[test]
    fn test_check_result_equality() {
        assert_eq!(CheckResult::Ok, CheckResult::Ok);
        assert_eq!(CheckResult::NotFound, CheckResult::NotFound);
        assert_ne!(
            CheckResult::Warning("a".to_string()),
            CheckResult::Warning("b".to_string())
        );
    }

    #[test]
    fn test_check_output_missing() {
        assert_eq!(
            check_output(Path::new("/nonexistent/vsnd/out.fifo")),
            CheckResult::NotFound
        );
    }

    #[test]
    fn test_check_output_regular_file_warns() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(check_output(file.path()), CheckResult::Warning(_)));
    }

    #[test]
    fn test_check_output_fifo_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fifo");
        sys::make_fifo(&path, FIFO_MODE).unwrap();
        assert_eq!(check_output(&path), CheckResult::Ok);
    }

    #[test]
    fn test_create_missing_fifos() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("nested").join("fresh.fifo");
        let existing = dir.path().join("existing.fifo");
        let disabled = dir.path().join("disabled.fifo");
        let regular = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        sys::make_fifo(&existing, FIFO_MODE).unwrap();

        let config = config_with(&[
            (fresh.as_path(), true),
            (existing.as_path(), true),
            (disabled.as_path(), false),
            (regular.path(), true),
        ]);
        let outcomes = create_missing_fifos(&config);

        assert_eq!(
            outcomes,
            vec![
                (fresh.clone(), InitOutcome::Created),
                (existing, InitOutcome::AlreadyExists),
                (regular.path().to_path_buf(), InitOutcome::NotAFifo),
            ]
        );
        assert!(sys::is_fifo(&fresh));
        assert!(!disabled.exists());
    }

    #[test]
    fn test_check_devices_reports_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("ok.fifo");
        sys::make_fifo(&fifo, FIFO_MODE).unwrap();
        let missing = dir.path().join("missing.fifo");

        assert!(check_devices(&config_with(&[(fifo.as_path(), true), (missing.as_path(), false)])));
        assert!(!check_devices(&config_with(&[(fifo.as_path(), true), (missing.as_path(), true)])));
        assert!(!check_devices(&config_with(&[(fifo.as_path(), false)])));
    }
}
