//! Command-line interface for vsnd
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Software-clocked virtual audio output
#[derive(Parser, Debug)]
#[command(
    name = "vsnd",
    version,
    about = "Software-clocked virtual audio output that paces PCM into a named pipe"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: lifecycle, -vv: every tick)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `500ms`), and compound (`1m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configured devices and their output pipes
    Check,

    /// List registered devices
    Devices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create missing named pipes for configured devices
    Init,

    /// Play a WAV file through a device
    Play {
        /// WAV file to play
        #[arg(value_name = "WAV")]
        path: PathBuf,

        /// Device id (default: first registered device)
        #[arg(long, short = 'd', value_name = "N")]
        device: Option<u32>,
    },

    /// Play a sine test tone through a device
    Tone {
        /// Tone frequency in Hz
        #[arg(long, value_name = "HZ", default_value = "440")]
        freq: f32,

        /// How long to play. Examples: 2s, 500ms, 1m
        #[arg(long, value_name = "DURATION", default_value = "2s", value_parser = parse_duration)]
        duration: Duration,

        /// Device id (default: first registered device)
        #[arg(long, short = 'd', value_name = "N")]
        device: Option<u32>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["vsnd"]).is_err());
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["vsnd", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check));
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_devices_json() {
        let cli = Cli::try_parse_from(["vsnd", "devices", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Devices { json: true }));
    }

    #[test]
    fn test_parse_play_with_device() {
        let cli = Cli::try_parse_from(["vsnd", "play", "clip.wav", "--device", "2"]).unwrap();
        match cli.command {
            Commands::Play { path, device } => {
                assert_eq!(path, PathBuf::from("clip.wav"));
                assert_eq!(device, Some(2));
            }
            _ => panic!("Expected Play command"),
        }
    }

    #[test]
    fn test_parse_play_requires_path() {
        assert!(Cli::try_parse_from(["vsnd", "play"]).is_err());
    }

    #[test]
    fn test_parse_tone_defaults() {
        let cli = Cli::try_parse_from(["vsnd", "tone"]).unwrap();
        match cli.command {
            Commands::Tone {
                freq,
                duration,
                device,
            } => {
                assert_eq!(freq, 440.0);
                assert_eq!(duration, Duration::from_secs(2));
                assert_eq!(device, None);
            }
            _ => panic!("Expected Tone command"),
        }
    }

    #[test]
    fn test_parse_tone_humantime_duration() {
        let cli =
            Cli::try_parse_from(["vsnd", "tone", "--freq", "1000", "--duration", "1m30s"]).unwrap();
        match cli.command {
            Commands::Tone { freq, duration, .. } => {
                assert_eq!(freq, 1000.0);
                assert_eq!(duration, Duration::from_secs(90));
            }
            _ => panic!("Expected Tone command"),
        }
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["vsnd", "init", "-vv", "--config", "/tmp/vsnd.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Init));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/vsnd.toml")));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["vsnd", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
