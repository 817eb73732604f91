use crate::audio::format::SampleFormat;
use crate::defaults;
use crate::error::{Result, VsndError};
use crate::stream::geometry::StreamParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub clock: ClockConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Software clock configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClockConfig {
    /// Ticks per real second
    pub tick_rate: u32,
}

/// One virtual output device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub enable: bool,
    /// Device name; `vsnd<N>` when unset
    pub id: Option<String>,
    /// Named pipe the device writes into
    pub output: PathBuf,
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
    pub buffer_frames: u32,
    pub period_frames: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            devices: vec![DeviceConfig::default()],
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate: defaults::TICK_RATE,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enable: true,
            id: None,
            output: PathBuf::from(format!("/tmp/{}0.fifo", defaults::DRIVER_NAME)),
            format: defaults::PCM_FORMAT,
            rate: defaults::PCM_RATE,
            channels: defaults::PCM_CHANNELS,
            buffer_frames: defaults::BUFFER_FRAMES,
            period_frames: defaults::PERIOD_FRAMES,
        }
    }
}

impl DeviceConfig {
    /// Stream parameters this device plays with by default
    pub fn params(&self) -> StreamParams {
        StreamParams {
            format: self.format,
            rate: self.rate,
            channels: self.channels,
            buffer_frames: self.buffer_frames,
            period_frames: self.period_frames,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VsndError::ConfigFileNotFound {
                path: path.display().to_string(),
            },
            _ => VsndError::Io(e),
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VsndError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VSND_OUTPUT → devices[0].output
    /// - VSND_TICK_RATE → clock.tick_rate
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(output) = std::env::var("VSND_OUTPUT")
            && !output.is_empty()
        {
            match self.devices.first_mut() {
                Some(device) => device.output = PathBuf::from(output),
                None => self.devices.push(DeviceConfig {
                    output: PathBuf::from(output),
                    ..DeviceConfig::default()
                }),
            }
        }

        if let Ok(rate) = std::env::var("VSND_TICK_RATE")
            && !rate.is_empty()
        {
            self.clock.tick_rate = rate.trim().parse().map_err(|e| VsndError::ConfigParse {
                message: format!("VSND_TICK_RATE={rate}: {e}"),
            })?;
        }

        Ok(self)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.clock.tick_rate == 0 {
            return Err(VsndError::config_invalid("clock.tick_rate must be positive"));
        }
        if self.devices.len() > defaults::MAX_DEVICES {
            return Err(VsndError::config_invalid(format!(
                "{} devices configured, at most {} are supported",
                self.devices.len(),
                defaults::MAX_DEVICES
            )));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/vsnd/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| VsndError::Other("could not determine config directory".into()))?;
        Ok(dir.join(defaults::DRIVER_NAME).join("config.toml"))
    }
}
