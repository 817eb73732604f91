//! The set of devices this process exposes, keyed by id.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::device::card::{Device, DeviceId};
use crate::device::sink::{FifoOpener, FifoValidator, SinkOpener, SinkValidator};
use crate::error::{Result, VsndError};
use crate::stream::Stream;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registered devices. Ids are positions in the configured device list, so a
/// skipped entry leaves a gap rather than renumbering the rest.
#[derive(Debug)]
pub struct Registry {
    devices: BTreeMap<DeviceId, Arc<Device>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Register every enabled device in `config` whose output is a FIFO.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder().build(config)
    }

    pub fn device(&self, id: DeviceId) -> Result<&Arc<Device>> {
        self.devices.get(&id).ok_or(VsndError::UnknownDevice { id })
    }

    /// Open the stream of device `id`.
    pub fn open(&self, id: DeviceId) -> Result<Stream> {
        self.device(id)?.open()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    /// The lowest registered id.
    pub fn first_id(&self) -> Option<DeviceId> {
        self.devices.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Chooses the clock, sink opener and output validator devices are built
/// with. Defaults are the system clock and real FIFOs.
pub struct RegistryBuilder {
    clock: Arc<dyn Clock>,
    opener: Arc<dyn SinkOpener>,
    validator: Arc<dyn SinkValidator>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            opener: Arc::new(FifoOpener),
            validator: Arc::new(FifoValidator),
        }
    }
}

impl RegistryBuilder {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn SinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SinkValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn build(self, config: &Config) -> Result<Registry> {
        config.validate()?;

        let mut devices = BTreeMap::new();
        for (index, entry) in config.devices.iter().enumerate() {
            let id = DeviceId::try_from(index)
                .map_err(|_| VsndError::config_invalid("too many devices"))?;
            if !entry.enable {
                info!(device = id, "device disabled; skipping");
                continue;
            }
            if !self.validator.validate(&entry.output) {
                warn!(
                    device = id,
                    output = %entry.output.display(),
                    "output is missing or not a FIFO; skipping"
                );
                continue;
            }

            let mut device = Device::new(id, &entry.output, config.clock.tick_rate)
                .with_clock(Arc::clone(&self.clock))
                .with_opener(Arc::clone(&self.opener))
                .with_default_params(entry.params());
            if let Some(name) = &entry.id {
                device = device.with_name(name.clone());
            }
            info!(
                device = id,
                name = device.name(),
                output = %entry.output.display(),
                "device registered"
            );
            devices.insert(id, Arc::new(device));
        }

        if devices.is_empty() {
            return Err(VsndError::NoDevices);
        }
        Ok(Registry { devices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::sink::CollectorSink;
    use std::path::{Path, PathBuf};

    /// Accepts any path whose file name starts with "ok".
    struct PrefixValidator;

    impl SinkValidator for PrefixValidator {
        fn validate(&self, path: &Path) -> bool {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("ok"))
        }
    }

    fn device(output: &str, enable: bool) -> DeviceConfig {
        DeviceConfig {
            enable,
            output: PathBuf::from(output),
            ..DeviceConfig::default()
        }
    }

    fn build(devices: Vec<DeviceConfig>) -> Result<Registry> {
        let config = Config {
            devices,
            ..Config::default()
        };
        Registry::builder()
            .with_opener(Arc::new(CollectorSink::new()))
            .with_validator(Arc::new(PrefixValidator))
            .build(&config)
    }

    #[test]
    fn skips_disabled_and_invalid_outputs() {
        let registry = build(vec![
            device("/tmp/ok0", true),
            device("/tmp/ok1", false),
            device("/tmp/bad2", true),
            device("/tmp/ok3", true),
        ])
        .unwrap();

        let ids: Vec<_> = registry.devices().map(|d| d.id()).collect();
        assert_eq!(ids, vec![0, 3]);
        assert_eq!(registry.first_id(), Some(0));
        assert!(matches!(
            registry.device(2),
            Err(VsndError::UnknownDevice { id: 2 })
        ));
    }

    #[test]
    fn no_usable_device_is_an_error() {
        let err = build(vec![device("/tmp/bad", true), device("/tmp/ok", false)]).unwrap_err();
        assert!(matches!(err, VsndError::NoDevices));
    }

    #[test]
    fn config_id_becomes_device_name() {
        let mut entry = device("/tmp/ok", true);
        entry.id = Some("speaker".into());
        let registry = build(vec![entry]).unwrap();
        assert_eq!(registry.device(0).unwrap().name(), "speaker");
    }

    #[test]
    fn default_params_come_from_config() {
        let mut entry = device("/tmp/ok", true);
        entry.rate = 8000;
        let registry = build(vec![entry]).unwrap();
        assert_eq!(registry.device(0).unwrap().default_params().rate, 8000);
    }

    #[test]
    fn open_unknown_device_fails() {
        let registry = build(vec![device("/tmp/ok", true)]).unwrap();
        assert!(matches!(
            registry.open(5),
            Err(VsndError::UnknownDevice { id: 5 })
        ));
        assert!(registry.open(0).is_ok());
    }

    #[test]
    fn invalid_config_is_rejected_before_registration() {
        let mut config = Config::default();
        config.clock.tick_rate = 0;
        let err = Registry::builder()
            .with_validator(Arc::new(PrefixValidator))
            .build(&config)
            .unwrap_err();
        assert!(matches!(err, VsndError::ConfigInvalid { .. }));
    }
}
