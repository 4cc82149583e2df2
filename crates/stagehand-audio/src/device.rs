use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use stagehand_foundation::AudioError;

/// Thin wrapper over the `cpal` host, responsible for picking an input
/// device. Device-open failure is fatal per C1's error policy, so callers
/// propagate `AudioError::DeviceNotFound` rather than silently falling back
/// past a device the caller explicitly asked for.
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn enumerate_input_names(&self) -> Vec<String> {
        self.host
            .input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    /// Opens the named device, or the host default input if `name` is
    /// `None`. Does not fall back silently: if a specific name is given and
    /// not found, that is a fatal `DeviceNotFound`.
    pub fn open_input(&self, name: Option<&str>) -> Result<Device, AudioError> {
        if let Some(preferred) = name {
            return self
                .find_by_name(preferred)
                .ok_or(AudioError::DeviceNotFound {
                    name: Some(preferred.to_string()),
                });
        }

        self.host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })
    }

    fn find_by_name(&self, name: &str) -> Option<Device> {
        let devices = self.host.input_devices().ok()?;
        devices
            .into_iter()
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
