use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use stagehand_foundation::ConfigError;

/// Immutable configuration snapshot (C12), layered from `settings.{json,toml}`
/// if present and then `STAGEHAND_`-prefixed environment variables (segments
/// joined with `__`, mirroring the teacher's `COLDVOX_INJECTION__...` style).
/// Passed by the supervisor to each worker at start; never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub script_path: String,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,

    #[serde(default)]
    pub microphone: MicrophoneSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub stage_zone: StageZoneSettings,
    #[serde(default)]
    pub performer_tracker: PerformerTrackerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrophoneSettings {
    pub microphone_device: Option<String>,
}

impl Default for MicrophoneSettings {
    fn default() -> Self {
        Self {
            microphone_device: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    pub brightness: u8,
    pub exposure: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub rotation: u8,
    pub clahe: bool,
    pub clahe_clip_limit: u8,
    pub resolution: Option<(u32, u32)>,
    pub video_device_pos: i32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            brightness: 50,
            exposure: 50,
            contrast: 50,
            saturation: 50,
            mirror_x: false,
            mirror_y: false,
            rotation: 0,
            clahe: false,
            clahe_clip_limit: 40,
            resolution: None,
            video_device_pos: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageZoneSettings {
    pub src_points: [[f64; 2]; 4],
    pub homography_width: f64,
    pub homography_height: f64,
    pub enable_homography: bool,
    pub enable_crop: bool,
    pub crop_points: Option<Vec<[f64; 2]>>,
}

impl Default for StageZoneSettings {
    fn default() -> Self {
        Self {
            src_points: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            homography_width: 1.0,
            homography_height: 1.0,
            enable_homography: false,
            enable_crop: false,
            crop_points: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformerTrackerSettings {
    pub user_folder: String,
    pub uncertain_folder: String,
    pub save_interval: u64,
    pub tracked_user_id: Option<String>,
    pub light_coords: (f64, f64, f64),
    pub max_pan: f64,
    pub max_tilt: f64,
    pub light_node_ip: String,
    pub light_node_port: u16,
    pub light_universe_id: u16,
    pub logging_level: String,
    pub show_window: bool,
}

impl Default for PerformerTrackerSettings {
    fn default() -> Self {
        Self {
            user_folder: "data/identities".to_string(),
            uncertain_folder: "data/uncertain".to_string(),
            save_interval: 30,
            tracked_user_id: None,
            light_coords: (0.0, 0.0, 5.0),
            max_pan: 540.0,
            max_tilt: 270.0,
            light_node_ip: "127.0.0.1".to_string(),
            light_node_port: 6454,
            light_universe_id: 0,
            logging_level: "info".to_string(),
            show_window: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script_path: "script.json".to_string(),
            mqtt_broker: std::env::var("HIVEMQ_IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            mqtt_port: std::env::var("HIVEMQ_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),
            mqtt_client_id: "stagehand".to_string(),
            microphone: MicrophoneSettings::default(),
            camera: CameraSettings::default(),
            stage_zone: StageZoneSettings::default(),
            performer_tracker: PerformerTrackerSettings::default(),
        }
    }
}

impl Settings {
    /// Loads `settings.{json,toml}` (if present) layered with
    /// `STAGEHAND_`-prefixed environment variables, falling back to
    /// defaults entirely when neither is set.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("STAGEHAND").separator("__"));

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize().unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    /// Clamps out-of-range values to their nearest valid bound (warning),
    /// and fails fast on values that cannot be sensibly defaulted
    /// (`ConfigInvalid`, per the error-handling design).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        clamp_u8_field(&mut self.camera.brightness, "camera.brightness");
        clamp_u8_field(&mut self.camera.exposure, "camera.exposure");
        clamp_u8_field(&mut self.camera.contrast, "camera.contrast");
        clamp_u8_field(&mut self.camera.saturation, "camera.saturation");
        clamp_u8_field(&mut self.camera.clahe_clip_limit, "camera.clahe_clip_limit");

        if self.camera.rotation > 3 {
            tracing::warn!(
                value = self.camera.rotation,
                "camera.rotation out of range, clamping to 0"
            );
            self.camera.rotation = 0;
        }

        if self.stage_zone.enable_homography {
            if !(self.stage_zone.homography_width.is_finite()
                && self.stage_zone.homography_width > 0.0)
                || !(self.stage_zone.homography_height.is_finite()
                    && self.stage_zone.homography_height > 0.0)
            {
                return Err(ConfigError::Validation {
                    field: "stage_zone.homography_width/height".to_string(),
                    reason: "must be positive finite numbers".to_string(),
                });
            }
        }

        if self.performer_tracker.max_pan <= 0.0 || self.performer_tracker.max_tilt <= 0.0 {
            return Err(ConfigError::Validation {
                field: "performer_tracker.max_pan/max_tilt".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

fn clamp_u8_field(value: &mut u8, field: &str) {
    if *value > 100 {
        tracing::warn!(field, original = *value, "value out of 0..=100, clamping to 100");
        *value = 100;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_neutral_and_valid() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.camera.brightness, 50);
    }

    #[test]
    fn out_of_range_camera_values_are_clamped() {
        let mut settings = Settings::default();
        settings.camera.brightness = 255;
        settings.validate().unwrap();
        assert_eq!(settings.camera.brightness, 100);
    }

    #[test]
    fn zero_max_pan_is_rejected() {
        let mut settings = Settings::default();
        settings.performer_tracker.max_pan = 0.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_homography_dimensions_are_rejected_when_enabled() {
        let mut settings = Settings::default();
        settings.stage_zone.enable_homography = true;
        settings.stage_zone.homography_width = 0.0;
        assert!(settings.validate().is_err());
    }
}
