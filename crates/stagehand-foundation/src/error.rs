use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the Stagehand backend.
///
/// Each pipeline crate defines its own error enum; they are folded in here so
/// the supervisor (C10) can report a single `Failed(reason)` status without
/// caring which pipeline produced it.
#[derive(Error, Debug)]
pub enum StagehandError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Lamp(#[from] LampError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Component failed health check: {component}")]
    HealthCheckFailed { component: String },

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

impl From<std::io::Error> for StagehandError {
    fn from(err: std::io::Error) -> Self {
        StagehandError::Vision(VisionError::Io(err))
    }
}

impl From<tokio::task::JoinError> for StagehandError {
    fn from(err: tokio::task::JoinError) -> Self {
        StagehandError::Transient(format!("task join failed: {}", err))
    }
}

/// Errors from the ring audio buffer and its capture device (C1).
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Buffer overflow, dropped {count} samples")]
    BufferOverflow { count: usize },

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors from the script pipeline (C2/C3/C4): script loading, matching.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script file not found: {path}")]
    NotFound { path: String },

    #[error("Script JSON malformed: {0}")]
    Malformed(String),

    #[error("Script produced zero chunks")]
    EmptyScript,

    #[error("ASR engine failed: {0}")]
    AsrFailed(String),
}

/// Errors from the tracking pipeline (C5/C7/C8): descriptor store, stage mapper.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Camera device not found: {pos}")]
    CameraNotFound { pos: i32 },

    #[error("Camera disconnected")]
    CameraDisconnected,

    #[error("Detector/Re-ID inference failed: {0}")]
    InferenceFailed(String),

    #[error("Homography requires exactly 4 source points, got {count}")]
    InvalidSourcePoints { count: usize },

    #[error("Homography dimensions must be positive finite numbers: width={width}, height={height}")]
    InvalidHomographyDimensions { width: f64, height: f64 },

    #[error("Homography matrix is singular for the given source points")]
    SingularHomography,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the lamp control loop and Art-Net emitter (C9/C13).
#[derive(Debug, Error)]
pub enum LampError {
    #[error("Art-Net socket bind failed: {0}")]
    BindFailed(String),

    #[error("Art-Net send failed: {0}")]
    SendFailed(String),

    #[error("Unknown DMX channel: {0}")]
    UnknownChannel(String),
}

/// Errors from the publish/subscribe client (C11).
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Client disconnected")]
    Disconnected,
}

/// Errors from settings (C12) loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration parsing error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    RetryOnce { delay: Duration },
    Fatal,
    Ignore,
}

impl StagehandError {
    /// Maps an error onto the retry/fatal policy table in the specification's
    /// Error Handling Design section.
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            StagehandError::Audio(AudioError::DeviceDisconnected) => RecoveryStrategy::RetryOnce {
                delay: Duration::from_millis(500),
            },
            StagehandError::Vision(VisionError::CameraDisconnected) => {
                RecoveryStrategy::RetryOnce {
                    delay: Duration::from_millis(500),
                }
            }
            StagehandError::Audio(AudioError::BufferOverflow { .. }) => RecoveryStrategy::Ignore,
            StagehandError::Vision(VisionError::InferenceFailed(_)) => RecoveryStrategy::Ignore,
            StagehandError::Config(_) => RecoveryStrategy::Fatal,
            StagehandError::Fatal(_) | StagehandError::ShutdownRequested => {
                RecoveryStrategy::Fatal
            }
            _ => RecoveryStrategy::Ignore,
        }
    }
}
