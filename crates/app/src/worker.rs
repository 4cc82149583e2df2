use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use parking_lot::Mutex;
use stagehand_audio::AudioCapture;
use stagehand_bus::BusClient;
use stagehand_foundation::{ConfigError, ShutdownHandler, StagehandError};
use stagehand_lamp::{ArtNetEmitter, ChannelMap, LampState};
use stagehand_script::{AuditLog, NullAsrEngine, ScriptIndex, WindowedMatcher};
use stagehand_telemetry::StageMetrics;
use stagehand_vision::{DescriptorStore, Point2, StageMapper};

use crate::settings::Settings;
use crate::supervisor::{emit_status, spawn_stop_listener, WorkerKind, WorkerStatusMessage};

/// Re-exec entrypoint for a worker process: loads settings, builds the
/// requested pipeline, emits `Started`/`Failed` on stdout, then runs until
/// the supervisor signals stop (or the pipeline itself errors out), always
/// ending with a `Stopped` status line and a process exit code of 0 — only
/// a failure to even start leaves the process non-zero, since the
/// supervisor learns about runtime failures through the status channel, not
/// the exit code.
pub async fn run_worker(kind: WorkerKind, settings_path: std::path::PathBuf) -> i32 {
    let settings = match load_settings(&settings_path) {
        Ok(settings) => settings,
        Err(err) => {
            emit_status(&WorkerStatusMessage::Failed {
                reason: err.to_string(),
            });
            return 1;
        }
    };

    let shutdown = ShutdownHandler::new();
    spawn_stop_listener(shutdown.clone());

    let result = match kind {
        WorkerKind::ScriptPointer => run_script_pointer_worker(settings, shutdown).await,
        WorkerKind::Tracking => run_tracking_worker_entry(settings, shutdown).await,
    };

    match result {
        Ok(()) => {
            emit_status(&WorkerStatusMessage::Stopped);
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "worker exited with error");
            emit_status(&WorkerStatusMessage::Failed {
                reason: err.to_string(),
            });
            0
        }
    }
}

/// Loads the same layered configuration the supervisor validated at
/// startup: the file at `path` (if present) overlaid with
/// `STAGEHAND_`-prefixed environment variables. Re-loaded independently by
/// each worker so a restarted worker always starts from current settings
/// rather than a snapshot the supervisor took at its own startup.
fn load_settings(path: &std::path::Path) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path.to_path_buf()).required(false))
        .add_source(Environment::with_prefix("STAGEHAND").separator("__"));
    let config = builder.build()?;
    let mut settings: Settings = config.try_deserialize().unwrap_or_default();
    settings.validate()?;
    Ok(settings)
}

async fn run_script_pointer_worker(
    settings: Settings,
    shutdown: ShutdownHandler,
) -> Result<(), StagehandError> {
    let metrics = StageMetrics::default();

    let chunks = Arc::new(
        ScriptIndex::load(std::path::Path::new(&settings.script_path))
            .map(|index| index.chunks().to_vec())
            .map_err(StagehandError::Script)?,
    );
    let audit = AuditLog::new("logs/matcher_audit.csv").map_err(StagehandError::Script)?;
    let matcher = Arc::new(WindowedMatcher::new(chunks, audit, metrics.clone()));

    let mut capture = AudioCapture::new(metrics.clone());
    capture
        .start(settings.microphone.microphone_device.as_deref())
        .map_err(StagehandError::Audio)?;
    let capture = Arc::new(capture);

    let bus = Arc::new(BusClient::connect(
        &settings.mqtt_broker,
        settings.mqtt_port,
        &settings.mqtt_client_id,
        metrics.clone(),
    ));

    emit_status(&WorkerStatusMessage::Started);

    crate::script_pipeline::run_script_pointer_pipeline(
        capture,
        Box::new(NullAsrEngine),
        matcher,
        bus,
        metrics,
        shutdown,
    )
    .await
}

async fn run_tracking_worker_entry(
    settings: Settings,
    shutdown: ShutdownHandler,
) -> Result<(), StagehandError> {
    let metrics = StageMetrics::default();

    let camera = stagehand_vision::CameraSource::open(settings.camera.video_device_pos)
        .map_err(StagehandError::Vision)?;

    let src_points = settings.stage_zone.src_points.map(|p| Point2 { x: p[0], y: p[1] });
    let mapper = Arc::new(
        StageMapper::new(
            src_points,
            settings.stage_zone.homography_width,
            settings.stage_zone.homography_height,
        )
        .map_err(StagehandError::Vision)?,
    );

    let store_path = std::path::PathBuf::from(&settings.performer_tracker.user_folder);
    std::fs::create_dir_all(&store_path)?;
    let store = Arc::new(Mutex::new(DescriptorStore::empty(&store_path)));

    let adjustments = stagehand_vision::FrameAdjustments {
        mirror_x: settings.camera.mirror_x,
        mirror_y: settings.camera.mirror_y,
        resolution: settings.camera.resolution,
        rotation: rotation_from_u8(settings.camera.rotation),
        clahe: settings.camera.clahe,
        brightness: settings.camera.brightness,
        exposure: settings.camera.exposure,
        contrast: settings.camera.contrast,
        saturation: settings.camera.saturation,
    };

    let lamp_state = LampState::new(
        settings.performer_tracker.max_pan,
        settings.performer_tracker.max_tilt,
        settings.performer_tracker.light_coords,
    );

    let target = format!(
        "{}:{}",
        settings.performer_tracker.light_node_ip, settings.performer_tracker.light_node_port
    )
    .parse::<std::net::SocketAddr>()
    .map_err(|_| {
        StagehandError::Config(ConfigError::Validation {
            field: "performer_tracker.light_node_ip/port".to_string(),
            reason: "not a valid socket address".to_string(),
        })
    })?;
    let emitter = ArtNetEmitter::bind(
        target,
        settings.performer_tracker.light_universe_id,
        ChannelMap::defaults(),
    )
    .await
    .map_err(StagehandError::Lamp)?;

    emit_status(&WorkerStatusMessage::Started);

    crate::tracking_pipeline::run_tracking_worker(
        camera,
        Box::new(stagehand_vision::NoopDetector),
        Box::new(stagehand_vision::NoopReIdEncoder),
        store,
        mapper,
        adjustments,
        settings.performer_tracker.tracked_user_id,
        lamp_state,
        settings.stage_zone.homography_height,
        Duration::from_millis(500),
        emitter,
        metrics,
        shutdown,
    )
    .await
}

fn rotation_from_u8(value: u8) -> stagehand_vision::Rotation {
    match value {
        1 => stagehand_vision::Rotation::Clockwise90,
        2 => stagehand_vision::Rotation::Rotate180,
        3 => stagehand_vision::Rotation::CounterClockwise90,
        _ => stagehand_vision::Rotation::None,
    }
}
