use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use stagehand_foundation::{RealWorldPoint, ShutdownHandler, StagehandError, VisionError};
use stagehand_lamp::{ArtNetEmitter, LampControlLoop, LampState, PointCell};
use stagehand_telemetry::{PipelineStage, StageMetrics};
use stagehand_vision::{CameraSource, DescriptorStore, Detector, FrameAdjustments, ReIdEncoder, StageMapper, TrackHistoryMap};

/// Five consecutive empty/failed frame reads end the camera loop: one bad
/// frame is noise, five in a row means the device is gone.
pub const MAX_CONSECUTIVE_EMPTY_READS: u32 = 5;

/// Minimum L2 distance for a Re-ID match to count as "this is the tracked
/// performer" rather than an unknown bystander.
const DEFAULT_MATCH_THRESHOLD: f32 = 12.0;

/// C8: pulls frames from the camera, adjusts them, detects and re-identifies
/// every track, folds scores into per-track consensus, and when the
/// consensus identity is the one being followed, maps its position onto the
/// stage plane and publishes it into the cell the lamp loop (C9) reads.
///
/// Runs on a blocking thread since the capture and inference traits are
/// synchronous; the lamp loop is a separate cooperative task in the same
/// worker, wired together by [`run_tracking_worker`].
pub fn run_camera_loop(
    mut camera: CameraSource,
    mut detector: Box<dyn Detector>,
    mut encoder: Box<dyn ReIdEncoder>,
    store: Arc<Mutex<DescriptorStore>>,
    mapper: Arc<StageMapper>,
    adjustments: FrameAdjustments,
    tracked_identity: Option<String>,
    point_cell: PointCell,
    metrics: StageMetrics,
    shutdown: ShutdownHandler,
) -> Result<(), StagehandError> {
    let mut history = TrackHistoryMap::new();
    let mut consecutive_empty = 0u32;

    while !shutdown.is_requested() {
        metrics.mark_stage_active(PipelineStage::Camera);

        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                consecutive_empty += 1;
                tracing::warn!(error = %err, consecutive_empty, "camera read failed");
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_READS {
                    tracing::error!("camera disconnected after {consecutive_empty} consecutive failed reads, stopping");
                    return Err(StagehandError::Vision(VisionError::CameraDisconnected));
                }
                continue;
            }
        };
        consecutive_empty = 0;

        let frame = stagehand_vision::process_frame(&frame, &adjustments);

        let detections = match detector.detect(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                tracing::warn!(error = %err, "detector failed on this frame, skipping");
                continue;
            }
        };

        let mut certain_count = 0usize;
        let mut uncertain_count = 0usize;

        for detection in &detections {
            let bbox = detection.bbox;
            if !bbox.is_within_frame(frame.width() as f64, frame.height() as f64) {
                continue;
            }

            let crop = image::imageops::crop_imm(
                &frame,
                bbox.x0 as u32,
                bbox.y0 as u32,
                bbox.width().max(1.0) as u32,
                bbox.height().max(1.0) as u32,
            )
            .to_image();

            let vector = match encoder.extract(&crop) {
                Ok(vector) => vector,
                Err(err) => {
                    tracing::warn!(error = %err, track_id = detection.track_id, "Re-ID extraction failed");
                    continue;
                }
            };

            let (identity, distance) = store.lock().match_descriptor(&vector, DEFAULT_MATCH_THRESHOLD);
            let Some(identity) = identity else {
                uncertain_count += 1;
                continue;
            };
            history.push(detection.track_id, identity, distance);

            let Some((consensus_identity, _pct, _score)) = history.consensus(detection.track_id) else {
                uncertain_count += 1;
                continue;
            };
            certain_count += 1;

            if tracked_identity.as_deref() != Some(consensus_identity.as_str()) {
                continue;
            }

            let (cx, cy) = bbox.center();
            let img_point = stagehand_vision::Point2 { x: cx, y: cy };
            if !mapper.point_in_quad(img_point) {
                continue;
            }
            let stage_point = mapper.transform(img_point);

            *point_cell.write() = Some(RealWorldPoint {
                x: stage_point.x,
                y: stage_point.y,
                z: 0.0,
                observed_at: Instant::now(),
            });
        }

        metrics.record_detection(certain_count, uncertain_count);
    }

    Ok(())
}

/// Wires the camera loop (on a blocking thread) and the lamp control loop
/// (C9, cooperative async task) together inside one worker process, sharing
/// the position cell between them per the spec's single-writer/single-reader
/// handoff.
pub async fn run_tracking_worker(
    camera: CameraSource,
    detector: Box<dyn Detector>,
    encoder: Box<dyn ReIdEncoder>,
    store: Arc<Mutex<DescriptorStore>>,
    mapper: Arc<StageMapper>,
    adjustments: FrameAdjustments,
    tracked_identity: Option<String>,
    lamp_state: LampState,
    stage_height_m: f64,
    lamp_freshness_window: Duration,
    emitter: ArtNetEmitter,
    metrics: StageMetrics,
    shutdown: ShutdownHandler,
) -> Result<(), StagehandError> {
    let point_cell = stagehand_lamp::new_point_cell();

    let camera_shutdown = shutdown.clone();
    let camera_cell = point_cell.clone();
    let camera_metrics = metrics.clone();
    let camera_task = tokio::task::spawn_blocking(move || {
        run_camera_loop(
            camera,
            detector,
            encoder,
            store,
            mapper,
            adjustments,
            tracked_identity,
            camera_cell,
            camera_metrics,
            camera_shutdown,
        )
    });

    let mut lamp_loop = LampControlLoop::new(
        point_cell,
        lamp_state,
        stage_height_m,
        lamp_freshness_window,
        emitter,
        metrics,
    );
    let lamp_shutdown = shutdown.clone();
    let lamp_task = tokio::spawn(async move {
        lamp_loop.run(lamp_shutdown.wait()).await;
    });

    let camera_result = camera_task.await?;
    shutdown.request();
    lamp_task.await?;

    camera_result
}
