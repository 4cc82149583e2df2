use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, cross-thread metrics for the three pipelines (script-pointer,
/// tracking, lamp-control) plus the bus client. One instance lives per
/// worker process and is cloned into each task.
#[derive(Clone)]
pub struct StageMetrics {
    // Script-Pointer Pipeline (C1-C4)
    pub capture_buffer_fill: Arc<AtomicUsize>, // ring buffer fill %
    pub capture_overflow_count: Arc<AtomicU64>,
    pub capture_fps: Arc<AtomicU64>, // chunks/sec * 10
    pub matches_attempted: Arc<AtomicU64>,
    pub matches_succeeded: Arc<AtomicU64>,
    pub global_rescans: Arc<AtomicU64>,
    pub last_match_score: Arc<AtomicU64>, // 0-100
    pub failed_attempt_streak: Arc<AtomicU64>,

    // Tracking Pipeline (C5-C8)
    pub camera_fps: Arc<AtomicU64>, // frames/sec * 10
    pub detections_count: Arc<AtomicU64>,
    pub identities_certain: Arc<AtomicUsize>,
    pub identities_uncertain: Arc<AtomicUsize>,
    pub tracking_errors: Arc<AtomicU64>,

    // Lamp Control Loop (C9/C13)
    pub dmx_frames_sent: Arc<AtomicU64>,
    pub lamp_stale_count: Arc<AtomicU64>,
    pub last_pan_dmx: Arc<AtomicU64>,
    pub last_tilt_dmx: Arc<AtomicU64>,

    // Bus client (C11)
    pub bus_reconnects: Arc<AtomicU64>,
    pub bus_publish_failures: Arc<AtomicU64>,

    // Pipeline stage activity indicators (for a liveness dashboard)
    pub stage_audio: Arc<AtomicBool>,
    pub stage_matcher: Arc<AtomicBool>,
    pub stage_camera: Arc<AtomicBool>,
    pub stage_lamp: Arc<AtomicBool>,

    pub last_pointer_time: Arc<RwLock<Option<Instant>>>,
    pub last_detection_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self {
            capture_buffer_fill: Arc::new(AtomicUsize::new(0)),
            capture_overflow_count: Arc::new(AtomicU64::new(0)),
            capture_fps: Arc::new(AtomicU64::new(0)),
            matches_attempted: Arc::new(AtomicU64::new(0)),
            matches_succeeded: Arc::new(AtomicU64::new(0)),
            global_rescans: Arc::new(AtomicU64::new(0)),
            last_match_score: Arc::new(AtomicU64::new(0)),
            failed_attempt_streak: Arc::new(AtomicU64::new(0)),

            camera_fps: Arc::new(AtomicU64::new(0)),
            detections_count: Arc::new(AtomicU64::new(0)),
            identities_certain: Arc::new(AtomicUsize::new(0)),
            identities_uncertain: Arc::new(AtomicUsize::new(0)),
            tracking_errors: Arc::new(AtomicU64::new(0)),

            dmx_frames_sent: Arc::new(AtomicU64::new(0)),
            lamp_stale_count: Arc::new(AtomicU64::new(0)),
            last_pan_dmx: Arc::new(AtomicU64::new(0)),
            last_tilt_dmx: Arc::new(AtomicU64::new(0)),

            bus_reconnects: Arc::new(AtomicU64::new(0)),
            bus_publish_failures: Arc::new(AtomicU64::new(0)),

            stage_audio: Arc::new(AtomicBool::new(false)),
            stage_matcher: Arc::new(AtomicBool::new(false)),
            stage_camera: Arc::new(AtomicBool::new(false)),
            stage_lamp: Arc::new(AtomicBool::new(false)),

            last_pointer_time: Arc::new(RwLock::new(None)),
            last_detection_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl StageMetrics {
    pub fn mark_stage_active(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Audio => self.stage_audio.store(true, Ordering::Relaxed),
            PipelineStage::Matcher => self.stage_matcher.store(true, Ordering::Relaxed),
            PipelineStage::Camera => self.stage_camera.store(true, Ordering::Relaxed),
            PipelineStage::Lamp => self.stage_lamp.store(true, Ordering::Relaxed),
        }
    }

    pub fn decay_stages(&self) {
        self.stage_audio.store(false, Ordering::Relaxed);
        self.stage_matcher.store(false, Ordering::Relaxed);
        self.stage_camera.store(false, Ordering::Relaxed);
        self.stage_lamp.store(false, Ordering::Relaxed);
    }

    pub fn record_match_attempt(&self, score: u8, succeeded: bool) {
        self.matches_attempted.fetch_add(1, Ordering::Relaxed);
        self.last_match_score.store(score as u64, Ordering::Relaxed);
        if succeeded {
            self.matches_succeeded.fetch_add(1, Ordering::Relaxed);
            self.failed_attempt_streak.store(0, Ordering::Relaxed);
            *self.last_pointer_time.write() = Some(Instant::now());
        } else {
            self.failed_attempt_streak.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_global_rescan(&self) {
        self.global_rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self, certain: usize, uncertain: usize) {
        self.detections_count.fetch_add(1, Ordering::Relaxed);
        self.identities_certain.store(certain, Ordering::Relaxed);
        self.identities_uncertain.store(uncertain, Ordering::Relaxed);
        *self.last_detection_time.write() = Some(Instant::now());
    }

    pub fn record_dmx_frame(&self, pan_dmx: u8, tilt_dmx: u8) {
        self.dmx_frames_sent.fetch_add(1, Ordering::Relaxed);
        self.last_pan_dmx.store(pan_dmx as u64, Ordering::Relaxed);
        self.last_tilt_dmx.store(tilt_dmx as u64, Ordering::Relaxed);
    }

    pub fn record_lamp_stale(&self) {
        self.lamp_stale_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_reconnect(&self) {
        self.bus_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_publish_failure(&self) {
        self.bus_publish_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineStage {
    Audio,
    Matcher,
    Camera,
    Lamp,
}

/// Rolling frames/events-per-second tracker, ticked once per event.
#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_attempt_updates_streak_and_success_counts() {
        let metrics = StageMetrics::default();
        metrics.record_match_attempt(40, false);
        metrics.record_match_attempt(35, false);
        assert_eq!(metrics.failed_attempt_streak.load(Ordering::Relaxed), 2);

        metrics.record_match_attempt(75, true);
        assert_eq!(metrics.failed_attempt_streak.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.matches_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.matches_attempted.load(Ordering::Relaxed), 3);
        assert!(metrics.last_pointer_time.read().is_some());
    }

    #[test]
    fn detection_recording_stores_identity_counts() {
        let metrics = StageMetrics::default();
        metrics.record_detection(3, 1);
        assert_eq!(metrics.identities_certain.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.identities_uncertain.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn fps_tracker_reports_none_before_one_second_elapses() {
        let mut tracker = FpsTracker::new();
        assert!(tracker.tick().is_none());
    }
}
