use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use stagehand_foundation::RealWorldPoint;
use stagehand_telemetry::StageMetrics;
use tokio::time::interval;

use crate::artnet::ArtNetEmitter;
use crate::geometry::{angle_to_dmx, compute_pan_tilt};
use crate::types::LampState;

pub const LAMP_TICK: Duration = Duration::from_millis(100);
const SHUTTER_OPEN: u8 = 25;
const DIMMER_FULL: u8 = 255;

/// Single-writer/single-reader cell the camera loop (C8) publishes into and
/// the lamp loop (C9) reads from. There is no queue: the lamp always
/// consumes whichever point is most recent, possibly stale.
pub type PointCell = Arc<RwLock<Option<RealWorldPoint>>>;

pub fn new_point_cell() -> PointCell {
    Arc::new(RwLock::new(None))
}

/// C9: on every 100 ms tick, reads the latest stage point and, if fresh
/// enough, converts it into pan/tilt/DMX and emits an Art-Net frame.
pub struct LampControlLoop {
    cell: PointCell,
    state: LampState,
    stage_height_m: f64,
    freshness_window: Duration,
    emitter: ArtNetEmitter,
    metrics: StageMetrics,
}

impl LampControlLoop {
    pub fn new(
        cell: PointCell,
        state: LampState,
        stage_height_m: f64,
        freshness_window: Duration,
        emitter: ArtNetEmitter,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            cell,
            state,
            stage_height_m,
            freshness_window,
            emitter,
            metrics,
        }
    }

    /// Runs the 100ms tick loop until `shutdown` resolves.
    pub async fn run(&mut self, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = interval(LAMP_TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(Instant::now()),
                _ = &mut shutdown => break,
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        let point = *self.cell.read();
        let Some(point) = point else {
            tracing::debug!("lamp loop: no point yet, holding last output");
            return;
        };

        if now.duration_since(point.observed_at) > self.freshness_window {
            tracing::debug!("lamp loop: point is stale, holding last output");
            self.metrics.record_lamp_stale();
            return;
        }

        let target = (point.x, self.stage_height_m - point.y, 0.0);
        let (pan_deg, tilt_deg) = compute_pan_tilt(target, self.state.origin);

        self.state.current_pan_deg = pan_deg;
        self.state.current_tilt_deg = tilt_deg;

        let pan_dmx = angle_to_dmx(pan_deg, self.state.max_pan_deg);
        let tilt_dmx = angle_to_dmx(tilt_deg + 90.0, self.state.max_tilt_deg);

        let _ = self.emitter.set_channel("pan", &[pan_dmx]);
        let _ = self.emitter.set_channel("tilt", &[tilt_dmx]);
        let _ = self.emitter.set_channel("shutter", &[SHUTTER_OPEN]);
        let _ = self.emitter.set_channel("dimmer", &[DIMMER_FULL]);

        self.metrics.record_dmx_frame(pan_dmx, tilt_dmx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelMap;

    async fn test_emitter() -> ArtNetEmitter {
        ArtNetEmitter::bind("127.0.0.1:6454".parse().unwrap(), 0, ChannelMap::defaults())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stale_point_does_not_update_state() {
        let cell = new_point_cell();
        *cell.write() = Some(RealWorldPoint {
            x: 1.0,
            y: 1.0,
            z: 0.0,
            observed_at: Instant::now() - Duration::from_secs(10),
        });

        let state = LampState::new(540.0, 270.0, (0.0, 0.0, 5.0));
        let mut loop_ = LampControlLoop::new(
            cell,
            state,
            2.0,
            Duration::from_millis(500),
            test_emitter().await,
            StageMetrics::default(),
        );

        loop_.tick(Instant::now());
        assert_eq!(loop_.state.current_pan_deg, 0.0);
    }

    #[tokio::test]
    async fn fresh_point_updates_pan_and_tilt() {
        let cell = new_point_cell();
        *cell.write() = Some(RealWorldPoint {
            x: 1.0,
            y: 1.0,
            z: 0.0,
            observed_at: Instant::now(),
        });

        let state = LampState::new(540.0, 270.0, (0.0, 0.0, 5.0));
        let mut loop_ = LampControlLoop::new(
            cell,
            state,
            2.0,
            Duration::from_millis(500),
            test_emitter().await,
            StageMetrics::default(),
        );

        loop_.tick(Instant::now());
        assert_ne!(loop_.state.current_pan_deg, 0.0);
    }
}
