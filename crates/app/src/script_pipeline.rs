use std::sync::Arc;
use std::time::Duration;

use stagehand_audio::capture::AudioCapture;
use stagehand_bus::{BusClient, TRACKER_POSITION};
use stagehand_foundation::{ShutdownHandler, StagehandError};
use stagehand_script::asr::AsrEngine;
use stagehand_script::matcher::WindowedMatcher;
use stagehand_telemetry::{PipelineStage, StageMetrics};
use tokio::time::{interval, MissedTickBehavior};

/// One snapshot period; matches the ring buffer's target window so each
/// iteration sees roughly the audio captured since the previous one.
pub const SNAPSHOT_PERIOD: Duration = Duration::from_secs(1);

/// C4: per iteration, snapshot C1, run ASR, concatenate segment texts,
/// search C3, publish the resulting pointer with `retain = true`.
///
/// Deliberately a plain sequential loop rather than a queue: if ASR takes
/// longer than `SNAPSHOT_PERIOD`, `MissedTickBehavior::Skip` drops the
/// missed ticks instead of bursting through a backlog, matching "no
/// internal buffering of ASR jobs".
pub async fn run_script_pointer_pipeline(
    capture: Arc<AudioCapture>,
    mut asr: Box<dyn AsrEngine>,
    matcher: Arc<WindowedMatcher>,
    bus: Arc<BusClient>,
    metrics: StageMetrics,
    shutdown: ShutdownHandler,
) -> Result<(), StagehandError> {
    let mut ticker = interval(SNAPSHOT_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("script-pointer pipeline: shutdown requested");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        metrics.mark_stage_active(PipelineStage::Audio);
        let pcm = capture.snapshot();
        if pcm.is_empty() {
            continue;
        }

        let segments = match asr.transcribe(&pcm).await {
            Ok(segments) => segments,
            Err(err) => {
                tracing::error!(error = %err, "ASR transcription failed, skipping iteration");
                continue;
            }
        };
        if segments.is_empty() {
            continue;
        }

        let input_line = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        metrics.mark_stage_active(PipelineStage::Matcher);
        if let Some(pointer) = matcher.search(&input_line) {
            let payload = match serde_json::to_vec(&pointer) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode pointer, skipping publish");
                    continue;
                }
            };

            if let Err(err) = bus.publish(TRACKER_POSITION, &payload, true).await {
                tracing::warn!(error = %err, "pointer publish failed, retained value stays authoritative");
                metrics.record_bus_publish_failure();
            }
        }
    }
}
