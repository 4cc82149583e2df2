use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use stagehand_foundation::AudioError;
use stagehand_telemetry::StageMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::block_buffer::{BlockRingBuffer, BLOCK_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::device::DeviceManager;
use crate::ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};

/// C1's single reconnection attempt on a hard close: wait this long, then
/// retry once before giving up fatally.
const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Sample-level ring capacity handed to `AudioRingBuffer`: a few blocks of
/// headroom so the capture thread's callback never has to wait on the
/// assembler thread under normal scheduling jitter.
const SAMPLE_RING_CAPACITY: usize = BLOCK_SIZE_SAMPLES * 8;

/// Owns the `cpal` input stream and the block assembler thread that drains
/// it into a [`BlockRingBuffer`]. Exposes the `start()` / `stop()` /
/// `snapshot()` contract described for the ring audio buffer (C1).
pub struct AudioCapture {
    device_manager: DeviceManager,
    blocks: BlockRingBuffer,
    metrics: StageMetrics,
    stream: Option<Stream>,
    assembler: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl AudioCapture {
    pub fn new(metrics: StageMetrics) -> Self {
        Self {
            device_manager: DeviceManager::new(),
            blocks: BlockRingBuffer::with_default_window(),
            metrics,
            stream: None,
            assembler: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens `device_name` (or the host default) and starts capturing.
    /// Device-open failure is fatal, per C1's error policy. A hard close of
    /// an already-open stream triggers exactly one reconnect attempt after
    /// [`RECONNECT_BACKOFF`]; if that also fails, the error propagates as
    /// fatal.
    pub fn start(&mut self, device_name: Option<&str>) -> Result<(), AudioError> {
        match self.try_open(device_name) {
            Ok(()) => Ok(()),
            Err(first_err) => {
                tracing::warn!(
                    error = %first_err,
                    "audio device open failed, retrying once after backoff"
                );
                thread::sleep(RECONNECT_BACKOFF);
                self.try_open(device_name).map_err(|retry_err| {
                    tracing::error!(error = %retry_err, "audio device reconnect failed, giving up");
                    retry_err
                })
            }
        }
    }

    fn try_open(&mut self, device_name: Option<&str>) -> Result<(), AudioError> {
        let device = self.device_manager.open_input(device_name)?;
        let config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(SAMPLE_RATE_HZ),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = AudioRingBuffer::new(SAMPLE_RING_CAPACITY);
        let (producer, consumer) = ring.split();

        let running = Arc::new(AtomicBool::new(true));
        let stream = self
            .build_stream(&device, &config, producer)
            .map_err(|e| AudioError::Fatal(format!("failed to build input stream: {e}")))?;
        stream
            .play()
            .map_err(|e| AudioError::Fatal(format!("failed to start input stream: {e}")))?;

        self.assembler = Some(self.spawn_assembler(consumer, Arc::clone(&running)));
        self.running = running;
        self.stream = Some(stream);
        Ok(())
    }

    fn build_stream(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
        mut producer: AudioProducer,
    ) -> Result<Stream, cpal::BuildStreamError> {
        let err_fn = |err| tracing::warn!(error = %err, "audio input stream error");

        device.build_input_stream(
            config,
            move |data: &[i16], _| {
                if producer.write(data).is_err() {
                    tracing::warn!(
                        samples = data.len(),
                        "sample ring full, audio callback dropped a write"
                    );
                }
            },
            err_fn,
            None,
        )
    }

    /// Drains the sample ring into fixed-size blocks on a dedicated thread,
    /// matching the "dedicated capture task that wakes per block" contract.
    fn spawn_assembler(
        &self,
        mut consumer: AudioConsumer,
        running: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        let blocks = self.blocks.clone();
        let metrics = self.metrics.clone();

        thread::Builder::new()
            .name("stagehand-audio-assembler".into())
            .spawn(move || {
                let mut scratch = vec![0i16; BLOCK_SIZE_SAMPLES];
                while running.load(Ordering::Relaxed) {
                    let read = consumer.read(&mut scratch);
                    if read == BLOCK_SIZE_SAMPLES {
                        blocks.push_block(scratch.clone());
                        metrics
                            .capture_buffer_fill
                            .store(blocks.block_count() * 100 / crate::block_buffer::WINDOW_BLOCKS, Ordering::Relaxed);
                        metrics.mark_stage_active(stagehand_telemetry::PipelineStage::Audio);
                    } else {
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            })
            .expect("failed to spawn audio assembler thread")
    }

    /// Returns a contiguous copy of the newest ~10s of audio.
    pub fn snapshot(&self) -> Vec<i16> {
        self.blocks.snapshot()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        if let Some(handle) = self.assembler.take() {
            let _ = handle.join();
        }
        self.blocks.clear();
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Returns true for the sample formats `cpal` will actually hand us on
/// typical Linux ALSA/PipeWire backends; anything else is a
/// `FormatNotSupported` at the call site.
pub fn is_supported_sample_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::I16 | SampleFormat::F32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_formats_match_expected_set() {
        assert!(is_supported_sample_format(SampleFormat::I16));
        assert!(is_supported_sample_format(SampleFormat::F32));
        assert!(!is_supported_sample_format(SampleFormat::U16));
    }
}
