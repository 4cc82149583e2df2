use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Sample rate the script pipeline's ring always runs at (44.1 kHz, mono).
pub const SAMPLE_RATE_HZ: u32 = 44_100;
/// Fixed block size a `cpal` callback is chunked into before entering the
/// bounded block FIFO.
pub const BLOCK_SIZE_SAMPLES: usize = 2048;
/// Number of blocks kept so the FIFO holds roughly the newest 10 seconds.
/// `215 * 2048 / 44100 ≈ 9.98s`, matching the "best recent 10s" contract
/// without overshooting it.
pub const WINDOW_BLOCKS: usize = 215;

/// The bounded FIFO of `AudioFrame` blocks described by the ring buffer
/// component: a dedicated capture task wakes per block, pushes it here, and
/// `snapshot()` returns the newest blocks concatenated in playback order.
///
/// Overrun policy: when full, the oldest block is dropped and a warning is
/// logged. The contract is "best recent 10s", not "lossless" — this is not
/// the same thing as the lock-free [`crate::ring_buffer::AudioRingBuffer`]
/// underneath it, which never drops silently; it rejects writes and lets
/// this type decide what "drop the oldest" means at block granularity.
pub struct BlockRingBuffer {
    inner: Arc<Mutex<VecDeque<Vec<i16>>>>,
    capacity_blocks: usize,
}

impl BlockRingBuffer {
    pub fn new(capacity_blocks: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity_blocks))),
            capacity_blocks,
        }
    }

    pub fn with_default_window() -> Self {
        Self::new(WINDOW_BLOCKS)
    }

    /// Pushes a newly captured block, dropping the oldest one if the FIFO
    /// is already full.
    pub fn push_block(&self, block: Vec<i16>) {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity_blocks {
            guard.pop_front();
            tracing::warn!(
                capacity_blocks = self.capacity_blocks,
                "audio ring overrun, dropped oldest block"
            );
        }
        guard.push_back(block);
    }

    /// Returns a contiguous copy of the newest blocks in playback order.
    pub fn snapshot(&self) -> Vec<i16> {
        let guard = self.inner.lock();
        let total: usize = guard.iter().map(|b| b.len()).sum();
        let mut out = Vec::with_capacity(total);
        for block in guard.iter() {
            out.extend_from_slice(block);
        }
        out
    }

    pub fn block_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Clone for BlockRingBuffer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity_blocks: self.capacity_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_concatenates_blocks_in_order() {
        let buf = BlockRingBuffer::new(3);
        buf.push_block(vec![1, 2]);
        buf.push_block(vec![3, 4]);
        assert_eq!(buf.snapshot(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn overrun_drops_oldest_block() {
        let buf = BlockRingBuffer::new(2);
        buf.push_block(vec![1, 2]);
        buf.push_block(vec![3, 4]);
        buf.push_block(vec![5, 6]);

        assert_eq!(buf.block_count(), 2);
        assert_eq!(buf.snapshot(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn default_window_holds_roughly_ten_seconds() {
        let seconds = (WINDOW_BLOCKS * BLOCK_SIZE_SAMPLES) as f64 / SAMPLE_RATE_HZ as f64;
        assert!((9.5..=10.0).contains(&seconds));
    }
}
