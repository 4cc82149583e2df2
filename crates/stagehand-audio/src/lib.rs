pub mod block_buffer;
pub mod capture;
pub mod device;
pub mod ring_buffer;

pub use block_buffer::{BlockRingBuffer, BLOCK_SIZE_SAMPLES, SAMPLE_RATE_HZ, WINDOW_BLOCKS};
pub use capture::AudioCapture;
pub use device::DeviceManager;
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
