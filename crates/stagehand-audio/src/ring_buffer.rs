use rtrb::RingBuffer;

/// Lock-free SPSC sample ring sitting directly under the `cpal` callback.
/// This is the real-time-safe half of C1: the callback thread only ever
/// calls `AudioProducer::write`, which never blocks or allocates.
pub struct AudioRingBuffer {
    producer: rtrb::Producer<i16>,
    consumer: rtrb::Consumer<i16>,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the `cpal` stream callback.
pub struct AudioProducer {
    producer: rtrb::Producer<i16>,
}

impl AudioProducer {
    /// Writes samples from the audio callback. Non-blocking; returns `Err`
    /// if the ring doesn't have room, in which case the caller is expected
    /// to count it as an overflow (C1's "drop oldest block and warn" policy
    /// happens one level up, at the block assembler).
    pub fn write(&mut self, samples: &[i16]) -> Result<usize, ()> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => return Err(()),
        };

        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&samples[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, drained by the block assembler task.
pub struct AudioConsumer {
    consumer: rtrb::Consumer<i16>,
}

impl AudioConsumer {
    /// Reads up to `buffer.len()` samples, returning however many were
    /// actually available (0 if the ring is empty).
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                self.consumer.read_chunk(available).unwrap()
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let rb = AudioRingBuffer::new(1024);
        let (mut producer, mut consumer) = rb.split();

        let samples = vec![1i16, 2, 3, 4, 5];
        assert_eq!(producer.write(&samples).unwrap(), 5);

        let mut buffer = vec![0i16; 10];
        let read = consumer.read(&mut buffer);
        assert_eq!(read, 5);
        assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn write_past_capacity_is_rejected() {
        let rb = AudioRingBuffer::new(16);
        let (mut producer, mut _consumer) = rb.split();

        assert!(producer.write(&vec![1i16; 20]).is_err());
        assert!(producer.write(&vec![1i16; 16]).is_ok());
        assert!(producer.write(&vec![2i16; 1]).is_err());
    }
}
