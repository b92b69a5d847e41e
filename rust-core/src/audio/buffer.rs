//! Lock-free ring buffer for interleaved audio frames
//!
//! Single-producer single-consumer queue between the audio callback thread
//! and the measurement loop. Only whole frames are ever pushed or popped, so
//! channel alignment survives overflow.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Audio ring buffer before it is split
pub struct AudioRingBuffer {
    producer: HeapProducer<f32>,
    consumer: HeapConsumer<f32>,
    channels: usize,
}

impl AudioRingBuffer {
    /// Create new ring buffer
    ///
    /// # Arguments
    /// * `capacity_frames` - Buffer capacity in frames
    /// * `channels` - Samples per interleaved frame
    pub fn new(capacity_frames: usize, channels: usize) -> Self {
        let channels = channels.max(1);
        let rb = HeapRb::<f32>::new(capacity_frames.max(1) * channels);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            channels,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
                channels: self.channels,
            },
            AudioConsumer {
                consumer: self.consumer,
                channels: self.channels,
            },
        )
    }
}

/// Producer end, owned by the audio callback
pub struct AudioProducer {
    producer: HeapProducer<f32>,
    channels: usize,
}

impl AudioProducer {
    /// Write as many whole frames as fit
    ///
    /// # Returns
    /// Number of frames written; the rest are dropped
    pub fn write_frames(&mut self, samples: &[f32]) -> usize {
        let frames = (samples.len() / self.channels).min(self.free_frames());
        self.producer.push_slice(&samples[..frames * self.channels]) / self.channels
    }

    /// Number of frames that still fit
    pub fn free_frames(&self) -> usize {
        self.producer.free_len() / self.channels
    }
}

/// Consumer end, owned by the measurement loop
pub struct AudioConsumer {
    consumer: HeapConsumer<f32>,
    channels: usize,
}

impl AudioConsumer {
    /// Read whole frames into `buffer`
    ///
    /// # Returns
    /// Number of samples (not frames) read, always a multiple of the channel count
    pub fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
        let frames = (buffer.len() / self.channels).min(self.available_frames());
        self.consumer.pop_slice(&mut buffer[..frames * self.channels])
    }

    /// Number of whole frames waiting
    pub fn available_frames(&self) -> usize {
        self.consumer.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
