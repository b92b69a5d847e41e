//! Per-channel sample collector
//!
//! De-interleaves the input and reference channels into two fixed arrays and
//! hands out windows of whole signal intervals. When a chunk would overflow
//! the arrays, writing restarts at index 0 instead of wrapping, so a window
//! never straddles the end. A successful extraction releases everything
//! collected so far; the next window is built from fresh frames only.

use crate::settings::ChannelOffsets;

/// Default history depth in frames
pub const DEFAULT_COLLECTOR_CAPACITY: usize = 4096;

/// Input and reference windows covering the same frames
#[derive(Debug, Clone, Copy)]
pub struct SampleWindows<'a> {
    pub input: &'a [f32],
    pub output: &'a [f32],
}

#[derive(Debug, Clone)]
pub struct SampleCollector {
    input: Vec<f32>,
    output: Vec<f32>,
    filled: usize,
    offsets: ChannelOffsets,
}

impl SampleCollector {
    pub fn new(capacity: usize, offsets: ChannelOffsets) -> Self {
        let capacity = capacity.max(1);
        Self {
            input: vec![0.0; capacity],
            output: vec![0.0; capacity],
            filled: 0,
            offsets,
        }
    }

    pub fn capacity(&self) -> usize {
        self.input.len()
    }

    /// Frames collected since the last release
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn offsets(&self) -> ChannelOffsets {
        self.offsets
    }

    pub fn set_offsets(&mut self, offsets: ChannelOffsets) {
        self.offsets = offsets;
    }

    /// `ceil(sample_rate / frequency)`, or 0 for a non-positive frequency
    pub fn samples_per_interval(frequency: f64, sample_rate: f64) -> usize {
        if !(frequency > 0.0) || !(sample_rate > 0.0) {
            return 0;
        }
        (sample_rate / frequency).ceil() as usize
    }

    /// Frames needed for `intervals_count` whole periods of `frequency`
    pub fn window_len(frequency: f64, sample_rate: f64, intervals_count: usize) -> usize {
        Self::samples_per_interval(frequency, sample_rate).saturating_mul(intervals_count)
    }

    /// Append a chunk of interleaved frames
    ///
    /// A chunk larger than the capacity keeps only its newest frames.
    pub fn append_interleaved(&mut self, samples: &[f32], channel_count: usize) {
        if channel_count == 0 {
            return;
        }

        let capacity = self.capacity();
        let mut frame_count = samples.len() / channel_count;
        if frame_count == 0 {
            return;
        }

        let mut samples = samples;
        if frame_count > capacity {
            samples = &samples[(frame_count - capacity) * channel_count..];
            frame_count = capacity;
        }

        if self.filled + frame_count > capacity {
            self.filled = 0;
        }

        let start = self.filled;
        for (i, frame) in samples.chunks_exact(channel_count).take(frame_count).enumerate() {
            self.input[start + i] = frame[self.offsets.input];
            self.output[start + i] = frame[self.offsets.output];
        }

        self.filled += frame_count;
    }

    /// Hand out `intervals_count` intervals of both channels and release them
    ///
    /// Returns `None` until enough frames have been collected; the caller is
    /// expected to retry on a later tick.
    pub fn try_get_and_release(
        &mut self,
        frequency: f64,
        sample_rate: f64,
        intervals_count: usize,
    ) -> Option<SampleWindows<'_>> {
        let total = Self::window_len(frequency, sample_rate, intervals_count);
        if total == 0 || total > self.capacity() || self.filled < total {
            return None;
        }

        self.filled = 0;

        Some(SampleWindows {
            input: &self.input[..total],
            output: &self.output[..total],
        })
    }

    /// Forget everything collected so far
    pub fn reset(&mut self) {
        self.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSETS: ChannelOffsets = ChannelOffsets { input: 0, output: 1 };

    /// Stereo frames where the input channel counts up and the output counts down
    fn frames(start: usize, count: usize) -> Vec<f32> {
        (start..start + count)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect()
    }

    #[test]
    fn test_window_len() {
        assert_eq!(SampleCollector::samples_per_interval(1000.0, 48000.0), 48);
        assert_eq!(SampleCollector::samples_per_interval(700.0, 48000.0), 69);
        assert_eq!(SampleCollector::window_len(1000.0, 48000.0, 3), 144);
        assert_eq!(SampleCollector::window_len(0.0, 48000.0, 3), 0);
    }

    #[test]
    fn test_backpressure() {
        let mut collector = SampleCollector::new(DEFAULT_COLLECTOR_CAPACITY, OFFSETS);
        let total = SampleCollector::window_len(1000.0, 48000.0, 3);

        collector.append_interleaved(&frames(0, total - 1), 2);
        assert!(collector.try_get_and_release(1000.0, 48000.0, 3).is_none());

        collector.append_interleaved(&frames(total - 1, 1), 2);
        let windows = collector.try_get_and_release(1000.0, 48000.0, 3).unwrap();
        assert_eq!(windows.input.len(), total);
        assert_eq!(windows.output.len(), total);

        assert!(collector.try_get_and_release(1000.0, 48000.0, 3).is_none());
        assert_eq!(collector.filled(), 0);
    }

    #[test]
    fn test_channels_share_frame_indices() {
        let mut collector = SampleCollector::new(64, OFFSETS);
        collector.append_interleaved(&frames(10, 48), 2);

        let windows = collector.try_get_and_release(1000.0, 48000.0, 1).unwrap();
        for (i, (a, b)) in windows.input.iter().zip(windows.output).enumerate() {
            assert_eq!(*a, (10 + i) as f32);
            assert_eq!(*b, -((10 + i) as f32));
        }
    }

    #[test]
    fn test_swapped_offsets() {
        let mut collector = SampleCollector::new(64, ChannelOffsets { input: 1, output: 0 });
        collector.append_interleaved(&frames(1, 48), 2);

        let windows = collector.try_get_and_release(1000.0, 48000.0, 1).unwrap();
        assert_eq!(windows.input[0], -1.0);
        assert_eq!(windows.output[0], 1.0);
    }

    #[test]
    fn test_overflow_restarts_at_zero() {
        let mut collector = SampleCollector::new(100, OFFSETS);

        collector.append_interleaved(&frames(0, 60), 2);
        collector.append_interleaved(&frames(60, 60), 2);

        // Second chunk did not fit, so it was written from index 0
        assert_eq!(collector.filled(), 60);
        let windows = collector.try_get_and_release(1000.0, 48000.0, 1).unwrap();
        assert_eq!(windows.input[0], 60.0);
    }

    #[test]
    fn test_oversized_chunk_keeps_newest_frames() {
        let mut collector = SampleCollector::new(48, OFFSETS);
        collector.append_interleaved(&frames(0, 100), 2);

        assert_eq!(collector.filled(), 48);
        let windows = collector.try_get_and_release(1000.0, 48000.0, 1).unwrap();
        assert_eq!(windows.input[0], 52.0);
    }

    #[test]
    fn test_multichannel_frames() {
        let mut collector = SampleCollector::new(64, ChannelOffsets { input: 2, output: 3 });
        let samples: Vec<f32> = (0..48).flat_map(|i| [0.0, 0.0, i as f32, 1.0]).collect();
        collector.append_interleaved(&samples, 4);

        let windows = collector.try_get_and_release(1000.0, 48000.0, 1).unwrap();
        assert_eq!(windows.input[47], 47.0);
        assert!(windows.output.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_window_larger_than_capacity_is_never_ready() {
        let mut collector = SampleCollector::new(100, OFFSETS);
        collector.append_interleaved(&frames(0, 100), 2);

        assert!(collector.try_get_and_release(100.0, 48000.0, 3).is_none());
    }

    #[test]
    fn test_reset() {
        let mut collector = SampleCollector::new(64, OFFSETS);
        collector.append_interleaved(&frames(0, 48), 2);
        collector.reset();

        assert!(collector.try_get_and_release(1000.0, 48000.0, 1).is_none());
    }
}
