//! Device I/O seams
//!
//! The meter never talks to a sound API directly; it opens streams through
//! these traits. Closing a stream is dropping it.

use super::generator::SineWave;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("No audio device with index {0}")]
    NoDevice(usize),

    #[error("Failed to enumerate devices: {0}")]
    DeviceList(String),

    #[error("Failed to query device configuration: {0}")]
    DeviceConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Device does not support {0} Hz with 32-bit float samples")]
    UnsupportedSampleRate(u32),

    #[error("Channel offsets ({input}, {output}) do not fit a {channels}-channel stream")]
    InvalidChannelOffsets {
        input: usize,
        output: usize,
        channels: usize,
    },
}

/// An open capture stream delivering interleaved frames
pub trait InputStream {
    fn channel_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Pop whole frames into `buffer`
    ///
    /// # Returns
    /// Number of samples written, a multiple of [`InputStream::channel_count`]
    fn read_frames(&mut self, buffer: &mut [f32]) -> usize;
}

/// Opens capture streams by device index
pub trait InputDriver {
    type Stream: InputStream;

    fn open_input_stream(&mut self, device_index: usize, sample_rate: u32) -> Result<Self::Stream, AudioError>;

    /// Channels of the stream [`InputDriver::open_input_stream`] would open
    /// at `sample_rate`
    fn input_channel_count(&self, device_index: usize, sample_rate: u32) -> Result<usize, AudioError>;
}

/// An open playback stream synthesizing its own samples
pub trait OutputStream {
    /// Linear gain in [0, 1]
    fn set_volume(&mut self, volume: f32);
}

/// Opens playback streams by device index
pub trait OutputDriver {
    type Stream: OutputStream;

    /// Open a stream that plays `wave` on every channel
    ///
    /// `volume` applies from the first buffer on.
    fn open_output_stream(
        &mut self,
        device_index: usize,
        wave: SineWave,
        volume: f32,
    ) -> Result<Self::Stream, AudioError>;
}
