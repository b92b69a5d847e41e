//! Audio device bridges
//!
//! The capture side feeds a lock-free queue from the device callback and is
//! drained into the [`SampleCollector`] by the measurement loop. The playback
//! side synthesizes a sine in the device callback.

pub mod buffer;
pub mod collector;
pub mod driver;
pub mod generator;
pub mod listener;

#[cfg(feature = "device-io")]
pub mod input;
#[cfg(feature = "device-io")]
pub mod output;
#[cfg(feature = "device-io")]
pub mod processor;

#[cfg(test)]
pub(crate) mod loopback;

pub use buffer::AudioRingBuffer;
pub use collector::{SampleCollector, SampleWindows, DEFAULT_COLLECTOR_CAPACITY};
pub use driver::{AudioError, InputDriver, InputStream, OutputDriver, OutputStream};
pub use generator::{OutputDeviceGenerator, SineWave};
pub use listener::InputDeviceListener;

#[cfg(feature = "device-io")]
pub use input::CpalDriver;
#[cfg(feature = "device-io")]
pub use processor::{MeterCommand, MeterProcessor};
