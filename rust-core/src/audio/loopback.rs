//! Simulated sound card for tests
//!
//! The output stream records which tone is playing; the input stream
//! synthesizes the two channels a voltage divider would produce for a
//! simulated DUT: `V_in / V_out = 1 + R_ref / Z(f)`.

use super::driver::{AudioError, InputDriver, InputStream, OutputDriver, OutputStream};
use super::generator::SineWave;
use crate::complex::{ComplexExt, ComplexNumber};
use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

pub(crate) struct LoopbackState {
    pub sample_rate: u32,
    pub channels: usize,
    /// Frames handed out per tick
    pub frames_per_read: usize,
    pub reference_resistance: f64,
    /// DUT impedance as a function of frequency
    pub dut: Box<dyn Fn(f64) -> ComplexNumber>,
    /// Playing tone, set while an output stream is open
    pub playing: Option<f64>,
    pub volume: f32,
    pub output_open: bool,
    pub input_open: bool,
    pub fail_output: bool,
    /// Frequencies of every opened output stream, in order
    pub generated: Vec<f64>,
    clock: u64,
}

#[derive(Clone)]
pub(crate) struct LoopbackDriver {
    pub state: Rc<RefCell<LoopbackState>>,
}

impl LoopbackDriver {
    pub fn new(dut: impl Fn(f64) -> ComplexNumber + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopbackState {
                sample_rate: 48000,
                channels: 2,
                frames_per_read: 480,
                reference_resistance: 100.0,
                dut: Box::new(dut),
                playing: None,
                volume: 1.0,
                output_open: false,
                input_open: false,
                fail_output: false,
                generated: Vec::new(),
                clock: 0,
            })),
        }
    }

    /// Resistor DUT
    pub fn resistor(ohms: f64) -> Self {
        Self::new(move |_| ComplexNumber::new(ohms, 0.0))
    }
}

pub(crate) struct LoopbackInput {
    state: Rc<RefCell<LoopbackState>>,
}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        self.state.borrow_mut().input_open = false;
    }
}

impl InputStream for LoopbackInput {
    fn channel_count(&self) -> usize {
        self.state.borrow().channels
    }

    fn sample_rate(&self) -> u32 {
        self.state.borrow().sample_rate
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
        let mut state = self.state.borrow_mut();
        let channels = state.channels;
        let frames = state.frames_per_read.min(buffer.len() / channels);

        let (ratio, omega) = match state.playing {
            Some(frequency) => {
                let z = (state.dut)(frequency);
                (
                    ComplexNumber::new(1.0, 0.0) + state.reference_resistance / z,
                    2.0 * PI * frequency / state.sample_rate as f64,
                )
            }
            None => (ComplexNumber::new(0.0, 0.0), 0.0),
        };
        let amplitude = 0.25 * state.volume as f64 * state.playing.map_or(0.0, |_| 1.0);

        for frame in buffer[..frames * channels].chunks_exact_mut(channels) {
            let phase = omega * state.clock as f64;
            frame.fill(0.0);
            frame[0] = (amplitude * ratio.magnitude() * (phase + ratio.angle()).sin()) as f32;
            if channels > 1 {
                frame[1] = (amplitude * phase.sin()) as f32;
            }
            state.clock += 1;
        }

        frames * channels
    }
}

impl InputDriver for LoopbackDriver {
    type Stream = LoopbackInput;

    fn open_input_stream(&mut self, _device_index: usize, _sample_rate: u32) -> Result<LoopbackInput, AudioError> {
        self.state.borrow_mut().input_open = true;
        Ok(LoopbackInput {
            state: Rc::clone(&self.state),
        })
    }

    fn input_channel_count(&self, _device_index: usize, _sample_rate: u32) -> Result<usize, AudioError> {
        Ok(self.state.borrow().channels)
    }
}

pub(crate) struct LoopbackOutput {
    state: Rc<RefCell<LoopbackState>>,
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.playing = None;
        state.output_open = false;
    }
}

impl OutputStream for LoopbackOutput {
    fn set_volume(&mut self, volume: f32) {
        self.state.borrow_mut().volume = volume;
    }
}

impl OutputDriver for LoopbackDriver {
    type Stream = LoopbackOutput;

    fn open_output_stream(
        &mut self,
        device_index: usize,
        wave: SineWave,
        volume: f32,
    ) -> Result<LoopbackOutput, AudioError> {
        let mut state = self.state.borrow_mut();
        if state.fail_output {
            return Err(AudioError::NoDevice(device_index));
        }

        state.playing = Some(wave.frequency());
        state.volume = volume;
        state.output_open = true;
        state.generated.push(wave.frequency());
        Ok(LoopbackOutput {
            state: Rc::clone(&self.state),
        })
    }
}
