//! Settle-then-average acquisition loop shared by every run
//!
//! One [`Acquisition`] covers a single frequency: it waits out the transient
//! time, measured from the first step after the streams opened, then pulls
//! one window per tick until the configured number of valid readings has
//! been averaged. NaN readings are retried until they persist
//! for longer than the retry timeout.

use super::MeasurementError;
use crate::audio::{InputDeviceListener, InputDriver, SampleWindows};
use crate::complex::{ComplexExt, ComplexNumber};
use crate::impedance::ImpedanceError;
use crate::settings::GeneralSettings;
use crate::spectrum::rms;
use std::time::Duration;
use tracing::debug;

/// Averages of one finished acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AcquisitionResult {
    pub value: ComplexNumber,
    pub input_rms: f64,
    pub output_rms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AcquisitionStep {
    /// Settling, waiting for samples, or retrying a NaN reading
    Pending,
    /// A reading was accepted; `iteration` readings are done so far
    Progressed { iteration: u32 },
    Finished(AcquisitionResult),
    Failed(MeasurementError),
}

#[derive(Debug, Clone)]
pub(crate) struct Acquisition {
    frequency: f64,
    intervals_count: usize,
    iterations: u32,
    retry_timeout: Duration,

    settle_remaining: Duration,
    settle_started: bool,
    settled: bool,
    nan_elapsed: Duration,

    completed: u32,
    value_sum: ComplexNumber,
    input_rms_sum: f64,
    output_rms_sum: f64,
}

impl Acquisition {
    pub fn new(frequency: f64, settings: &GeneralSettings) -> Self {
        Self {
            frequency,
            intervals_count: settings.signal_intervals_count as usize,
            iterations: settings.averaging_iterations.max(1),
            retry_timeout: settings.retry_timeout(),
            settle_remaining: settings.transient_time(),
            settle_started: false,
            settled: false,
            nan_elapsed: Duration::ZERO,
            completed: 0,
            value_sum: ComplexNumber::new(0.0, 0.0),
            input_rms_sum: 0.0,
            output_rms_sum: 0.0,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Advance by one tick of `dt`
    ///
    /// `compute` turns a window pair into the reading to average. An error
    /// or a NaN reading counts toward the retry timeout instead.
    pub fn step<I, F>(&mut self, dt: Duration, listener: &mut InputDeviceListener<I>, compute: F) -> AcquisitionStep
    where
        I: InputDriver,
        F: FnOnce(&SampleWindows<'_>) -> Result<ComplexNumber, ImpedanceError>,
    {
        if !self.settled {
            // The first dt includes time spent before the streams were open
            if self.settle_started {
                self.settle_remaining = self.settle_remaining.saturating_sub(dt);
            }
            self.settle_started = true;
            if self.settle_remaining.is_zero() {
                // Frames captured during the transient are never averaged
                self.settled = true;
                listener.discard_filled_samples();
            }
            return AcquisitionStep::Pending;
        }

        let Some(windows) = listener.try_get_and_release_filled_samples(self.frequency, self.intervals_count) else {
            return AcquisitionStep::Pending;
        };

        let reading = compute(&windows).and_then(|value| {
            if value.is_nan_value() {
                Err(ImpedanceError::NonFinite)
            } else {
                Ok(value)
            }
        });

        match reading {
            Ok(value) => {
                self.value_sum += value;
                self.input_rms_sum += rms(windows.input);
                self.output_rms_sum += rms(windows.output);
                self.completed += 1;
                self.nan_elapsed = Duration::ZERO;

                if self.completed >= self.iterations {
                    AcquisitionStep::Finished(self.average())
                } else {
                    AcquisitionStep::Progressed {
                        iteration: self.completed,
                    }
                }
            }
            Err(err) => {
                if self.nan_elapsed > self.retry_timeout {
                    return AcquisitionStep::Failed(MeasurementError::NanTimeout);
                }

                debug!(frequency = self.frequency, error = %err, "Discarding reading");
                self.nan_elapsed += dt;
                AcquisitionStep::Pending
            }
        }
    }

    fn average(&self) -> AcquisitionResult {
        let n = self.completed.max(1) as f64;
        AcquisitionResult {
            value: self.value_sum / n,
            input_rms: self.input_rms_sum / n,
            output_rms: self.output_rms_sum / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::loopback::LoopbackDriver;
    use crate::impedance::compute_impedance;

    const DT: Duration = Duration::from_millis(10);

    fn settings() -> GeneralSettings {
        GeneralSettings {
            transient_time_ms: 20.0,
            averaging_iterations: 3,
            retry_timeout_secs: 0.05,
            ..Default::default()
        }
    }

    fn listening(driver: LoopbackDriver, settings: &GeneralSettings) -> InputDeviceListener<LoopbackDriver> {
        let mut listener = InputDeviceListener::new(driver);
        listener
            .start_listening(0, settings.sample_rate, settings.channel_offsets())
            .unwrap();
        listener
    }

    #[test]
    fn test_settles_then_averages() {
        let settings = settings();
        let driver = LoopbackDriver::resistor(100.0);
        driver.state.borrow_mut().playing = Some(1000.0);
        let mut listener = listening(driver, &settings);
        let mut acquisition = Acquisition::new(1000.0, &settings);

        let mut steps = Vec::new();
        for _ in 0..10 {
            listener.poll();
            let step = acquisition.step(DT, &mut listener, |w| {
                compute_impedance(w.input, w.output, 100.0, 1000.0, 48000.0)
            });
            let finished = matches!(step, AcquisitionStep::Finished(_));
            steps.push(step);
            if finished {
                break;
            }
        }

        // Clock start, two settle ticks, then one reading per tick
        assert_eq!(steps[..3], [AcquisitionStep::Pending, AcquisitionStep::Pending, AcquisitionStep::Pending]);
        assert_eq!(steps[3], AcquisitionStep::Progressed { iteration: 1 });
        assert_eq!(steps[4], AcquisitionStep::Progressed { iteration: 2 });

        let AcquisitionStep::Finished(result) = &steps[5] else {
            panic!("expected a finished acquisition, got {:?}", steps[5]);
        };
        assert!((result.value.magnitude() - 100.0).abs() < 10.0);
        assert!(result.output_rms > 0.15 && result.output_rms < 0.2);
        assert!(result.input_rms > result.output_rms);
    }

    #[test]
    fn test_slow_stream_start_does_not_shorten_settling() {
        let settings = settings();
        let driver = LoopbackDriver::resistor(100.0);
        driver.state.borrow_mut().playing = Some(1000.0);
        let mut listener = listening(driver, &settings);
        let mut acquisition = Acquisition::new(1000.0, &settings);

        // Opening the streams took far longer than the 20 ms transient
        listener.poll();
        assert_eq!(
            acquisition.step(Duration::from_millis(500), &mut listener, |_| unreachable!()),
            AcquisitionStep::Pending
        );

        // The full transient still elapses after the streams are up
        for _ in 0..2 {
            listener.poll();
            assert_eq!(acquisition.step(DT, &mut listener, |_| unreachable!()), AcquisitionStep::Pending);
        }

        listener.poll();
        let step = acquisition.step(DT, &mut listener, |_| Ok(ComplexNumber::new(1.0, 0.0)));
        assert_eq!(step, AcquisitionStep::Progressed { iteration: 1 });
    }

    #[test]
    fn test_waits_for_samples_without_consuming_iterations() {
        let settings = GeneralSettings {
            transient_time_ms: 10.0,
            ..settings()
        };
        let driver = LoopbackDriver::resistor(100.0);
        driver.state.borrow_mut().frames_per_read = 50;
        driver.state.borrow_mut().playing = Some(1000.0);
        let mut listener = listening(driver, &settings);
        let mut acquisition = Acquisition::new(1000.0, &settings);

        for _ in 0..2 {
            listener.poll();
            assert_eq!(acquisition.step(DT, &mut listener, |_| unreachable!()), AcquisitionStep::Pending);
        }

        // 144 frames are needed, 50 arrive per tick
        for _ in 0..2 {
            listener.poll();
            assert_eq!(acquisition.step(DT, &mut listener, |_| unreachable!()), AcquisitionStep::Pending);
        }

        listener.poll();
        let step = acquisition.step(DT, &mut listener, |_| Ok(ComplexNumber::new(1.0, 0.0)));
        assert_eq!(step, AcquisitionStep::Progressed { iteration: 1 });
    }

    #[test]
    fn test_persistent_nan_fails_after_timeout() {
        let settings = settings();
        let driver = LoopbackDriver::resistor(100.0);
        driver.state.borrow_mut().playing = Some(1000.0);
        let mut listener = listening(driver, &settings);
        let mut acquisition = Acquisition::new(1000.0, &settings);

        let mut failed_at = None;
        for tick in 0..20 {
            listener.poll();
            let step = acquisition.step(DT, &mut listener, |_| Ok(ComplexNumber::new(f64::NAN, 0.0)));
            if let AcquisitionStep::Failed(err) = step {
                assert_eq!(err, MeasurementError::NanTimeout);
                failed_at = Some(tick);
                break;
            }
        }

        // 3 settle ticks, 6 retries accumulate 60 ms > 50 ms, the next one fails
        assert_eq!(failed_at, Some(9));
    }

    #[test]
    fn test_valid_reading_resets_retry_budget() {
        let settings = settings();
        let driver = LoopbackDriver::resistor(100.0);
        driver.state.borrow_mut().playing = Some(1000.0);
        let mut listener = listening(driver, &settings);
        let mut acquisition = Acquisition::new(1000.0, &settings);

        let mut tick = 0;
        let mut step = || {
            tick += 1;
            listener.poll();
            // Every fourth reading is valid
            let valid = tick % 4 == 0;
            acquisition.step(DT, &mut listener, |_| {
                if valid {
                    Ok(ComplexNumber::new(2.0, 0.0))
                } else {
                    Err(ImpedanceError::DegenerateDenominator(0.0))
                }
            })
        };

        let mut result = None;
        for _ in 0..40 {
            match step() {
                AcquisitionStep::Failed(err) => panic!("unexpected failure: {err}"),
                AcquisitionStep::Finished(r) => {
                    result = Some(r);
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(result.map(|r| r.value), Some(ComplexNumber::new(2.0, 0.0)));
    }
}
