//! Impedance meter composition root
//!
//! Owns the device bridges, the calibration constants and a single job slot.
//! Starting any job first cancels the running one, so the generator and the
//! listener are never shared between two runs.

use super::calibration::{CalibrationKind, CalibrationRun, CalibrationState};
use super::events::{EventSink, MeterEvent};
use super::sweep::SweepRun;
use super::test_generation::TestGenerationRun;
use super::{Devices, MeasurementError};
use crate::audio::{InputDeviceListener, InputDriver, OutputDeviceGenerator, OutputDriver};
use crate::settings::{GeneralSettings, SettingsError};
use std::time::Duration;
use tracing::{info, warn};

/// What the job slot currently runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Calibration(CalibrationKind),
    Sweep,
    TestGeneration,
}

enum Job {
    Calibration(CalibrationRun),
    Sweep(SweepRun),
    TestGeneration(TestGenerationRun),
}

impl Job {
    fn kind(&self) -> JobKind {
        match self {
            Job::Calibration(run) => JobKind::Calibration(run.kind()),
            Job::Sweep(_) => JobKind::Sweep,
            Job::TestGeneration(_) => JobKind::TestGeneration,
        }
    }
}

pub struct ImpedanceMeter<I: InputDriver, O: OutputDriver> {
    settings: GeneralSettings,
    listener: InputDeviceListener<I>,
    generator: OutputDeviceGenerator<O>,
    calibration: CalibrationState,
    job: Option<Job>,
}

impl<I: InputDriver, O: OutputDriver> ImpedanceMeter<I, O> {
    /// Meter over the given drivers; `settings` must validate
    pub fn new(input_driver: I, output_driver: O, settings: GeneralSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            listener: InputDeviceListener::new(input_driver),
            generator: OutputDeviceGenerator::new(output_driver),
            calibration: CalibrationState::new(),
            job: None,
        })
    }

    pub fn settings(&self) -> &GeneralSettings {
        &self.settings
    }

    /// Replace the settings; refused while a job runs
    pub fn set_settings(&mut self, settings: GeneralSettings) -> Result<(), SettingsError> {
        if self.is_busy() {
            return Err(SettingsError::LockedWhileRunning);
        }
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    /// Forget all calibration constants
    pub fn reset_calibration(&mut self) {
        self.calibration.clear();
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    pub fn active_job(&self) -> Option<JobKind> {
        self.job.as_ref().map(Job::kind)
    }

    /// Frequency of the sweep point being measured
    pub fn current_frequency(&self) -> Option<f64> {
        match &self.job {
            Some(Job::Sweep(run)) => Some(run.frequency()),
            _ => None,
        }
    }

    fn devices(&mut self) -> Devices<'_, I, O> {
        Devices {
            listener: &mut self.listener,
            generator: &mut self.generator,
        }
    }

    /// Start a calibration run of `kind`
    pub fn calibrate(&mut self, kind: CalibrationKind, sink: &mut dyn EventSink) {
        self.preempt(JobKind::Calibration(kind), sink);

        let settings = self.settings.clone();
        let mut devices = self.devices();
        self.job = CalibrationRun::start(kind, &settings, &mut devices, sink).map(Job::Calibration);
    }

    /// Start a sweep; a sweep already running is restarted
    pub fn start_measuring(&mut self, sink: &mut dyn EventSink) {
        self.preempt(JobKind::Sweep, sink);

        let settings = self.settings.clone();
        let mut devices = self.devices();
        self.job = SweepRun::start(&settings, &mut devices, sink).map(Job::Sweep);
    }

    /// Cancel a running sweep; streams are closed before this returns
    pub fn stop_measuring(&mut self, sink: &mut dyn EventSink) {
        if !matches!(self.job, Some(Job::Sweep(_))) {
            return;
        }

        self.job = None;
        self.devices().stop();
        info!("Sweep stopped");
        sink.emit(MeterEvent::MeasuringFinished);
    }

    /// Play the calibration tone and report channel levels and phase shift
    pub fn test_generate(&mut self, sink: &mut dyn EventSink) {
        self.preempt(JobKind::TestGeneration, sink);

        let settings = self.settings.clone();
        let mut devices = self.devices();
        self.job = TestGenerationRun::start(&settings, &mut devices, sink).map(Job::TestGeneration);
    }

    /// Abort whatever runs, without events
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            info!(job = ?job.kind(), "Job cancelled");
        }
        self.devices().stop();
    }

    /// Drain captured frames and advance the active job by one step
    pub fn tick(&mut self, dt: Duration, sink: &mut dyn EventSink) {
        self.listener.poll();

        let Some(job) = self.job.as_mut() else {
            return;
        };

        let mut devices = Devices {
            listener: &mut self.listener,
            generator: &mut self.generator,
        };
        let settings = &self.settings;

        let done = match job {
            Job::Calibration(run) => run.tick(dt, settings, &mut devices, &mut self.calibration, sink),
            Job::Sweep(run) => run.tick(dt, settings, &mut devices, &self.calibration, sink),
            Job::TestGeneration(run) => run.tick(dt, settings, &mut devices, sink),
        };

        if done {
            self.job = None;
        }
    }

    /// Make room for `incoming`, ending the running job
    fn preempt(&mut self, incoming: JobKind, sink: &mut dyn EventSink) {
        let Some(job) = self.job.take() else {
            return;
        };
        self.devices().stop();

        let running = job.kind();
        if running == JobKind::Sweep && incoming == JobKind::Sweep {
            info!("Restarting sweep");
            return;
        }

        warn!(?running, ?incoming, "Interrupting running job");
        let message = MeasurementError::Interrupted.to_string();
        match running {
            JobKind::Sweep => sink.emit(MeterEvent::MeasuringFinished),
            JobKind::Calibration(kind) => sink.emit(MeterEvent::CalibrationError { kind, message }),
            JobKind::TestGeneration => sink.emit(MeterEvent::TestGenerationError(message)),
        }
    }
}

impl<I: InputDriver, O: OutputDriver> Drop for ImpedanceMeter<I, O> {
    fn drop(&mut self) {
        self.cancel();
    }
}
