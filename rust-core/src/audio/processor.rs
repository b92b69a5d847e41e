//! Threaded meter driver
//!
//! Runs an [`ImpedanceMeter`] over the cpal devices on its own thread so the
//! host never has to tick it. Commands go in over one channel and events
//! come back over another.

use super::input::CpalDriver;
use crate::measurement::{CalibrationKind, ImpedanceMeter, MeterEvent};
use crate::settings::{GeneralSettings, SettingsError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Pause between two ticks of the measurement loop
const TICK_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq)]
pub enum MeterCommand {
    Calibrate(CalibrationKind),
    StartMeasuring,
    StopMeasuring,
    TestGenerate,
    /// Abort any job without events
    Cancel,
    UpdateSettings(GeneralSettings),
    ResetCalibration,
}

pub struct MeterProcessor {
    commands: Sender<MeterCommand>,
    events: Receiver<MeterEvent>,
    running: Arc<AtomicBool>,
    process_thread: Option<JoinHandle<()>>,
}

impl MeterProcessor {
    /// Spawn the measurement thread
    ///
    /// The cpal streams are created on that thread and never leave it.
    pub fn start(settings: GeneralSettings) -> Result<Self, SettingsError> {
        settings.validate()?;

        let (commands, command_rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = Arc::clone(&running);
        let handle = thread::spawn(move || {
            run_meter(settings, command_rx, event_tx, thread_running);
        });

        Ok(Self {
            commands,
            events,
            running,
            process_thread: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn send(&self, command: MeterCommand) {
        if self.commands.send(command).is_err() {
            warn!("Measurement thread is gone, command dropped");
        }
    }

    /// Every event emitted since the last call, without blocking
    pub fn poll_events(&self) -> Vec<MeterEvent> {
        self.events.try_iter().collect()
    }

    /// Stop the thread and close all streams
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.process_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MeterProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_meter(
    settings: GeneralSettings,
    commands: Receiver<MeterCommand>,
    mut events: Sender<MeterEvent>,
    running: Arc<AtomicBool>,
) {
    let mut meter = match ImpedanceMeter::new(CpalDriver::new(), CpalDriver::new(), settings) {
        Ok(meter) => meter,
        Err(err) => {
            error!("Invalid meter settings: {err}");
            running.store(false, Ordering::SeqCst);
            return;
        }
    };
    let mut last_tick = Instant::now();
    info!("Measurement thread started");

    while running.load(Ordering::SeqCst) {
        loop {
            match commands.try_recv() {
                Ok(command) => apply(&mut meter, command, &mut events),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }

        let now = Instant::now();
        meter.tick(now - last_tick, &mut events);
        last_tick = now;

        thread::sleep(TICK_INTERVAL);
    }

    meter.cancel();
    info!("Measurement thread stopped");
}

fn apply(meter: &mut ImpedanceMeter<CpalDriver, CpalDriver>, command: MeterCommand, events: &mut Sender<MeterEvent>) {
    match command {
        MeterCommand::Calibrate(kind) => meter.calibrate(kind, events),
        MeterCommand::StartMeasuring => meter.start_measuring(events),
        MeterCommand::StopMeasuring => meter.stop_measuring(events),
        MeterCommand::TestGenerate => meter.test_generate(events),
        MeterCommand::Cancel => meter.cancel(),
        MeterCommand::UpdateSettings(settings) => {
            if let Err(err) = meter.set_settings(settings) {
                warn!("Settings rejected: {err}");
            }
        }
        MeterCommand::ResetCalibration => meter.reset_calibration(),
    }
}
