//! Python bindings for the threaded impedance meter

use crate::audio::{MeterCommand, MeterProcessor};
use crate::complex::ComplexNumber;
use crate::impedance::{compute_active_resistance, compute_capacitance, compute_inductance, ImpedanceMeasurement};
use crate::measurement::{CalibrationKind, MeterEvent};
use crate::settings::GeneralSettings;
use numpy::PyArray1;
use pyo3::prelude::*;

/// One meter notification, flattened for Python
///
/// `name` tells which of the optional fields are set.
#[pyclass(name = "MeterEvent")]
#[derive(Clone, Default)]
pub struct PyMeterEvent {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub calibration: Option<String>,
    #[pyo3(get)]
    pub progress: Option<f64>,
    #[pyo3(get)]
    pub real: Option<f64>,
    #[pyo3(get)]
    pub imag: Option<f64>,
    #[pyo3(get)]
    pub frequency: Option<f64>,
    #[pyo3(get)]
    pub message: Option<String>,
    #[pyo3(get)]
    pub left_rms: Option<f64>,
    #[pyo3(get)]
    pub right_rms: Option<f64>,
    #[pyo3(get)]
    pub phase_shift_rad: Option<f64>,
}

#[pymethods]
impl PyMeterEvent {
    fn __repr__(&self) -> String {
        match (&self.message, self.real, self.imag) {
            (Some(message), _, _) => format!("MeterEvent({}, {:?})", self.name, message),
            (None, Some(re), Some(im)) => format!("MeterEvent({}, {} + {}j)", self.name, re, im),
            _ => format!("MeterEvent({})", self.name),
        }
    }
}

impl From<&MeterEvent> for PyMeterEvent {
    fn from(event: &MeterEvent) -> Self {
        let named = |name: &str| PyMeterEvent {
            name: name.to_string(),
            ..Default::default()
        };

        match event {
            MeterEvent::MeasuringStarted => named("measuring_started"),
            MeterEvent::MeasuringProgress(p) => PyMeterEvent {
                progress: Some(*p),
                ..named("measuring_progress")
            },
            MeterEvent::ImpedanceMeasured(m) => PyMeterEvent {
                real: Some(m.impedance.re),
                imag: Some(m.impedance.im),
                frequency: Some(m.frequency_hz),
                ..named("impedance_measured")
            },
            MeterEvent::MeasuringFinished => named("measuring_finished"),
            MeterEvent::MeasuringError(message) => PyMeterEvent {
                message: Some(message.clone()),
                ..named("measuring_error")
            },
            MeterEvent::CalibrationFinished { kind, value } => PyMeterEvent {
                calibration: Some(kind.to_string()),
                real: Some(value.re),
                imag: Some(value.im),
                ..named("calibration_finished")
            },
            MeterEvent::CalibrationOutOfRange { kind, value, message } => PyMeterEvent {
                calibration: Some(kind.to_string()),
                real: Some(value.re),
                imag: Some(value.im),
                message: Some(message.clone()),
                ..named("calibration_out_of_range")
            },
            MeterEvent::CalibrationError { kind, message } => PyMeterEvent {
                calibration: Some(kind.to_string()),
                message: Some(message.clone()),
                ..named("calibration_error")
            },
            MeterEvent::TestGenerationStarted => named("test_generation_started"),
            MeterEvent::TestGenerationProgress(p) => PyMeterEvent {
                progress: Some(*p),
                ..named("test_generation_progress")
            },
            MeterEvent::TestGenerationFinished {
                left_rms,
                right_rms,
                phase_shift_rad,
            } => PyMeterEvent {
                left_rms: Some(*left_rms),
                right_rms: Some(*right_rms),
                phase_shift_rad: Some(*phase_shift_rad),
                ..named("test_generation_finished")
            },
            MeterEvent::TestGenerationError(message) => PyMeterEvent {
                message: Some(message.clone()),
                ..named("test_generation_error")
            },
        }
    }
}

/// Sound-card impedance meter
///
/// Measurement runs on a background thread; call `poll_events()` regularly
/// to receive progress and results.
#[pyclass(name = "ImpedanceMeter", unsendable)]
pub struct PyImpedanceMeter {
    processor: MeterProcessor,
    /// Points of the latest sweep
    measurements: Vec<ImpedanceMeasurement>,
}

fn runtime_error(e: impl ToString) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string())
}

fn value_error(e: impl ToString) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
}

#[pymethods]
impl PyImpedanceMeter {
    /// Create a meter and start its measurement thread
    ///
    /// Args:
    ///     settings_json: GeneralSettings as JSON; missing fields take defaults
    #[new]
    #[pyo3(signature = (settings_json=None))]
    fn new(settings_json: Option<&str>) -> PyResult<Self> {
        let settings = match settings_json {
            Some(json) => GeneralSettings::from_json(json).map_err(value_error)?,
            None => GeneralSettings::default(),
        };

        Ok(Self {
            processor: MeterProcessor::start(settings).map_err(runtime_error)?,
            measurements: Vec::new(),
        })
    }

    /// Default settings as pretty-printed JSON
    #[staticmethod]
    fn default_settings_json() -> PyResult<String> {
        GeneralSettings::default().to_json().map_err(runtime_error)
    }

    /// Replace the settings (ignored while a job runs)
    fn update_settings(&self, settings_json: &str) -> PyResult<()> {
        let settings = GeneralSettings::from_json(settings_json).map_err(value_error)?;
        self.processor.send(MeterCommand::UpdateSettings(settings));
        Ok(())
    }

    /// Run a calibration
    ///
    /// Args:
    ///     kind: "gain", "open" or "short"
    fn calibrate(&self, kind: &str) -> PyResult<()> {
        let kind: CalibrationKind = kind.parse().map_err(value_error)?;
        self.processor.send(MeterCommand::Calibrate(kind));
        Ok(())
    }

    fn reset_calibration(&self) {
        self.processor.send(MeterCommand::ResetCalibration);
    }

    /// Start a frequency sweep
    fn start_measuring(&mut self) {
        self.measurements.clear();
        self.processor.send(MeterCommand::StartMeasuring);
    }

    fn stop_measuring(&self) {
        self.processor.send(MeterCommand::StopMeasuring);
    }

    /// Play the calibration tone and report channel levels
    fn test_generate(&self) {
        self.processor.send(MeterCommand::TestGenerate);
    }

    fn cancel(&self) {
        self.processor.send(MeterCommand::Cancel);
    }

    /// Events emitted since the last call
    fn poll_events(&mut self) -> Vec<PyMeterEvent> {
        let events = self.processor.poll_events();
        for event in &events {
            if let MeterEvent::ImpedanceMeasured(m) = event {
                self.measurements.push(*m);
            }
        }
        events.iter().map(PyMeterEvent::from).collect()
    }

    /// Latest sweep as numpy arrays
    ///
    /// Returns:
    ///     Tuple of (frequencies_hz, real, imag)
    fn sweep_arrays<'py>(&self, py: Python<'py>) -> (&'py PyArray1<f64>, &'py PyArray1<f64>, &'py PyArray1<f64>) {
        let frequencies: Vec<f64> = self.measurements.iter().map(|m| m.frequency_hz).collect();
        let real: Vec<f64> = self.measurements.iter().map(|m| m.impedance.re).collect();
        let imag: Vec<f64> = self.measurements.iter().map(|m| m.impedance.im).collect();

        (
            PyArray1::from_vec(py, frequencies),
            PyArray1::from_vec(py, real),
            PyArray1::from_vec(py, imag),
        )
    }

    /// Series R, C and L of an impedance reading
    ///
    /// Returns:
    ///     Tuple of (resistance_ohm, capacitance_f, inductance_h); C and L
    ///     are 0 unless the reactance has their sign
    #[staticmethod]
    fn derive_rlc(real: f64, imag: f64, frequency: f64) -> (f64, f64, f64) {
        let data = ImpedanceMeasurement::new(ComplexNumber::new(real, imag), frequency);
        (
            compute_active_resistance(&data),
            compute_capacitance(&data),
            compute_inductance(&data),
        )
    }

    /// Stop the measurement thread and close all streams
    fn close(&mut self) {
        self.processor.stop();
    }
}
