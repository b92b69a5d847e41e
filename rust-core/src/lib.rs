//! ZRLC Meter - Sound-Card Impedance Measurement Core
//!
//! Drives a sine through a reference resistor and the device under test,
//! captures both ends on the line input and turns the FFT phasors into a
//! calibrated complex impedance per frequency.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod audio;
pub mod complex;
pub mod impedance;
pub mod logging;
pub mod measurement;
pub mod settings;
pub mod spectrum;
pub mod units;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use complex::{ComplexExt, ComplexNumber};
pub use impedance::ImpedanceMeasurement;
pub use measurement::{CalibrationKind, EventSink, ImpedanceMeter, MeterEvent};
pub use settings::GeneralSettings;
