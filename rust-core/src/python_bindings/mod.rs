//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod meter_bindings;

/// Install the log subscriber; `RUST_LOG` overrides `filter`
#[pyfunction]
#[pyo3(signature = (filter="info"))]
fn init_logging(filter: &str) -> bool {
    crate::logging::init_logging(filter)
}

/// Python module definition
#[pymodule]
fn zrlc_meter(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<meter_bindings::PyImpedanceMeter>()?;
    m.add_class::<meter_bindings::PyMeterEvent>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
