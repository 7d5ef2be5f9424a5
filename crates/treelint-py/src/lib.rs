//! Python bindings for treelint.
//!
//! Exposes a single function, `validate_text`, that validates an in-memory
//! document and returns the verdict with every incident as a dict.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use treelint::config::checked_level;
use treelint::{Incident, NullReporter, ValidationConfig, Validator};

fn incident_dict<'py>(py: Python<'py>, incident: &Incident) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("severity", incident.severity.to_string())?;
    dict.set_item("test_class", incident.test_class.to_string())?;
    dict.set_item("test_id", &incident.test_id)?;
    dict.set_item("message", &incident.message)?;
    dict.set_item("line", incident.line)?;
    dict.set_item("sentence_id", incident.sentence_id.as_deref())?;
    dict.set_item("node_id", incident.node_id.as_deref())?;
    dict.set_item("explanation", incident.explanation.as_deref())?;
    Ok(dict)
}

/// Validates `text` and returns `(passed, incidents)`.
///
/// Raises `ValueError` when `level` is not between 1 and 5.
#[pyfunction]
#[pyo3(signature = (text, lang = "ud", level = 5, single_root = true))]
fn validate_text<'py>(
    py: Python<'py>,
    text: &str,
    lang: &str,
    level: u8,
    single_root: bool,
) -> PyResult<(bool, Bound<'py, PyList>)> {
    let level = checked_level(level).map_err(|err| PyValueError::new_err(err.to_string()))?;
    let config = ValidationConfig::default()
        .with_lang(lang)
        .with_level(level)
        .with_single_root(single_root)
        .with_max_errors_per_class(0);
    let validator = Validator::new(config);
    let mut run = validator.start_run();
    validator.validate_str(&mut run, "<string>", text, &mut NullReporter);
    let incidents = PyList::empty(py);
    for incident in run.aggregator.incidents() {
        incidents.append(incident_dict(py, incident)?)?;
    }
    Ok((run.summary().passed, incidents))
}

/// The native module behind the `treelint` Python package.
#[pymodule]
fn _treelint(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(validate_text, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
