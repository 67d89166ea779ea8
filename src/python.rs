//! Python module `_core`

use crate::config::{AreaOfInterest, MaskingConfig, PhenologyConfig, PipelineConfig};
use crate::core::extract::TileExtractor;
use crate::pipeline::{self, ExtractionSummary};
use crate::types::NdviError;
use numpy::ToPyArray;
use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use serde::Serialize;
use std::path::{Path, PathBuf};

fn to_py_err(err: NdviError) -> PyErr {
    match err {
        NdviError::InputMissing { .. } => PyFileNotFoundError::new_err(err.to_string()),
        NdviError::Config(_) | NdviError::InvalidFileName(_) => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Convert any serializable result into plain Python objects
fn to_py_object<T: Serialize>(py: Python, value: &T) -> PyResult<PyObject> {
    let json = serde_json::to_value(value).map_err(|e| PyValueError::new_err(e.to_string()))?;
    json_to_py(py, &json)
}

fn json_to_py(py: Python, value: &serde_json::Value) -> PyResult<PyObject> {
    use serde_json::Value;

    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => b.to_object(py),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_object(py),
            None => n.as_f64().unwrap_or(f64::NAN).to_object(py),
        },
        Value::String(s) => s.to_object(py),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| json_to_py(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new(py, items).into()
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (key, item) in map {
                dict.set_item(key, json_to_py(py, item)?)?;
            }
            dict.into()
        }
    })
}

fn load_config(config_path: Option<String>, tile_dir: Option<String>, output_dir: Option<String>) -> PyResult<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path).map_err(to_py_err)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = tile_dir {
        config.tile_dir = PathBuf::from(dir);
    }
    if let Some(dir) = output_dir {
        config.output_dir = PathBuf::from(dir);
    }
    Ok(config)
}

/// Run extraction over a tile directory and write the artifacts
#[pyfunction]
#[pyo3(signature = (config_path=None, tile_dir=None, output_dir=None))]
fn extract_all(
    config_path: Option<String>,
    tile_dir: Option<String>,
    output_dir: Option<String>,
) -> PyResult<PyExtractionSummary> {
    let config = load_config(config_path, tile_dir, output_dir)?;
    let inner = pipeline::extract_all(&config).map_err(to_py_err)?;
    Ok(PyExtractionSummary { inner })
}

/// Season markers from a summary CSV
#[pyfunction]
#[pyo3(signature = (summary_csv, threshold_fraction=0.4, smoothing_window=3))]
fn compute_phenology(
    py: Python,
    summary_csv: String,
    threshold_fraction: f64,
    smoothing_window: usize,
) -> PyResult<PyObject> {
    let rows = pipeline::load_summary(Path::new(&summary_csv)).map_err(to_py_err)?;
    let config = PhenologyConfig {
        threshold_fraction,
        smoothing_window,
    };
    let result = pipeline::compute_phenology(&rows, &config).map_err(to_py_err)?;
    to_py_object(py, &result)
}

/// Next-season peak date from a summary CSV
#[pyfunction]
fn compute_forecast(py: Python, summary_csv: String) -> PyResult<PyObject> {
    let rows = pipeline::load_summary(Path::new(&summary_csv)).map_err(to_py_err)?;
    to_py_object(py, &pipeline::compute_forecast(&rows))
}

/// Extract a single tile and return the clipped NDVI array
#[pyfunction]
fn extract_tile(py: Python, path: String, south: f64, west: f64, north: f64, east: f64) -> PyResult<PyObject> {
    let extractor = TileExtractor::new(AreaOfInterest::new(south, west, north, east), MaskingConfig::default());
    let frame = extractor.extract_file(Path::new(&path)).map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("data", frame.data.to_pyarray(py))?;
    result.set_item("valid_fraction", frame.valid_fraction)?;
    result.set_item("mean_ndvi", frame.mean_ndvi())?;
    result.set_item(
        "bounds",
        (
            (frame.bounds.south_west.lat, frame.bounds.south_west.lon),
            (frame.bounds.north_east.lat, frame.bounds.north_east.lon),
        ),
    )?;
    result.set_item("rows", frame.data.nrows())?;
    result.set_item("cols", frame.data.ncols())?;

    Ok(result.into())
}

/// Python wrapper for ExtractionSummary
#[pyclass(name = "ExtractionSummary")]
struct PyExtractionSummary {
    inner: ExtractionSummary,
}

#[pymethods]
impl PyExtractionSummary {
    #[getter]
    fn status(&self) -> String {
        serde_json::to_value(self.inner.status)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    #[getter]
    fn message(&self) -> String {
        self.inner.message.clone()
    }

    #[getter]
    fn frames(&self) -> Vec<String> {
        self.inner.frames.clone()
    }

    #[getter]
    fn row_count(&self) -> usize {
        self.inner.rows.len()
    }

    #[getter]
    fn rows(&self, py: Python) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.rows)
    }

    #[getter]
    fn display_bounds(&self) -> ((f64, f64), (f64, f64)) {
        let b = &self.inner.display_bounds;
        ((b.south_west.lat, b.south_west.lon), (b.north_east.lat, b.north_east.lon))
    }

    fn to_dict(&self, py: Python) -> PyResult<PyObject> {
        to_py_object(py, &self.inner)
    }

    fn __str__(&self) -> String {
        format!(
            "ExtractionSummary(status='{}', rows={}, frames={})",
            self.status(),
            self.inner.rows.len(),
            self.inner.frames.len()
        )
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(extract_all, m)?)?;
    m.add_function(wrap_pyfunction!(compute_phenology, m)?)?;
    m.add_function(wrap_pyfunction!(compute_forecast, m)?)?;
    m.add_function(wrap_pyfunction!(extract_tile, m)?)?;
    m.add_class::<PyExtractionSummary>()?;
    Ok(())
}
