//! Python extension module `_groundcheck_core`.

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::prelude::*;

use crate::config::CheckerConfig;
use crate::engine::HallucinationChecker;
use crate::errors::GroundcheckError;
use crate::report::{CheckResponse, ReportOptions};
use crate::store::{SqliteExampleIndex, SqliteGraphStore};
use crate::validation::{GraphStore, VectorSearch};

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

fn to_py_dict(py: Python<'_>, response: &CheckResponse) -> PyResult<PyObject> {
    let json_str = response.to_json()?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.into())
}

#[pyclass(name = "HallucinationChecker")]
pub struct PyHallucinationChecker {
    inner: HallucinationChecker,
}

#[pymethods]
impl PyHallucinationChecker {
    #[new]
    #[pyo3(signature = (graph_db, examples_db=None))]
    fn new(graph_db: &str, examples_db: Option<&str>) -> PyResult<Self> {
        let graph: Arc<dyn GraphStore> =
            Arc::new(SqliteGraphStore::open(&expand_tilde(graph_db))?);
        let examples = examples_db
            .map(|path| SqliteExampleIndex::open(&expand_tilde(path)))
            .transpose()?
            .map(|index| Arc::new(index) as Arc<dyn VectorSearch>);
        Ok(Self {
            inner: HallucinationChecker::new(graph, examples, CheckerConfig::from_env()),
        })
    }

    #[pyo3(signature = (script, script_path="<script>", include_suggestions=true, detailed=false))]
    fn check_hallucinations(
        &self,
        py: Python<'_>,
        script: &str,
        script_path: &str,
        include_suggestions: bool,
        detailed: bool,
    ) -> PyResult<PyObject> {
        let response = py.allow_threads(|| {
            self.inner
                .check_hallucinations(script, script_path, include_suggestions, detailed)
        });
        to_py_dict(py, &response)
    }

    #[pyo3(signature = (path, include_suggestions=true, detailed=false))]
    fn check_file(
        &self,
        py: Python<'_>,
        path: &str,
        include_suggestions: bool,
        detailed: bool,
    ) -> PyResult<PyObject> {
        let options = ReportOptions {
            include_suggestions,
            detailed,
        };
        let path = expand_tilde(path);
        let response = py.allow_threads(|| self.inner.check_file(&path, options));
        to_py_dict(py, &response)
    }

    fn cache_size(&self) -> usize {
        self.inner.cache().len()
    }

    fn clear_cache(&self) {
        self.inner.cache().clear();
    }

    fn close(&self) {
        self.inner.close();
    }

    #[getter]
    fn closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Parse a script and return its structural analysis as a dict.
#[pyfunction]
#[pyo3(signature = (script, script_path="<script>"))]
fn analyze_script(py: Python<'_>, script: &str, script_path: &str) -> PyResult<PyObject> {
    let analysis = crate::analyzer::analyze(script, script_path)?;
    let json_str = serde_json::to_string(&analysis).map_err(GroundcheckError::from)?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.into())
}

#[pymodule]
fn _groundcheck_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyHallucinationChecker>()?;
    m.add_function(wrap_pyfunction!(analyze_script, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
