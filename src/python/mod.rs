use pyo3::prelude::*;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::config::AppConfig;
use crate::controller::PanTiltController;
use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::open_backend;

fn to_py(err: PanTiltError) -> PyErr{
    match err{
        PanTiltError::Config(_) | PanTiltError::InvalidCalibration{ .. } | PanTiltError::Json(_) =>
            PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

#[pyclass(name = "PanTiltController")]
pub struct PyPanTiltController{
    inner: Arc<PanTiltController>,
    worker: Mutex<Option<JoinHandle<PanTiltResult<()>>>>,
}

#[pymethods]
impl PyPanTiltController{
    /// `config_json` defaults to the built-in configuration
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self>{
        let config = match config_json{
            Some(text) => AppConfig::from_json(text).map_err(to_py)?,
            None => AppConfig::default(),
        };
        let backend = open_backend(&config.backend)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let controller = PanTiltController::new(&config.controller, backend).map_err(to_py)?;
        Ok(PyPanTiltController{
            inner: Arc::new(controller),
            worker: Mutex::new(None),
        })
    }

    fn start(&self) -> PyResult<()>{
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some(){
            return Err(to_py(PanTiltError::AlreadyStarted));
        }
        *worker = Some(Arc::clone(&self.inner).start_background());
        Ok(())
    }

    fn enqueue(&self, pan_angle: f64, tilt_angle: f64) -> PyResult<()>{
        self.inner.enqueue(pan_angle, tilt_angle).map_err(to_py)
    }

    fn send_home(&self) -> PyResult<()>{
        self.inner.send_home().map_err(to_py)
    }

    fn pending(&self) -> usize{
        self.inner.stats().pending
    }

    fn applied(&self) -> u64{
        self.inner.stats().applied
    }

    fn state(&self) -> String{
        self.inner.state().to_string()
    }

    /// Blocks until the loop has disabled the servos; re-raises a hardware
    /// failure that ended the loop.
    fn shutdown(&self, py: Python<'_>) -> PyResult<()>{
        self.inner.shutdown();
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(thread) = worker else{
            return Ok(());
        };
        match py.allow_threads(move || thread.join()){
            Ok(result) => result.map_err(to_py),
            Err(_) => Err(PyRuntimeError::new_err("control loop panicked")),
        }
    }
}

#[pymodule]
fn pan_tilt(_py: Python, m: &PyModule) -> PyResult<()>{
    m.add_class::<PyPanTiltController>()?;
    Ok(())
}
