use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::config::AppConfig;
use crate::controller::PanTiltController;
use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::open_backend;

pub const PAN_TILT_OK: i32 = 0;
pub const PAN_TILT_ERR_NULL: i32 = -1;
pub const PAN_TILT_ERR_ALREADY_STARTED: i32 = -2;
pub const PAN_TILT_ERR_QUEUE_CLOSED: i32 = -3;
pub const PAN_TILT_ERR_HARDWARE: i32 = -4;
pub const PAN_TILT_ERR_CONFIG: i32 = -5;
pub const PAN_TILT_ERR_PANICKED: i32 = -6;

pub struct PanTiltHandle{
    controller: Arc<PanTiltController>,
    worker: Mutex<Option<JoinHandle<PanTiltResult<()>>>>,
}

fn error_code(err: &PanTiltError) -> i32{
    match err{
        PanTiltError::HardwareUnavailable{ .. } => PAN_TILT_ERR_HARDWARE,
        PanTiltError::QueueClosed => PAN_TILT_ERR_QUEUE_CLOSED,
        PanTiltError::AlreadyStarted => PAN_TILT_ERR_ALREADY_STARTED,
        PanTiltError::ProducerPanicked(_) => PAN_TILT_ERR_PANICKED,
        _ => PAN_TILT_ERR_CONFIG,
    }
}

fn result_code(result: PanTiltResult<()>) -> i32{
    match result{
        Ok(()) => PAN_TILT_OK,
        Err(e) => error_code(&e),
    }
}

fn build(config_json: Option<&str>) -> PanTiltResult<PanTiltHandle>{
    let config = match config_json{
        Some(text) => AppConfig::from_json(text)?,
        None => AppConfig::default(),
    };
    let backend = open_backend(&config.backend).map_err(|e| PanTiltError::Config(e.to_string()))?;
    let controller = PanTiltController::new(&config.controller, backend)?;
    Ok(PanTiltHandle{
        controller: Arc::new(controller),
        worker: Mutex::new(None),
    })
}

/// Creates a controller from a JSON configuration (NULL for defaults).
/// Returns NULL when the configuration is invalid or the backend cannot
/// be opened.
#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_new(config_json: *const c_char) -> *mut PanTiltHandle{
    let text = if config_json.is_null(){
        None
    }else{
        match unsafe{ CStr::from_ptr(config_json) }.to_str(){
            Ok(s) => Some(s),
            Err(_) => return ptr::null_mut(),
        }
    };

    match build(text){
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) =>{
            log::error!("pan_tilt_controller_new: {}", e);
            ptr::null_mut()
        }
    }
}

/// Starts the control loop on a background thread
#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_start(handle: *mut PanTiltHandle) -> i32{
    if handle.is_null(){
        return PAN_TILT_ERR_NULL;
    }
    let h = unsafe{ &*handle };
    let mut worker = h.worker.lock().unwrap_or_else(PoisonError::into_inner);
    if worker.is_some(){
        return PAN_TILT_ERR_ALREADY_STARTED;
    }
    *worker = Some(Arc::clone(&h.controller).start_background());
    PAN_TILT_OK
}

#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_enqueue(handle: *mut PanTiltHandle, pan_angle: f64, tilt_angle: f64) -> i32{
    if handle.is_null(){
        return PAN_TILT_ERR_NULL;
    }
    let h = unsafe{ &*handle };
    result_code(h.controller.enqueue(pan_angle, tilt_angle))
}

#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_send_home(handle: *mut PanTiltHandle) -> i32{
    if handle.is_null(){
        return PAN_TILT_ERR_NULL;
    }
    let h = unsafe{ &*handle };
    result_code(h.controller.send_home())
}

#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_pending(handle: *mut PanTiltHandle) -> usize{
    if handle.is_null(){
        return 0;
    }
    let h = unsafe{ &*handle };
    h.controller.stats().pending
}

#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_applied(handle: *mut PanTiltHandle) -> u64{
    if handle.is_null(){
        return 0;
    }
    let h = unsafe{ &*handle };
    h.controller.stats().applied
}

/// Stops the loop, waits for it to disable the servos, and returns how the
/// loop ended.
#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_shutdown(handle: *mut PanTiltHandle) -> i32{
    if handle.is_null(){
        return PAN_TILT_ERR_NULL;
    }
    let h = unsafe{ &*handle };
    h.controller.shutdown();

    let worker = h.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
    match worker{
        Some(thread) => match thread.join(){
            Ok(result) => result_code(result),
            Err(_) => PAN_TILT_ERR_PANICKED,
        },
        None => PAN_TILT_OK,
    }
}

/// Shuts the controller down if it is still running, then frees it
#[no_mangle]
pub unsafe extern "C" fn pan_tilt_controller_free(handle: *mut PanTiltHandle){
    if !handle.is_null(){
        unsafe{
            pan_tilt_controller_shutdown(handle);
            drop(Box::from_raw(handle));
        }
    }
}
