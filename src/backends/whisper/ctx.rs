use std::os::raw::{c_char, c_void};
use std::sync::Once;

use anyhow::{Context, Result, ensure};
use tracing::info;
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::opts::Device;

/// Load a Whisper model onto `device` and return an initialized `WhisperContext`.
pub fn get_context(model_path: &str, device: Device) -> Result<WhisperContext> {
    ensure!(!model_path.trim().is_empty(), "model path must be provided");

    silence_native_logging();

    let mut ctx_params = WhisperContextParameters::default();
    ctx_params.use_gpu(device == Device::Gpu);

    let ctx = WhisperContext::new_with_params(model_path, ctx_params)
        .with_context(|| format!("failed to load model from path: {model_path}"))?;

    info!(model = model_path, ?device, "loaded whisper model");
    Ok(ctx)
}

unsafe extern "C" fn discard_native_log(
    _level: u32,
    _c_msg: *const c_char,
    _user_data: *mut c_void,
) {
}

/// whisper.cpp writes its own progress to stderr; route it nowhere, once per process.
fn silence_native_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(discard_native_log), std::ptr::null_mut());
    });
}
