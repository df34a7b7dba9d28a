// C ABI of native upscaler plugins (the `upsclr_plugin_*` interface).
// Any shared library exporting these symbols can serve as the super-resolution model.

use std::os::raw::{c_char, c_void};

// UTF-8 `char` on the C side.
#[allow(non_camel_case_types)]
pub type c_char8_t = c_char;

#[repr(C)]
#[derive(Debug)]
pub struct UpsclrPluginInfo {
    pub name: *const c_char8_t,
    pub version: *const c_char8_t,
    pub description: *const c_char8_t,
}

#[repr(C)]
#[derive(Debug)]
pub struct UpsclrEngineInfo {
    pub name: *const c_char8_t,
    pub description: *const c_char8_t,
    pub version: *const c_char8_t,
    pub config_json_schema: *const c_char8_t,
}

// Opaque engine instance owned by the plugin.
#[repr(C)]
pub struct UpsclrEngineInstance(c_void);

#[repr(C)]
#[derive(Debug)]
pub struct UpsclrEngineConfigValidationResult {
    pub is_valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub warning_messages: *const *const c_char8_t,
    pub error_messages: *const *const c_char8_t,
}

#[repr(C)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum UpsclrErrorCode {
    Success = 0,
    InvalidArgument = 1,
    EngineNotFound = 2,
    UpscaleFailed = 3,
    Other = 9999,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsclrColorFormat {
    Rgb = 0,
    Bgr = 1,
}

pub type InitializeFn = unsafe extern "C" fn() -> UpsclrErrorCode;
pub type ShutdownFn = unsafe extern "C" fn() -> UpsclrErrorCode;
pub type GetInfoFn = unsafe extern "C" fn() -> *const UpsclrPluginInfo;
pub type CountEnginesFn = unsafe extern "C" fn() -> usize;
pub type GetEngineInfoFn = unsafe extern "C" fn(engine_index: usize) -> *const UpsclrEngineInfo;
pub type ValidateEngineConfigFn = unsafe extern "C" fn(
    engine_index: usize,
    config_json: *const c_char8_t,
    config_json_length: usize,
) -> *const UpsclrEngineConfigValidationResult;
pub type FreeValidationResultFn =
    unsafe extern "C" fn(result: *const UpsclrEngineConfigValidationResult);
pub type CreateEngineInstanceFn = unsafe extern "C" fn(
    engine_index: usize,
    config_json: *const c_char8_t,
    config_json_length: usize,
) -> *mut UpsclrEngineInstance;
pub type DestroyEngineInstanceFn = unsafe extern "C" fn(instance: *mut UpsclrEngineInstance);
pub type PreloadUpscaleFn =
    unsafe extern "C" fn(instance: *mut UpsclrEngineInstance, scale: i32) -> UpsclrErrorCode;
pub type UpscaleFn = unsafe extern "C" fn(
    instance: *mut UpsclrEngineInstance,
    scale: i32,
    in_data: *const u8,
    in_size: usize,
    in_width: u32,
    in_height: u32,
    in_channels: u32,
    in_color_format: UpsclrColorFormat,
    out_data: *mut u8,
    out_size: usize,
    out_color_format: UpsclrColorFormat,
) -> UpsclrErrorCode;
