// Loads the super-resolution model from a native upscaler plugin library and
// exposes one engine instance of it through the `SuperResolution` trait.

use crate::plugin_ffi::{self, UpsclrColorFormat, UpsclrErrorCode};
use crate::upscaler::SuperResolution;
use image::RgbImage;
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("model plugin not found at {0:?}")]
    NotFound(PathBuf),
    #[error("failed to load shared library {path:?}: {source}")]
    Library {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("missing symbol '{symbol}': {source}")]
    Symbol {
        symbol: &'static str,
        source: libloading::Error,
    },
    #[error("plugin failed to initialize with error code {0:?}")]
    Initialize(UpsclrErrorCode),
    #[error("invalid data returned by plugin: {0}")]
    InvalidData(String),
    #[error("engine '{0}' not provided by plugin")]
    EngineNotFound(String),
    #[error("plugin provides no engines")]
    NoEngines,
    #[error("engine configuration rejected: {0:?}")]
    InvalidConfig(Vec<String>),
    #[error("engine instance creation failed")]
    InstanceCreation,
    #[error("preloading scale {scale} failed with error code {code:?}")]
    Preload { scale: u32, code: UpsclrErrorCode },
}

/// Metadata of the loaded plugin and the selected engine.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub plugin_name: String,
    pub plugin_version: String,
    pub engine_name: String,
    pub engine_version: String,
}

// Keeps the library mapped; shuts the plugin down when the last user goes away.
struct PluginLibrary {
    _lib: Library,
    shutdown: plugin_ffi::ShutdownFn,
}

impl Drop for PluginLibrary {
    fn drop(&mut self) {
        debug!("Shutting down model plugin");
        unsafe {
            (self.shutdown)();
        }
    }
}

/// A single engine instance created from a model plugin.
pub struct PluginModel {
    instance: *mut plugin_ffi::UpsclrEngineInstance,
    upscale_fn: plugin_ffi::UpscaleFn,
    destroy_fn: plugin_ffi::DestroyEngineInstanceFn,
    scale: u32,
    info: ModelInfo,
    // Must outlive the instance.
    _library: PluginLibrary,
}

// Safety: plugins implementing this ABI are required to be thread-safe per instance.
unsafe impl Send for PluginModel {}
unsafe impl Sync for PluginModel {}

impl Drop for PluginModel {
    fn drop(&mut self) {
        if !self.instance.is_null() {
            info!("Destroying engine instance '{}'", self.info.engine_name);
            unsafe {
                (self.destroy_fn)(self.instance);
            }
        }
    }
}

unsafe fn c_str_to_string(ptr: *const plugin_ffi::c_char8_t) -> Result<String, PluginLoadError> {
    if ptr.is_null() {
        return Err(PluginLoadError::InvalidData(
            "null string pointer".to_string(),
        ));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(String::from)
        .map_err(|e| PluginLoadError::InvalidData(format!("invalid UTF-8: {}", e)))
}

unsafe fn c_str_array_to_vec(
    ptr: *const *const plugin_ffi::c_char8_t,
    count: usize,
) -> Vec<String> {
    if ptr.is_null() {
        return Vec::new();
    }
    (0..count)
        .filter_map(|i| unsafe { c_str_to_string(*ptr.add(i)) }.ok())
        .collect()
}

impl PluginModel {
    /// Loads the plugin at `path`, selects an engine (by name, or the first
    /// one), creates an instance with `engine_config` and preloads `scale`.
    ///
    /// # Safety
    ///
    /// Loads and runs foreign code; the library must implement the upscaler
    /// plugin ABI correctly.
    pub unsafe fn load(
        path: &Path,
        engine_name: Option<&str>,
        engine_config: &str,
        scale: u32,
    ) -> Result<Self, PluginLoadError> {
        if !path.is_file() {
            return Err(PluginLoadError::NotFound(path.to_path_buf()));
        }

        let lib = unsafe { Library::new(path) }.map_err(|source| PluginLoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        macro_rules! symbol {
            ($ty:ty, $name:literal) => {{
                let sym: Symbol<$ty> = unsafe { lib.get(concat!($name, "\0").as_bytes()) }
                    .map_err(|source| PluginLoadError::Symbol {
                        symbol: $name,
                        source,
                    })?;
                *sym
            }};
        }

        let initialize = symbol!(plugin_ffi::InitializeFn, "upsclr_plugin_initialize");
        let shutdown = symbol!(plugin_ffi::ShutdownFn, "upsclr_plugin_shutdown");
        let get_info = symbol!(plugin_ffi::GetInfoFn, "upsclr_plugin_get_info");
        let count_engines = symbol!(plugin_ffi::CountEnginesFn, "upsclr_plugin_count_engines");
        let get_engine_info =
            symbol!(plugin_ffi::GetEngineInfoFn, "upsclr_plugin_get_engine_info");
        let validate_config = symbol!(
            plugin_ffi::ValidateEngineConfigFn,
            "upsclr_plugin_validate_engine_config"
        );
        let free_validation_result = symbol!(
            plugin_ffi::FreeValidationResultFn,
            "upsclr_plugin_free_validation_result"
        );
        let create_instance = symbol!(
            plugin_ffi::CreateEngineInstanceFn,
            "upsclr_plugin_create_engine_instance"
        );
        let destroy_instance = symbol!(
            plugin_ffi::DestroyEngineInstanceFn,
            "upsclr_plugin_destroy_engine_instance"
        );
        let preload = symbol!(plugin_ffi::PreloadUpscaleFn, "upsclr_plugin_preload_upscale");
        let upscale = symbol!(plugin_ffi::UpscaleFn, "upsclr_plugin_upscale");

        let code = unsafe { initialize() };
        if code != UpsclrErrorCode::Success {
            return Err(PluginLoadError::Initialize(code));
        }
        let library = PluginLibrary {
            _lib: lib,
            shutdown,
        };

        let info_ptr = unsafe { get_info() };
        if info_ptr.is_null() {
            return Err(PluginLoadError::InvalidData(
                "upsclr_plugin_get_info returned NULL".to_string(),
            ));
        }
        let (plugin_name, plugin_version, plugin_description) = unsafe {
            let info = &*info_ptr;
            (
                c_str_to_string(info.name)?,
                c_str_to_string(info.version)?,
                c_str_to_string(info.description).unwrap_or_default(),
            )
        };
        debug!(
            "Model plugin '{}' v{} initialized: {}",
            plugin_name, plugin_version, plugin_description
        );

        let engine_count = unsafe { count_engines() };
        if engine_count == 0 {
            return Err(PluginLoadError::NoEngines);
        }
        let mut selected = None;
        for index in 0..engine_count {
            let engine_ptr = unsafe { get_engine_info(index) };
            if engine_ptr.is_null() {
                return Err(PluginLoadError::InvalidData(format!(
                    "upsclr_plugin_get_engine_info returned NULL for index {}",
                    index
                )));
            }
            let (name, version, description, schema) = unsafe {
                let engine = &*engine_ptr;
                (
                    c_str_to_string(engine.name)?,
                    c_str_to_string(engine.version)?,
                    c_str_to_string(engine.description).unwrap_or_default(),
                    c_str_to_string(engine.config_json_schema).unwrap_or_default(),
                )
            };
            debug!(
                "Plugin engine #{}: {} v{} ({}), config schema: {}",
                index, name, version, description, schema
            );
            if engine_name.is_none_or(|wanted| wanted == name) {
                selected = Some((index, name, version));
                break;
            }
        }
        let (engine_index, engine_name, engine_version) = selected.ok_or_else(|| {
            PluginLoadError::EngineNotFound(engine_name.unwrap_or_default().to_string())
        })?;

        let config_c = CString::new(engine_config)
            .map_err(|e| PluginLoadError::InvalidData(format!("engine config: {}", e)))?;
        let config_len = config_c.as_bytes().len();

        let validation_ptr = unsafe { validate_config(engine_index, config_c.as_ptr(), config_len) };
        if !validation_ptr.is_null() {
            let (is_valid, errors, warnings) = unsafe {
                let validation = &*validation_ptr;
                let result = (
                    validation.is_valid,
                    c_str_array_to_vec(validation.error_messages, validation.error_count),
                    c_str_array_to_vec(validation.warning_messages, validation.warning_count),
                );
                free_validation_result(validation_ptr);
                result
            };
            for warning in &warnings {
                warn!("Engine '{}' config warning: {}", engine_name, warning);
            }
            if !is_valid {
                return Err(PluginLoadError::InvalidConfig(errors));
            }
        }

        let instance = unsafe { create_instance(engine_index, config_c.as_ptr(), config_len) };
        if instance.is_null() {
            return Err(PluginLoadError::InstanceCreation);
        }

        let model = PluginModel {
            instance,
            upscale_fn: upscale,
            destroy_fn: destroy_instance,
            scale,
            info: ModelInfo {
                plugin_name,
                plugin_version,
                engine_name,
                engine_version,
            },
            _library: library,
        };

        // On failure `model` drops here and destroys the instance.
        let code = unsafe { preload(model.instance, scale as i32) };
        if code != UpsclrErrorCode::Success {
            return Err(PluginLoadError::Preload { scale, code });
        }

        Ok(model)
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}

impl SuperResolution for PluginModel {
    fn scale(&self) -> u32 {
        self.scale
    }

    fn upscale(&self, input: &RgbImage) -> Result<RgbImage, String> {
        let (width, height) = input.dimensions();
        let out_width = width
            .checked_mul(self.scale)
            .ok_or("output width overflows")?;
        let out_height = height
            .checked_mul(self.scale)
            .ok_or("output height overflows")?;
        let mut output = RgbImage::new(out_width, out_height);

        let in_data = input.as_raw();
        let out_size = output.as_raw().len();
        let code = unsafe {
            (self.upscale_fn)(
                self.instance,
                self.scale as i32,
                in_data.as_ptr(),
                in_data.len(),
                width,
                height,
                3,
                UpsclrColorFormat::Rgb,
                output.as_mut_ptr(),
                out_size,
                UpsclrColorFormat::Rgb,
            )
        };

        if code != UpsclrErrorCode::Success {
            return Err(format!(
                "engine '{}' failed to upscale {}x{}: {:?}",
                self.info.engine_name, width, height, code
            ));
        }

        Ok(output)
    }
}
