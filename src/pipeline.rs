// The upscale pipeline: decode, bound, upscale, clean up, encode.
// Runs synchronously; callers put it on a blocking thread.

use crate::{filters, image_codec, models::Resolution, upscaler::SuperResolution};
use tracing::debug;

/// Knobs that differed between deployments of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run a median pre-filter before upscaling.
    pub pre_denoise: bool,
    /// Largest side accepted by the model; larger inputs are shrunk first.
    pub max_dim: u32,
    /// JPEG quality of the result, 1-100.
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pre_denoise: false,
            max_dim: 1200,
            jpeg_quality: image_codec::DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct UpscaleOutput {
    pub jpeg: Vec<u8>,
    /// Size of the decoded upload.
    pub input: Resolution,
    /// Size fed to the model, after the size guard.
    pub original: Resolution,
    /// Size of the returned image.
    pub upscaled: Resolution,
}

pub fn run(
    model: &dyn SuperResolution,
    config: &PipelineConfig,
    data: &[u8],
    content_type: Option<&str>,
) -> Result<UpscaleOutput, UpscaleError> {
    let decoded = image_codec::decode_input_image(data, content_type)
        .map_err(UpscaleError::InvalidImage)?;
    let input = Resolution::of(&decoded);

    let decoded = if config.pre_denoise {
        filters::pre_denoise(&decoded)
    } else {
        decoded
    };

    let working = filters::limit_size(decoded, config.max_dim);
    let original = Resolution::of(&working);
    if original != input {
        debug!("Input {} exceeds {}px, shrunk to {}", input, config.max_dim, original);
    }

    let factor = model.scale();
    let upscaled = model
        .upscale(&working)
        .map_err(UpscaleError::ProcessingFailed)?;
    let expected = (original.width * factor, original.height * factor);
    if upscaled.dimensions() != expected {
        return Err(UpscaleError::ProcessingFailed(format!(
            "model returned {}x{}, expected {}x{}",
            upscaled.width(),
            upscaled.height(),
            expected.0,
            expected.1
        )));
    }

    let final_image = filters::cleanup(&upscaled);
    let jpeg = image_codec::encode_jpeg(&final_image, config.jpeg_quality)
        .map_err(|e| UpscaleError::ProcessingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(UpscaleOutput {
        jpeg,
        input,
        original,
        upscaled: Resolution::of(&final_image),
    })
}
