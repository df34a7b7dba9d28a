// The super-resolution seam used by the upscale pipeline.
// Production code plugs in a native plugin (see plugin_model.rs); tests plug in
// a nearest-neighbour stub.

use image::RgbImage;

/// A pretrained super-resolution operator with a fixed integer scale factor.
///
/// Implementations must be deterministic and must return an image whose
/// dimensions are exactly `scale() * input dimensions`. The pipeline checks
/// the output size and rejects anything else.
pub trait SuperResolution: Send + Sync {
    /// The fixed output scale factor (3 for the FSRCNN x3 model).
    fn scale(&self) -> u32;

    /// Upscales an RGB image.
    fn upscale(&self, input: &RgbImage) -> Result<RgbImage, String>;
}
