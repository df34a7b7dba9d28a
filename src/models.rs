// Defines data structures for API responses,
// using Serde for JSON serialization.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions, displayed as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbImage) -> Self {
        Self::new(image.width(), image.height())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// Response body of POST /upscale.
#[derive(Serialize, Deserialize, Debug)]
pub struct UpscaleResponse {
    // `data:image/jpeg;base64,...`
    pub image: String,
    // Resolution the model was run on.
    pub old_res: String,
    // Resolution of the returned image.
    pub new_res: String,
    // Resolution of the upload before the size guard.
    pub input_res: String,
}

// Response body of GET /.
#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    // Upscale factor of the loaded model.
    pub scale: Option<u32>,
    pub cors: String,
}

// Response body of OPTIONS /upscale.
#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
        assert_eq!(Resolution::new(1, 3).to_string(), "1x3");
    }

    #[test]
    fn test_health_response_shape() {
        let json = serde_json::to_value(HealthResponse {
            status: "Active".to_string(),
            model_loaded: false,
            scale: None,
            cors: "Enabled".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "Active");
        assert_eq!(json["model_loaded"], false);
        assert!(json["scale"].is_null());
    }
}
