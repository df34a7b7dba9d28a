use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Name of the multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// The uploaded image as received, before decoding.
#[derive(Debug)]
pub struct UpscaleRequest {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Pulls the `image` field out of a multipart form.
///
/// Only the first `image` field is used; any further ones and all other
/// fields are skipped. An empty file is passed through and rejected by the
/// decoder as an invalid image.
pub async fn extract_upload(request: Request) -> Result<UpscaleRequest, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA);
    if !is_multipart {
        return Err(ApiError::MissingInput("No file uploaded".to_string()));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to process multipart request: {}", e)))?;

    let mut upload: Option<UpscaleRequest> = None;
    let mut ignored_fields = 0;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!(
                "Ignoring multipart field: {}",
                field.name().unwrap_or("unnamed")
            );
            ignored_fields += 1;
            continue;
        }

        if upload.is_some() {
            warn!("Multiple '{}' fields in request, keeping the first one", IMAGE_FIELD);
            ignored_fields += 1;
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        debug!(
            "Received upload {:?} with content type {:?}",
            filename, content_type
        );

        let data = field.bytes().await?.to_vec();
        upload = Some(UpscaleRequest {
            data,
            filename,
            content_type,
        });
    }

    if ignored_fields > 0 {
        debug!("Ignored {} fields in multipart request", ignored_fields);
    }

    upload.ok_or_else(|| ApiError::MissingInput("No file uploaded".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    const BOUNDARY: &str = "upload-test-boundary";

    fn form_request(content_type: &str, field: &str, data: &[u8]) -> Request {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/upscale")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_extract_image_field() {
        let request = form_request(
            &format!("multipart/form-data; boundary={BOUNDARY}"),
            IMAGE_FIELD,
            b"pixels",
        );
        let upload = extract_upload(request).await.unwrap();
        assert_eq!(upload.data, b"pixels");
        assert_eq!(upload.filename.as_deref(), Some("a.png"));
        assert_eq!(upload.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_content_type_is_case_insensitive() {
        let request = form_request(
            &format!("Multipart/Form-Data; boundary={BOUNDARY}"),
            IMAGE_FIELD,
            b"pixels",
        );
        let upload = extract_upload(request).await.unwrap();
        assert_eq!(upload.data, b"pixels");
    }

    #[tokio::test]
    async fn test_non_form_content_type_is_missing_input() {
        let request = form_request("multipart/mixed; boundary=x", IMAGE_FIELD, b"pixels");
        assert!(matches!(
            extract_upload(request).await,
            Err(ApiError::MissingInput(_))
        ));
    }
}
