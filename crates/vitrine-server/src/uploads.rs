// SPDX-License-Identifier: Apache-2.0

//! Multipart image intake and the stored-image tree under the public dir.
//!
//! Stored paths are wire paths (`public/images/...`); the leading `public/`
//! maps onto `ServerConfig::public_dir` on disk.

use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use vitrine_api::{ApiError, ApiErrorCode};
use vitrine_model::{DEFAULT_PRODUCT_IMAGE, DEFAULT_USER_IMAGE};

use crate::http::respond::validation_error;

pub(crate) const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

pub(crate) struct UploadedImage {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Text fields plus the optional `image` part of a multipart form.
pub(crate) struct ImageForm {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

pub(crate) async fn read_image_form(
    mut multipart: Multipart,
    upload_max_bytes: usize,
) -> Result<ImageForm, ApiError> {
    let mut fields = HashMap::new();
    let mut image = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(validation_error(format!("invalid multipart body: {err}"))),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            if !content_type.starts_with("image/") {
                return Err(ApiError::new(
                    ApiErrorCode::UnsupportedMediaType,
                    "File is not image",
                    Value::Null,
                    "req-unknown",
                ));
            }
            if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                return Err(ApiError::new(
                    ApiErrorCode::UnsupportedMediaType,
                    "Image type is not allowed",
                    Value::Null,
                    "req-unknown",
                ));
            }
            let file_name = sanitize_file_name(field.file_name().unwrap_or("upload"));
            let bytes = field
                .bytes()
                .await
                .map_err(|err| validation_error(format!("unreadable image part: {err}")))?;
            if bytes.len() > upload_max_bytes {
                return Err(ApiError::new(
                    ApiErrorCode::PayloadTooLarge,
                    "File too large",
                    Value::Null,
                    "req-unknown",
                ));
            }
            image = Some(UploadedImage { file_name, bytes });
        } else {
            let text = field
                .text()
                .await
                .map_err(|err| validation_error(format!("unreadable field {name}: {err}")))?;
            fields.insert(name, text);
        }
    }

    Ok(ImageForm { fields, image })
}

/// Writes the image under `<public_dir>/images/<subdir>/` and returns the
/// wire path to store on the entity.
pub(crate) fn store_image(
    public_dir: &Path,
    subdir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let file_name = format!("{}-{original_name}", Utc::now().timestamp_millis());
    let dir = public_dir.join("images").join(subdir);
    std::fs::create_dir_all(&dir)
        .map_err(|err| ApiError::internal(format!("failed to create image directory: {err}")))?;
    std::fs::write(dir.join(&file_name), bytes)
        .map_err(|err| ApiError::internal(format!("failed to store image: {err}")))?;
    Ok(format!("public/images/{subdir}/{file_name}"))
}

/// Deletes a replaced image file. Default images and paths outside the
/// public tree are left alone; a missing file only logs.
pub(crate) fn remove_stored_image(public_dir: &Path, stored: &str) {
    if stored == DEFAULT_PRODUCT_IMAGE || stored == DEFAULT_USER_IMAGE {
        return;
    }
    let Some(relative) = stored.strip_prefix("public/") else {
        return;
    };
    let path = public_dir.join(relative);
    if let Err(err) = std::fs::remove_file(&path) {
        warn!(path = %path.display(), error = %err, "could not remove replaced image");
    }
}

// Uploads keep only the final path component of the client-supplied name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches(['-', '.']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
