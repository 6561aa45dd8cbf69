use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use std::path::Path;

use crate::storage::ObjectStore;

pub const LOGO_BUCKET: &str = "client-logos";

/// The two steps of a logo upload fail separately: the file may be stored
/// and still have no usable URL.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("Invalid logo file name")]
    InvalidName,
    #[error("Logo upload failed: {0}")]
    Upload(String),
    #[error("Failed to retrieve logo URL after upload: {0}")]
    PublicUrl(String),
}

pub fn logo_object_path(file_name: &str, now_millis: i64) -> Result<String, UploadError> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .ok_or(UploadError::InvalidName)?;

    Ok(format!("logos/{}_{}", now_millis, name))
}

/// Stores a logo and returns its public URL.
pub async fn upload_logo(
    store: &dyn ObjectStore,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String, UploadError> {
    let path = logo_object_path(file_name, Utc::now().timestamp_millis())?;

    let stored = store
        .upload(LOGO_BUCKET, &path, bytes, true)
        .await
        .map_err(|e| {
            error!(path = %path, error = %e, "logo upload failed");
            UploadError::Upload(e.user_message())
        })?;

    let url = store
        .public_url(LOGO_BUCKET, &stored.path)
        .map_err(|e| {
            error!(path = %stored.path, error = %e, "logo stored but URL unavailable");
            UploadError::PublicUrl(e.to_string())
        })?;

    info!(path = %stored.path, size = stored.size, "uploaded logo");
    Ok(url)
}
