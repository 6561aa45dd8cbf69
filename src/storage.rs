use async_trait::async_trait;
use reqwest::Url;
use tokio::fs;
use tracing::info;

use std::path::{Component, Path, PathBuf};

use crate::gateway::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub size: usize,
}

/// Binary object storage split into buckets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> GatewayResult<StoredObject>;

    /// The public URL of a stored object. Deterministic, but a separate step
    /// from the upload and able to fail on its own.
    fn public_url(&self, bucket: &str, path: &str) -> GatewayResult<String>;
}

/// Objects kept as files under `root/<bucket>/<path>`, published under
/// `<public_base_url>/storage/`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> LocalObjectStore {
        LocalObjectStore {
            root: root.into(),
            public_base_url: public_base_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> GatewayResult<PathBuf> {
        if !is_valid_bucket(bucket) || !validate_path_is_in_bucket(Path::new(path)) {
            return Err(GatewayError::Validation(format!(
                "Invalid object path {}/{}",
                bucket, path
            )));
        }

        Ok(self.root.join(bucket).join(path))
    }
}

pub fn is_valid_bucket(bucket: &str) -> bool {
    !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Only plain relative components: no `..`, no root, no prefix.
pub fn validate_path_is_in_bucket(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        upsert: bool,
    ) -> GatewayResult<StoredObject> {
        let target = self.object_path(bucket, path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if !upsert && fs::try_exists(&target).await? {
            return Err(GatewayError::Conflict(format!("{}/{}", bucket, path)));
        }

        fs::write(&target, &bytes).await?;
        info!(bucket, path, size = bytes.len(), "stored object");

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: bytes.len(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> GatewayResult<String> {
        self.object_path(bucket, path)?;

        let mut url = Url::parse(&self.public_base_url)
            .map_err(|e| GatewayError::Storage(format!("bad public base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Storage("public base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .push("storage")
            .push(bucket)
            .extend(path.split('/'));

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_must_stay_inside_the_bucket() {
        assert!(validate_path_is_in_bucket(Path::new("logos/1_a.png")));
        assert!(!validate_path_is_in_bucket(Path::new("../secrets")));
        assert!(!validate_path_is_in_bucket(Path::new("logos/../../x")));
        assert!(!validate_path_is_in_bucket(Path::new("/etc/passwd")));
        assert!(!validate_path_is_in_bucket(Path::new("")));
    }

    #[tokio::test]
    async fn upload_writes_under_the_bucket_and_refuses_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path(), "http://localhost:8000");

        let stored = store
            .upload("client-logos", "logos/1_a.png", b"png".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(stored.size, 3);
        assert_eq!(
            std::fs::read(root.path().join("client-logos/logos/1_a.png")).unwrap(),
            b"png"
        );

        match store
            .upload("client-logos", "logos/1_a.png", b"new".to_vec(), false)
            .await
        {
            Err(GatewayError::Conflict(_)) => {}
            other => panic!("expected conflict, got {:?}", other),
        }
        store
            .upload("client-logos", "logos/1_a.png", b"new".to_vec(), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path(), "http://localhost:8000");

        let result = store
            .upload("client-logos", "../escape.txt", vec![1], true)
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[test]
    fn public_urls_are_deterministic_and_encoded() {
        let store = LocalObjectStore::new("unused", "https://portal.example/");

        assert_eq!(
            store.public_url("client-logos", "logos/7_my logo.png").unwrap(),
            "https://portal.example/storage/client-logos/logos/7_my%20logo.png"
        );
        assert!(store.public_url("Bad Bucket", "a.png").is_err());
    }
}
