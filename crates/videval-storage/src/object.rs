//! [`RemoteStore`] backed by the `object_store` crate.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, ObjectStoreExt,
    PutOptions, PutPayload,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use videval_core::RemoteCredentials;

use crate::traits::{RemoteStore, StorageError, StorageResult};

#[derive(Clone)]
enum Backend {
    S3 {
        region: String,
        endpoint_url: Option<String>,
        credentials: Option<RemoteCredentials>,
    },
    Memory,
}

/// Object store client that lazily opens one store per bucket.
pub struct ObjectStoreRemote {
    backend: Backend,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreRemote {
    /// S3 (or S3-compatible) backend using credentials from the environment.
    ///
    /// `endpoint_url` selects a custom provider such as MinIO
    /// (e.g. "http://localhost:9000").
    pub fn s3(region: String, endpoint_url: Option<String>) -> Self {
        Self::with_backend(Backend::S3 {
            region,
            endpoint_url,
            credentials: None,
        })
    }

    /// S3 backend using explicit temporary credentials.
    ///
    /// The credentials' own region wins over `default_region`.
    pub fn from_credentials(
        credentials: RemoteCredentials,
        default_region: String,
        endpoint_url: Option<String>,
    ) -> Self {
        let region = credentials
            .region_name
            .clone()
            .unwrap_or(default_region);
        Self::with_backend(Backend::S3 {
            region,
            endpoint_url,
            credentials: Some(credentials),
        })
    }

    /// Process-local backend, one empty store per bucket.
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            stores: Mutex::new(HashMap::new()),
        }
    }

    async fn store_for(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::Memory => Arc::new(InMemory::new()),
            Backend::S3 {
                region,
                endpoint_url,
                credentials,
            } => Arc::new(build_s3(
                bucket,
                region,
                endpoint_url.as_deref(),
                credentials.as_ref(),
            )?),
        };
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

fn build_s3(
    bucket: &str,
    region: &str,
    endpoint_url: Option<&str>,
    credentials: Option<&RemoteCredentials>,
) -> StorageResult<object_store::aws::AmazonS3> {
    // every object written through this client is public-read
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-amz-acl"),
        HeaderValue::from_static("public-read"),
    );

    let mut builder = AmazonS3Builder::from_env()
        .with_region(region)
        .with_bucket_name(bucket)
        .with_client_options(ClientOptions::new().with_default_headers(headers));

    if let Some(credentials) = credentials {
        builder = builder
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key);
        if let Some(token) = &credentials.session_token {
            builder = builder.with_token(token);
        }
    }

    if let Some(endpoint) = endpoint_url {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    builder
        .build()
        .map_err(|e| StorageError::ConfigError(e.to_string()))
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let store = self.store_for(bucket).await?;
        let location = ObjectPath::from(key);
        match store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let store = self.store_for(bucket).await?;
        let location = ObjectPath::from(key);
        let start = std::time::Instant::now();

        let data = fs::read(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let size = data.len() as u64;

        let mut attributes = Attributes::new();
        if let Some(content_type) = content_type {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
        }

        ObjectStore::put_opts(
            store.as_ref(),
            &location,
            PutPayload::from(Bytes::from(data)),
            PutOptions::from(attributes),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Remote upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            content_type = content_type.unwrap_or("-"),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote upload successful"
        );

        Ok(())
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        let store = self.store_for(bucket).await?;
        let location = ObjectPath::from(key);
        let start = std::time::Instant::now();

        let result = store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(format!("{}/{}", bucket, key)),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    "Remote download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let mut file = fs::File::create(dest).await?;
        let mut stream = result.into_stream();
        let mut size: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote download successful"
        );

        Ok(size)
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let store = self.store_for(bucket).await?;
        let location = ObjectPath::from(key);
        let start = std::time::Instant::now();

        match store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote delete successful"
        );

        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        match &self.backend {
            Backend::S3 {
                endpoint_url: Some(endpoint),
                ..
            } => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            _ => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        }
    }
}
