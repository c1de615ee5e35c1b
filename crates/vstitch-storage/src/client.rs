//! S3-compatible object store client.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::object_store::{BackendError, ObjectStore};

/// Default bucket holding user uploads and job outputs.
pub const DEFAULT_BUCKET: &str = "uploads";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Object store backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vstitch",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Backend(sdk_error(e)))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, BackendError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = sdk_error(e);
                if matches!(err.code.as_deref(), Some("NotFound") | Some("NoSuchKey")) {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// Flatten an SDK error into its full cause chain and service error code.
fn sdk_error<E>(err: E) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().map(str::to_string);
    BackendError {
        message: DisplayErrorContext(&err).to_string(),
        code,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError> {
        debug!("Downloading {} from bucket '{}'", path, self.bucket);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(sdk_error)?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::new(DisplayErrorContext(&e).to_string()))?
            .into_bytes()
            .to_vec();

        Ok(Some(bytes))
    }

    async fn put_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), BackendError> {
        if !upsert && self.exists(path).await? {
            return Err(BackendError::with_code(
                format!("The resource already exists: {}", path),
                "Duplicate",
            ));
        }

        debug!("Uploading {} bytes to {}", data.len(), path);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(sdk_error)?;

        info!("Uploaded {} to bucket '{}'", path, self.bucket);
        Ok(())
    }

    async fn delete_objects(&self, paths: &[String]) -> Result<u32, BackendError> {
        if paths.is_empty() {
            return Ok(0);
        }

        debug!("Deleting {} objects", paths.len());

        let objects = paths
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::new(e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| BackendError::new(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(sdk_error)?;

        info!("Deleted {} objects", paths.len());
        Ok(paths.len() as u32)
    }
}
