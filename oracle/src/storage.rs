//! Object storage backends for uploaded images.
//!
//! The deployed service writes to Cloudflare R2 through its S3-compatible
//! API. The trait keeps handlers independent of the concrete store and lets
//! tests substitute an in-memory implementation.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, primitives::ByteStream};
use bytes::Bytes;

use crate::config::Config;
use crate::errors::{Error, Result};

/// Write-once blob store addressed by bucket-relative key.
///
/// All provider failure modes (auth, network, quota) collapse into
/// [`Error::Storage`]; the caller takes the same action for every one.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` in the configured bucket.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<()>;

    /// `s3://bucket/key` reference for a stored object. The backend resolves
    /// this URI itself; the bytes are never transmitted downstream.
    fn object_uri(&self, key: &str) -> String;
}

/// Cloudflare R2 via the aws-sdk-s3 client.
pub struct R2Storage {
    client: Client,
    bucket: String,
}

impl R2Storage {
    /// Build from configuration. Returns `None` when any storage setting is
    /// missing - the lenient-startup contract surfaces that per request
    /// rather than at boot.
    pub async fn from_config(config: &Config) -> Option<Self> {
        let account_id = config.account_id.as_deref()?;
        let access_key_id = config.access_key_id.as_deref()?;
        let access_key_secret = config.access_key_secret.as_deref()?;
        let bucket = config.bucket_name.clone()?;

        let credentials = Credentials::new(access_key_id, access_key_secret, None, None, "oracle");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            // R2 ignores the region but the SDK requires one; "auto" is what
            // Cloudflare documents.
            .region(Region::new("auto"))
            .endpoint_url(format!("https://{account_id}.r2.cloudflarestorage.com"))
            .credentials_provider(credentials)
            .load()
            .await;

        Some(Self {
            client: Client::new(&sdk_config),
            bucket,
        })
    }
}

#[async_trait]
impl ObjectStorage for R2Storage {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| Error::Storage {
                source: anyhow::Error::new(e),
            })?;

        Ok(())
    }

    fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory storage used by handler tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Stored object content as the tests see it.
    pub struct StoredObject {
        pub content_type: String,
        pub bytes: Bytes,
    }

    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: Mutex<HashMap<String, StoredObject>>,
        fail: bool,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// A store whose every put fails, for short-circuit tests.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<()> {
            if self.fail {
                return Err(Error::Storage {
                    source: anyhow::anyhow!("simulated storage outage"),
                });
            }
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
            Ok(())
        }

        fn object_uri(&self, key: &str) -> String {
            format!("s3://test-bucket/{key}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStorage;
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn r2_storage_requires_every_setting() {
        let mut config = Config::default();
        assert!(R2Storage::from_config(&config).await.is_none());

        config.account_id = Some("acct".into());
        config.access_key_id = Some("ak".into());
        config.access_key_secret = Some("sk".into());
        assert!(R2Storage::from_config(&config).await.is_none());

        config.bucket_name = Some("images".into());
        let storage = R2Storage::from_config(&config).await.expect("fully configured");
        assert_eq!(storage.object_uri("uploads/abc.png"), "s3://images/uploads/abc.png");
    }

    #[tokio::test]
    async fn memory_storage_records_uploads() {
        let storage = MemoryStorage::new();
        storage
            .put("uploads/x.png", "image/png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();

        let objects = storage.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects["uploads/x.png"].content_type, "image/png");
    }

    #[tokio::test]
    async fn failing_storage_reports_storage_error() {
        let storage = MemoryStorage::failing();
        let err = storage
            .put("uploads/x.png", "image/png", Bytes::new())
            .await
            .expect_err("put should fail");
        assert_eq!(err.to_string(), "File upload to R2 failed");
    }
}
