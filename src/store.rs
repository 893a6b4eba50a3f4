//! Abstraction over the object-storage backend.
//!
//! The trait is agnostic of transport and authentication details; the
//! implementation owns the client, region and credentials. It is annotated
//! for `mockall` so the pipeline can be tested against deterministic mocks.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::WebsiteSettings;

/// Errors from the storage backend, carrying the failing operation's
/// identifiers so the top-level report has context.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to list buckets: {source}")]
    ListBuckets {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to create bucket {bucket}: {source}")]
    CreateBucket {
        bucket: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to put CORS rules on bucket {bucket}: {source}")]
    PutCors {
        bucket: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to get website configuration for bucket {bucket}: {source}")]
    GetWebsite {
        bucket: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to put website configuration for bucket {bucket}: {source}")]
    PutWebsite {
        bucket: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to upload s3://{bucket}/{key}: {source}")]
    PutObject {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to list s3://{bucket}/{prefix}: {source}")]
    ListKeys {
        bucket: String,
        prefix: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to delete s3://{bucket}/{key}: {source}")]
    DeleteObject {
        bucket: String,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One object to upload: remote key, full body and its content type.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: String,
}

/// Trait for the storage operations the deploy pipeline consumes.
///
/// `get_website` returns `Ok(None)` when the bucket has no website
/// configuration; only genuine transport/API failures are errors.
/// `create_bucket` treats "already exists/owned" as success.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of all buckets visible to the credentials.
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Create a bucket with the given canned ACL.
    async fn create_bucket(&self, bucket: &str, acl: &str) -> Result<(), StoreError>;

    /// Apply permissive CORS rules so objects can be fetched and uploaded
    /// cross-origin.
    async fn put_bucket_cors(&self, bucket: &str) -> Result<(), StoreError>;

    /// Fetch the current website configuration, `None` when unset.
    async fn get_website(&self, bucket: &str) -> Result<Option<WebsiteSettings>, StoreError>;

    /// Write the website configuration.
    async fn put_website(
        &self,
        bucket: &str,
        settings: &WebsiteSettings,
    ) -> Result<(), StoreError>;

    /// Upload one object.
    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), StoreError>;

    /// All keys under the prefix.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Delete one object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}
