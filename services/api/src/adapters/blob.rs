//! services/api/src/adapters/blob.rs
//!
//! This module contains the adapter for S3-compatible object storage.
//! It implements the `BlobStore` port from the `core` crate and holds every
//! uploaded lesson attachment.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use lesson_portal_core::ports::{BlobStore, PortError, PortResult};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `BlobStore` port on a single S3 bucket.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Creates a new `S3BlobStore`.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

/// Transport failures are retryable; anything the service answered is not.
fn port_error<E, R>(action: &str, key: &str, e: SdkError<E, R>) -> PortError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("S3 {} of '{}' failed: {}", action, key, e);
    match e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => PortError::Unavailable(message),
        _ => PortError::Unexpected(message),
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| port_error("put", key, e))?;

        debug!(key, size, "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| port_error("delete", key, e))?;

        debug!(key, "Deleted object");
        Ok(())
    }

    /// Presigns a GET for `key`. No request is made; the URL is computed locally.
    async fn signed_get_url(&self, key: &str, ttl: Duration) -> PortResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| PortError::Validation(format!("invalid download lifetime: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| port_error("presign", key, e))?;

        Ok(request.uri().to_string())
    }
}
