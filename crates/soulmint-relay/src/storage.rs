//! # Permanent Storage Uploads
//!
//! Credential metadata is uploaded to permanent storage before the mint
//! transaction is submitted, so the on-chain token can reference an
//! immutable document.
//!
//! The [`StorageUploader`] trait is the capability boundary. The pipeline
//! treats a returned storage reference as durable: implementations must
//! only return `Ok` once the content is actually persisted.

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use soulmint_core::CredentialId;
use thiserror::Error;

/// Errors from storage upload operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage gateway rejected the document.
    #[error("storage rejected upload for {credential}: {reason}")]
    Rejected {
        /// The credential whose document was rejected.
        credential: CredentialId,
        /// Gateway-reported reason.
        reason: String,
    },

    /// The storage gateway is unreachable or returned a transport error.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The gateway response could not be interpreted.
    #[error("malformed storage response: {0}")]
    MalformedResponse(String),
}

/// Capability for uploading credential documents to permanent storage.
///
/// Implementations must ensure that `upload` only returns `Ok` when the
/// document has been durably recorded — a reference to unpersisted content
/// would leave a confirmed token pointing at nothing.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    /// Upload a credential document, returning its permanent storage
    /// reference.
    async fn upload(
        &self,
        credential: CredentialId,
        document: &[u8],
    ) -> Result<String, StorageError>;
}

// ─── Mock Uploader ──────────────────────────────────────────────────────

/// In-memory uploader for development and testing.
///
/// References are content-addressed (`ar://` + SHA-256 hex of the
/// document), so repeated uploads of the same document yield the same
/// reference. Failures can be scripted per-call for pipeline tests.
#[derive(Debug, Default)]
pub struct MockStorageUploader {
    /// When set, every upload fails with this reason until cleared.
    failure: Mutex<Option<String>>,
    /// Credentials whose uploads fail even while the global switch is off.
    failing_credentials: Mutex<std::collections::HashSet<CredentialId>>,
    uploads: Mutex<Vec<(CredentialId, String)>>,
}

impl MockStorageUploader {
    /// Create a mock uploader that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent uploads fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    /// Make uploads for one specific credential fail, leaving others alone.
    pub fn fail_for(&self, credential: CredentialId) {
        self.failing_credentials.lock().insert(credential);
    }

    /// Resume accepting uploads.
    pub fn recover(&self) {
        *self.failure.lock() = None;
        self.failing_credentials.lock().clear();
    }

    /// All uploads accepted so far, in order.
    pub fn uploads(&self) -> Vec<(CredentialId, String)> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl StorageUploader for MockStorageUploader {
    async fn upload(
        &self,
        credential: CredentialId,
        document: &[u8],
    ) -> Result<String, StorageError> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(StorageError::Unavailable(reason));
        }
        if self.failing_credentials.lock().contains(&credential) {
            return Err(StorageError::Rejected {
                credential,
                reason: "scripted failure".to_string(),
            });
        }

        let digest = Sha256::digest(document);
        let storage_ref = format!("ar://{:x}", digest);
        self.uploads.lock().push((credential, storage_ref.clone()));
        Ok(storage_ref)
    }
}

// ─── HTTP Gateway Uploader ──────────────────────────────────────────────

/// Uploader that POSTs documents to a storage gateway over HTTPS.
///
/// The gateway persists the document to the underlying permanent store and
/// responds with `{"ref": "<storage reference>"}`. Transport failures are
/// retried with exponential backoff; gateway rejections are not.
#[derive(Debug)]
pub struct HttpStorageUploader {
    client: reqwest::Client,
    gateway_url: String,
    retry: crate::retry::RetryPolicy,
}

impl HttpStorageUploader {
    /// Create an uploader for the gateway at `gateway_url`.
    pub fn new(
        gateway_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            gateway_url: gateway_url.into(),
            retry: crate::retry::RetryPolicy::default(),
        })
    }
}

#[async_trait]
impl StorageUploader for HttpStorageUploader {
    async fn upload(
        &self,
        credential: CredentialId,
        document: &[u8],
    ) -> Result<String, StorageError> {
        let url = format!("{}/upload", self.gateway_url.trim_end_matches('/'));
        let body = document.to_vec();

        let resp = self
            .retry
            .send(|| {
                self.client
                    .post(&url)
                    .header("content-type", "application/json")
                    .body(body.clone())
                    .send()
            })
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp.text().await.unwrap_or_else(|_| status.to_string());
            return Err(StorageError::Rejected { credential, reason });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        json.get("ref")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| {
                StorageError::MalformedResponse("response missing 'ref' field".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_upload_is_content_addressed() {
        let uploader = MockStorageUploader::new();
        let a = uploader
            .upload(CredentialId::new(), b"{\"name\":\"A\"}")
            .await
            .unwrap();
        let b = uploader
            .upload(CredentialId::new(), b"{\"name\":\"A\"}")
            .await
            .unwrap();
        assert_eq!(a, b, "same document, same reference");
        assert!(a.starts_with("ar://"));
    }

    #[tokio::test]
    async fn mock_upload_distinguishes_documents() {
        let uploader = MockStorageUploader::new();
        let a = uploader
            .upload(CredentialId::new(), b"{\"name\":\"A\"}")
            .await
            .unwrap();
        let b = uploader
            .upload(CredentialId::new(), b"{\"name\":\"B\"}")
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mock_failure_switch() {
        let uploader = MockStorageUploader::new();
        uploader.fail_with("gateway down");

        let err = uploader
            .upload(CredentialId::new(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        uploader.recover();
        assert!(uploader.upload(CredentialId::new(), b"{}").await.is_ok());
    }

    #[tokio::test]
    async fn mock_records_uploads_in_order() {
        let uploader = MockStorageUploader::new();
        let first = CredentialId::new();
        let second = CredentialId::new();
        uploader.upload(first, b"one").await.unwrap();
        uploader.upload(second, b"two").await.unwrap();

        let uploads = uploader.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].0, first);
        assert_eq!(uploads[1].0, second);
    }
}
