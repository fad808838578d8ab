//! # Credential Metadata Documents
//!
//! The metadata payload of a credential is an opaque structured document
//! supplied by the issuer and uploaded to permanent storage before minting.
//! The stack does not interpret its contents beyond requiring a non-empty
//! JSON object at admission time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// An issuer-supplied credential metadata document.
///
/// Must be a non-empty JSON object. Arrays, scalars, and `{}` are rejected
/// at construction so the pipeline's "metadata present" precondition is a
/// type-level guarantee for credentials created through [`Self::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct CredentialMetadata(Value);

impl CredentialMetadata {
    /// Validate and wrap a metadata document.
    pub fn new(document: Value) -> Result<Self, CoreError> {
        match &document {
            Value::Object(map) if !map.is_empty() => Ok(Self(document)),
            Value::Object(_) => Err(CoreError::InvalidMetadata(
                "metadata object must not be empty".to_string(),
            )),
            other => Err(CoreError::InvalidMetadata(format!(
                "metadata must be a JSON object, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// The document as a JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Deterministic byte rendering of the document, used for
    /// content-addressed storage references.
    ///
    /// `serde_json` object maps are key-ordered, so two structurally equal
    /// documents render to identical bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Serializing a Value cannot fail.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

impl TryFrom<Value> for CredentialMetadata {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CredentialMetadata> for Value {
    fn from(metadata: CredentialMetadata) -> Self {
        metadata.0
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
