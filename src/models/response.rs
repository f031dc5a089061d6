use std::fmt;

use serde_json::Value;

use super::tensor::ImageTensor;
use crate::error::{ClarityError, Result};

/// What a node execution hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// Decoded RGBA batch of one, `[1, height, width, 4]`.
    Image(ImageTensor),
    /// Raw video bytes as returned by the service.
    Video(Vec<u8>),
}

impl ResultPayload {
    pub fn as_image(&self) -> Option<&ImageTensor> {
        match self {
            ResultPayload::Image(image) => Some(image),
            ResultPayload::Video(_) => None,
        }
    }

    pub fn into_image(self) -> Option<ImageTensor> {
        match self {
            ResultPayload::Image(image) => Some(image),
            ResultPayload::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&[u8]> {
        match self {
            ResultPayload::Video(bytes) => Some(bytes),
            ResultPayload::Image(_) => None,
        }
    }
}

/// Identifier of an asynchronous job, used only as the poll URL suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        JobHandle(id.into())
    }

    /// Reads the `id` field of a submission response. String and numeric ids
    /// are both accepted.
    pub fn from_submission(body: &[u8]) -> Result<Self> {
        let json: Value = serde_json::from_slice(body).map_err(|e| {
            ClarityError::Decode(format!("submission response is not JSON: {}", e))
        })?;

        match json.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(JobHandle(id.clone())),
            Some(Value::Number(id)) => Ok(JobHandle(id.to_string())),
            _ => Err(ClarityError::Decode(
                "submission response carries no job id".into(),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
