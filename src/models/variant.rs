use serde::{Deserialize, Serialize};

/// Result MIME class a node variant asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptKind {
    Image,
    Video,
}

impl AcceptKind {
    pub fn mime(&self) -> &'static str {
        match self {
            AcceptKind::Image => "image/*",
            AcceptKind::Video => "video/*",
        }
    }
}

/// One host node type: where it submits, whether it polls, what it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVariant {
    pub name: String,
    /// Submission path appended to the base URL.
    pub endpoint: String,
    /// Poll path appended to the base URL; the job id is appended to it.
    /// `None` means the submission answers with the terminal payload.
    pub poll_endpoint: Option<String>,
    pub accept: AcceptKind,
}

impl NodeVariant {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, accept: AcceptKind) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            poll_endpoint: None,
            accept,
        }
    }

    pub fn with_poll_endpoint(mut self, poll_endpoint: impl Into<String>) -> Self {
        self.poll_endpoint = Some(poll_endpoint.into());
        self
    }

    /// The Clarity AI upscaler: synchronous, returns an image.
    pub fn upscaler() -> Self {
        Self::new("ClarityAIUpscaler", "", AcceptKind::Image)
    }

    pub fn submit_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url, self.endpoint)
    }

    pub fn poll_url(&self, base_url: &str, job_id: &str) -> Option<String> {
        self.poll_endpoint
            .as_ref()
            .map(|poll| format!("{}{}{}", base_url, poll, job_id))
    }
}
