use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    multipart::{Form, Part},
    Client,
};

use super::request::{PreparedRequest, RequestHeaders, IMAGE_FIELD};
use crate::error::{ClarityError, Result};

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Only 200 counts: a 202 or other 2xx is not a finished result.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Remote diagnostic: pretty JSON when the body is JSON, raw text otherwise.
    pub fn error_detail(&self) -> String {
        serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| self.text())
    }
}

/// HTTP seam of the client; swapped for a scripted double in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs the multipart submission.
    async fn submit(&self, request: &PreparedRequest) -> Result<RawResponse>;

    /// GETs a job status URL.
    async fn poll(&self, url: &str, headers: &RequestHeaders) -> Result<RawResponse>;
}

pub struct ReqwestTransport {
    client: Client,
    poll_timeout: Duration,
}

impl ReqwestTransport {
    /// `poll_timeout` bounds each status GET. Submissions have no timeout:
    /// synchronous variants return their result in the POST response.
    pub fn new(poll_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClarityError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, poll_timeout))
    }

    /// Uses a caller-built client, e.g. one with proxy or TLS settings.
    pub fn with_client(client: Client, poll_timeout: Duration) -> Self {
        Self {
            client,
            poll_timeout,
        }
    }

    fn build_form(request: &PreparedRequest) -> Result<Form> {
        let mut form = request
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            });

        if let Some(png) = &request.image {
            let part = Part::bytes(png.clone())
                .file_name(IMAGE_FIELD)
                .mime_str("image/png")?;
            form = form.part(IMAGE_FIELD, part);
        }
        Ok(form)
    }

    async fn read(response: reqwest::Response) -> Result<RawResponse> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClarityError::Request(format!("Failed to read response: {}", e)))?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn submit(&self, request: &PreparedRequest) -> Result<RawResponse> {
        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(&request.url)
            .header(AUTHORIZATION, &request.headers.authorization)
            .header(ACCEPT, request.headers.accept)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClarityError::Request(format!("Clarity AI request failed: {}", e)))?;

        Self::read(response).await
    }

    async fn poll(&self, url: &str, headers: &RequestHeaders) -> Result<RawResponse> {
        let response = self
            .client
            .get(url)
            .timeout(self.poll_timeout)
            .header(AUTHORIZATION, &headers.authorization)
            .header(ACCEPT, headers.accept)
            .send()
            .await
            .map_err(|e| ClarityError::Request(format!("Clarity AI poll failed: {}", e)))?;

        Self::read(response).await
    }
}
