pub mod request;
pub mod transport;

use std::sync::Arc;

use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::{
    config::ClarityConfig,
    error::{ClarityError, Result},
    logger,
    models::{
        AcceptKind, ImageTensor, JobHandle, NodeVariant, RequestParameters, ResultPayload,
        UpscaleOptions,
    },
};

pub use request::{build_request, normalize_fields, PreparedRequest, RequestHeaders};
pub use transport::{RawResponse, ReqwestTransport, Transport};

/// Submits node executions to the Clarity AI API.
///
/// One call issues its requests one after another: the submission, then for
/// polling variants a GET every `poll_interval` until the job finishes or
/// `timeout` has elapsed.
#[derive(Clone)]
pub struct ClarityClient {
    config: Arc<ClarityConfig>,
    transport: Arc<dyn Transport>,
}

impl ClarityClient {
    pub fn new(config: ClarityConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClarityConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClarityConfig {
        &self.config
    }

    pub async fn call(
        &self,
        variant: &NodeVariant,
        params: &RequestParameters,
    ) -> Result<ResultPayload> {
        let request_id = Uuid::new_v4();
        let request = build_request(&self.config, variant, params)?;

        log::info!(
            "[req:{}] Submitting {} to {} ({} fields, image: {})",
            request_id,
            variant.name,
            request.url,
            request.fields.len(),
            request.image.is_some()
        );

        let response = self.transport.submit(&request).await?;
        if !response.is_ok() {
            let detail = response.error_detail();
            log::error!(
                "[req:{}] Submission failed with status {}: {}",
                request_id,
                response.status,
                detail
            );
            return Err(ClarityError::from_status(response.status, detail));
        }

        if variant.poll_endpoint.is_none() {
            log::info!("[req:{}] Received terminal payload", request_id);
            return decode_payload(variant.accept, response.body);
        }

        let job = JobHandle::from_submission(&response.body)?;
        log::info!("[req:{}] Job {} accepted, polling", request_id, job);
        self.poll_job(request_id, variant, &job, &request.headers)
            .await
    }

    /// Upscales one image with the built-in upscaler variant.
    pub async fn upscale(&self, image: ImageTensor, options: UpscaleOptions) -> Result<ImageTensor> {
        let params = options.into_parameters(image);
        match self.call(&NodeVariant::upscaler(), &params).await? {
            ResultPayload::Image(image) => Ok(image),
            ResultPayload::Video(_) => Err(ClarityError::Decode(
                "upscaler returned video content".into(),
            )),
        }
    }

    /// Runs [`ClarityClient::call`] to completion on a private current-thread
    /// runtime. Must not be called from inside a tokio runtime.
    pub fn call_blocking(
        &self,
        variant: &NodeVariant,
        params: &RequestParameters,
    ) -> Result<ResultPayload> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClarityError::Config(format!("Failed to start runtime: {}", e)))?;
        runtime.block_on(self.call(variant, params))
    }

    async fn poll_job(
        &self,
        request_id: Uuid,
        variant: &NodeVariant,
        job: &JobHandle,
        headers: &RequestHeaders,
    ) -> Result<ResultPayload> {
        let url = variant
            .poll_url(&self.config.base_url, job.as_str())
            .ok_or_else(|| ClarityError::Config(format!("{} has no poll endpoint", variant.name)))?;

        let _timer = logger::timer(&format!("poll job {}", job));
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let response = self.transport.poll(&url, headers).await?;

            match response.status {
                200 => {
                    log::info!(
                        "[req:{}] Job {} finished after {} polls in {:.1}s",
                        request_id,
                        job,
                        attempts,
                        start.elapsed().as_secs_f64()
                    );
                    return decode_payload(variant.accept, response.body);
                }
                202 => {
                    let elapsed = start.elapsed();
                    if elapsed > self.config.timeout {
                        log::error!(
                            "[req:{}] Job {} still running after {:.1}s, giving up",
                            request_id,
                            job,
                            elapsed.as_secs_f64()
                        );
                        return Err(ClarityError::Timeout { elapsed });
                    }
                    log::debug!("[req:{}] Job {} pending (poll {})", request_id, job, attempts);
                    sleep(self.config.poll_interval).await;
                }
                status => {
                    let body = response.error_detail();
                    log::error!(
                        "[req:{}] Poll of job {} failed with status {}: {}",
                        request_id,
                        job,
                        status,
                        body
                    );
                    return Err(ClarityError::Api { status, body });
                }
            }
        }
    }
}

fn decode_payload(accept: AcceptKind, body: Vec<u8>) -> Result<ResultPayload> {
    match accept {
        AcceptKind::Image => ImageTensor::decode(&body).map(ResultPayload::Image),
        AcceptKind::Video => Ok(ResultPayload::Video(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::transport::tests::ScriptedTransport;
    use super::*;
    use crate::error::ErrorKind;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::time::Duration;

    const BASE: &str = "https://api.test";

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 128, 0, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn config() -> ClarityConfig {
        ClarityConfig::new().with_base_url(BASE).with_api_key("key")
    }

    fn client(transport: &Arc<ScriptedTransport>) -> ClarityClient {
        ClarityClient::with_transport(config(), transport.clone())
    }

    fn video_variant() -> NodeVariant {
        NodeVariant::new("ClarityVideo", "/video", AcceptKind::Video).with_poll_endpoint("/video/")
    }

    fn image_job_variant() -> NodeVariant {
        NodeVariant::new("ClarityAsync", "/async", AcceptKind::Image).with_poll_endpoint("/result/")
    }

    fn input() -> RequestParameters {
        RequestParameters::new().with_image(ImageTensor::filled(2, 2, 3, 0.5))
    }

    #[tokio::test]
    async fn test_terminal_png_is_decoded() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, png(3, 2))));

        let payload = client(&transport)
            .call(&NodeVariant::upscaler(), &input())
            .await
            .unwrap();

        let image = payload.into_image().expect("image payload");
        assert_eq!(image.as_array().dim(), (1, 2, 3, 4));
        assert!(image.as_array().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(image.as_array()[[0, 0, 0, 0]], 1.0);
        assert_eq!(transport.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_outgoing_request_shape() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, png(1, 1))));
        let params = input()
            .with("aspect_ratio", "4:3")
            .with("style_preset", "cinematic")
            .with("prompt", "crisp");

        client(&transport)
            .call(&NodeVariant::upscaler(), &params)
            .await
            .unwrap();

        let submitted = transport.submitted.lock().unwrap();
        let request = &submitted[0];
        assert_eq!(request.url, BASE);
        assert_eq!(request.headers.authorization, "key");
        assert_eq!(request.headers.accept, "image/*");
        assert_eq!(request.field("mode"), Some("image-to-image"));
        assert_eq!(request.field("comfyui"), Some("True"));
        assert_eq!(request.field("prompt"), Some("crisp"));
        assert!(request.field("aspect_ratio").is_none());
        assert!(request.field("style_preset").is_none());
        assert!(request.field("strength").is_none());
        assert!(request.image.is_some());
    }

    #[tokio::test]
    async fn test_missing_credentials_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ClarityClient::with_transport(
            ClarityConfig::new().with_base_url(BASE).with_api_key(""),
            transport.clone(),
        );

        let err = client
            .call(&NodeVariant::upscaler(), &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredentials);
        assert_eq!(transport.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_override_rescues_missing_key() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, png(1, 1))));
        let client = ClarityClient::with_transport(ClarityConfig::new(), transport.clone());

        client
            .call(&NodeVariant::upscaler(), &input().with_api_key_override("override"))
            .await
            .unwrap();
        assert_eq!(
            transport.submitted.lock().unwrap()[0].headers.authorization,
            "override"
        );
    }

    #[tokio::test]
    async fn test_submission_status_mapping() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Unauthorized),
            (402, ErrorKind::InsufficientCredits),
            (500, ErrorKind::Api),
        ];

        for (status, kind) in cases {
            let transport = Arc::new(
                ScriptedTransport::new().on_submit(RawResponse::new(status, r#"{"detail":"nope"}"#)),
            );
            let err = client(&transport)
                .call(&NodeVariant::upscaler(), &input())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), kind, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_accepted_submission_on_sync_variant_is_api_error() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(202, r#"{"detail":"queued, retry later"}"#)),
        );
        let err = client(&transport)
            .call(&NodeVariant::upscaler(), &input())
            .await
            .unwrap_err();

        match err {
            ClarityError::Api { status, body } => {
                assert_eq!(status, 202);
                assert!(body.contains("queued, retry later"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_request_carries_remote_body() {
        let transport = Arc::new(
            ScriptedTransport::new().on_submit(RawResponse::new(400, "scale_factor must be even")),
        );
        let err = client(&transport)
            .call(&NodeVariant::upscaler(), &input())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scale_factor must be even"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(
            ScriptedTransport::new().on_submit_error(ClarityError::Request("connection reset".into())),
        );
        let err = client(&transport)
            .call(&NodeVariant::upscaler(), &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_pending_then_done() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(200, r#"{"id":"job-42"}"#))
                .on_poll(RawResponse::new(202, Vec::new()))
                .on_poll(RawResponse::new(200, png(2, 2))),
        );

        let start = Instant::now();
        let payload = client(&transport)
            .call(&image_job_variant(), &input())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(payload.as_image().unwrap().as_array().dim(), (1, 2, 2, 4));
        assert_eq!(
            *transport.polled.lock().unwrap(),
            vec![format!("{}/result/job-42", BASE); 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(200, r#"{"id":"slow"}"#))
                .poll_forever(RawResponse::new(202, Vec::new())),
        );

        let err = client(&transport)
            .call(&image_job_variant(), &input())
            .await
            .unwrap_err();

        match err {
            ClarityError::Timeout { elapsed } => assert!(elapsed > Duration::from_secs(550)),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(transport.poll_count(), 57);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_honours_configured_cadence() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(200, r#"{"id":"fast"}"#))
                .poll_forever(RawResponse::new(202, Vec::new())),
        );
        let client = ClarityClient::with_transport(
            config()
                .with_poll_interval(Duration::from_secs(1))
                .with_timeout(Duration::from_secs(5)),
            transport.clone(),
        );

        let err = client.call(&image_job_variant(), &input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(transport.poll_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_carries_json_body() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(200, r#"{"id":"broken"}"#))
                .on_poll(RawResponse::new(202, Vec::new()))
                .on_poll(RawResponse::new(500, r#"{"error":"worker crashed"}"#)),
        );

        let err = client(&transport)
            .call(&image_job_variant(), &input())
            .await
            .unwrap_err();

        match err {
            ClarityError::Api { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("worker crashed"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_bytes_returned_verbatim() {
        let clip = b"\x00\x00\x00\x18ftypmp42".to_vec();
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_submit(RawResponse::new(200, r#"{"id":7}"#))
                .on_poll(RawResponse::new(200, clip.clone())),
        );

        let payload = client(&transport)
            .call(&video_variant(), &RequestParameters::new().with("prompt", "waves"))
            .await
            .unwrap();

        assert_eq!(payload.as_video(), Some(clip.as_slice()));
        let submitted = transport.submitted.lock().unwrap();
        assert_eq!(submitted[0].headers.accept, "video/*");
        assert_eq!(submitted[0].url, format!("{}/video", BASE));
        assert_eq!(*transport.polled.lock().unwrap(), vec![format!("{}/video/7", BASE)]);
    }

    #[tokio::test]
    async fn test_submission_without_job_id() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, "{}")));
        let err = client(&transport)
            .call(&image_job_variant(), &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert_eq!(transport.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_upscale_helper() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, png(4, 4))));
        let options = UpscaleOptions::new().with_prompt("detail");

        let image = client(&transport)
            .upscale(ImageTensor::filled(2, 2, 4, 1.0), options)
            .await
            .unwrap();
        assert_eq!(image.height(), 4);
        assert_eq!(
            transport.submitted.lock().unwrap()[0].field("style"),
            Some("default")
        );
    }

    #[test]
    fn test_call_blocking() {
        let transport = Arc::new(ScriptedTransport::new().on_submit(RawResponse::new(200, png(1, 1))));
        let payload = client(&transport)
            .call_blocking(&NodeVariant::upscaler(), &input())
            .unwrap();
        assert!(payload.as_image().is_some());
    }
}
