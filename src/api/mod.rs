mod types;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use image::ImageFormat;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub use types::*;

use crate::config::ApiConfig;
use crate::core::{GenerationError, GenerationRequest, GenerationResult, PainterError};
use crate::http_client;

/// Stable Diffusion API client
#[derive(Clone)]
pub struct DiffusionClient {
    http: Client,
    endpoint: String,
}

impl DiffusionClient {
    pub fn new(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Create a new client from the `[api]` config section
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Ok(Self::new(http_client::build(api)?, &api.endpoint))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one request/response cycle against the generation endpoint.
    ///
    /// Never retries; every outcome, including network failure, comes back
    /// as a `GenerationResult`.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let body = DreamboothRequest::from(request);

        tracing::debug!("Sending generate request to: {}", self.endpoint);
        let redacted = DreamboothRequest {
            key: "****",
            ..DreamboothRequest::from(request)
        };
        if let Ok(json) = serde_json::to_string_pretty(&redacted) {
            tracing::debug!("Request body: {}", json);
        }

        let response = match self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return transport_failure(e),
        };

        tracing::debug!("Response status: {}", status);
        tracing::debug!("Response body: {}", String::from_utf8_lossy(&bytes));

        let result = classify_body(&bytes);
        if let Some(err) = result.failure() {
            tracing::warn!("Generation failed (HTTP {}): {}", status, err);
        }
        result
    }

    /// Download an image URL into `output_dir` as `<stem>.<ext>`.
    ///
    /// The extension is sniffed from the image bytes.
    pub async fn download_image(&self, url: &str, output_dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).await?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch image: {}", url))?;

        if !response.status().is_success() {
            return Err(PainterError::DownloadFailed(format!(
                "HTTP {} for {}",
                response.status(),
                url
            ))
            .into());
        }

        let partial = output_dir.join(format!("{}.part", stem));
        let mut file = fs::File::create(&partial).await?;
        let mut head: Vec<u8> = Vec::with_capacity(32);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Image download interrupted")?;
            if head.len() < 32 {
                let take = (32 - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        if head.is_empty() {
            fs::remove_file(&partial).await.ok();
            return Err(PainterError::DownloadFailed(format!("empty body for {}", url)).into());
        }

        let path = output_dir.join(format!("{}.{}", stem, extension_for(&head, url)));
        fs::rename(&partial, &path).await?;

        tracing::info!("Saved image to: {}", path.display());
        Ok(path)
    }
}

fn transport_failure(err: reqwest::Error) -> GenerationResult {
    tracing::warn!("Generation request did not complete: {}", err);
    GenerationResult::Failure(GenerationError::Transport(err))
}

/// Decode a response body and classify it.
///
/// Success needs `status == "success"` and at least one output URL;
/// anything else that decodes is an unsuccessful generation.
pub fn classify_body(body: &[u8]) -> GenerationResult {
    let response: DreamboothResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(e) => return GenerationResult::Failure(GenerationError::Decode(e)),
    };

    match response {
        DreamboothResponse {
            status: Some(status),
            output: Some(urls),
            ..
        } if status == "success" && !urls.is_empty() => GenerationResult::Success { image_urls: urls },
        DreamboothResponse { status, message, .. } => {
            GenerationResult::Failure(GenerationError::Unsuccessful {
                status,
                message: message.map(|m| match m {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
            })
        }
    }
}

/// File extension for downloaded image bytes, falling back to the URL
fn extension_for(head: &[u8], url: &str) -> &'static str {
    match image::guess_format(head) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Gif) => "gif",
        _ => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            match path.rsplit('.').next().map(str::to_lowercase).as_deref() {
                Some("jpg") | Some("jpeg") => "jpg",
                Some("webp") => "webp",
                Some("gif") => "gif",
                _ => "png",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use serde_json::Value;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn test_client(server: &MockServer) -> DiffusionClient {
        let http = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        DiffusionClient::new(http, format!("{}/api/v3/dreambooth", server.uri()))
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("test_key", "a cosmic lighthouse")
    }

    async fn mock_reply(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/api/v3/dreambooth"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[test]
    fn test_body_has_exactly_the_wire_keys() {
        let req = GenerationRequest::new("k", "p").with_model("sdxl");
        let value = serde_json::to_value(DreamboothRequest::from(&req)).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "guidance_scale",
                "height",
                "key",
                "model_id",
                "negative_prompt",
                "num_inference_steps",
                "prompt",
                "samples",
                "width",
            ]
        );
        assert_eq!(obj["key"], "k");
        assert_eq!(obj["prompt"], "p");
        assert_eq!(obj["negative_prompt"], Value::Null);
        assert_eq!(obj["model_id"], "sdxl");
        assert_eq!(obj["guidance_scale"], 8);
        assert_eq!(obj["num_inference_steps"], 25);
        assert_eq!(obj["width"], 512);
        assert_eq!(obj["height"], 512);
        assert_eq!(obj["samples"], 1);
    }

    #[test]
    fn test_negative_prompt_serialized_as_string() {
        let req = GenerationRequest::new("k", "p").with_negative_prompt("blurry");
        let value = serde_json::to_value(DreamboothRequest::from(&req)).unwrap();
        assert_eq!(value["negative_prompt"], "blurry");
    }

    #[test]
    fn test_classify_body() {
        let ok = classify_body(br#"{"status":"success","output":["https://x/img.png"]}"#);
        assert_eq!(ok.image_urls(), &["https://x/img.png".to_string()]);

        let empty = classify_body(br#"{"status":"success","output":[]}"#);
        assert_eq!(empty.kind(), Some(FailureKind::Unsuccessful));

        let missing_output = classify_body(br#"{"status":"success"}"#);
        assert_eq!(missing_output.kind(), Some(FailureKind::Unsuccessful));

        let error = classify_body(br#"{"status":"error"}"#);
        assert_eq!(error.kind(), Some(FailureKind::Unsuccessful));

        let processing = classify_body(br#"{"status":"processing","output":["https://x/later.png"]}"#);
        assert_eq!(processing.kind(), Some(FailureKind::Unsuccessful));

        let no_fields = classify_body(b"{}");
        assert_eq!(no_fields.kind(), Some(FailureKind::Unsuccessful));

        let truncated = classify_body(br#"{"status":"succ"#);
        assert_eq!(truncated.kind(), Some(FailureKind::Decode));

        let wrong_shape = classify_body(br#"{"status":"success","output":"https://x/img.png"}"#);
        assert_eq!(wrong_shape.kind(), Some(FailureKind::Decode));

        let not_object = classify_body(b"[1,2,3]");
        assert_eq!(not_object.kind(), Some(FailureKind::Decode));
    }

    #[test]
    fn test_classify_keeps_service_message() {
        let result = classify_body(br#"{"status":"error","message":"Invalid API key"}"#);
        match result.failure() {
            Some(GenerationError::Unsuccessful { status, message }) => {
                assert_eq!(status.as_deref(), Some("error"));
                assert_eq!(message.as_deref(), Some("Invalid API key"));
            }
            other => panic!("unexpected failure {:?}", other),
        }

        let result = classify_body(br#"{"status":"error","message":{"prompt":["required"]}}"#);
        match result.failure() {
            Some(GenerationError::Unsuccessful { message, .. }) => {
                assert_eq!(message.as_deref(), Some(r#"{"prompt":["required"]}"#));
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/dreambooth"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "key": "test_key",
                "prompt": "a cosmic lighthouse",
                "negative_prompt": null,
                "model_id": "midjourney",
                "guidance_scale": 8,
                "num_inference_steps": 25,
                "width": 512,
                "height": 512,
                "samples": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "output": ["https://x/img.png"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server).generate(&request()).await;
        assert!(result.is_success());
        assert_eq!(result.first_image_url(), Some("https://x/img.png"));
    }

    #[tokio::test]
    async fn test_generate_empty_output() {
        let server = MockServer::start().await;
        mock_reply(
            &server,
            ResponseTemplate::new(200).set_body_string(r#"{"status":"success","output":[]}"#),
        )
        .await;

        let result = test_client(&server).generate(&request()).await;
        assert_eq!(result.kind(), Some(FailureKind::Unsuccessful));
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let server = MockServer::start().await;
        mock_reply(
            &server,
            ResponseTemplate::new(200).set_body_string(r#"{"status":"error"}"#),
        )
        .await;

        let result = test_client(&server).generate(&request()).await;
        assert_eq!(result.kind(), Some(FailureKind::Unsuccessful));
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let server = MockServer::start().await;
        mock_reply(
            &server,
            ResponseTemplate::new(200).set_body_string(r#"{"status":"success","out"#),
        )
        .await;

        let result = test_client(&server).generate(&request()).await;
        assert_eq!(result.kind(), Some(FailureKind::Decode));
    }

    #[tokio::test]
    async fn test_generate_http_error_classified_by_body() {
        let server = MockServer::start().await;
        mock_reply(
            &server,
            ResponseTemplate::new(500).set_body_string("Internal Server Error"),
        )
        .await;

        let result = test_client(&server).generate(&request()).await;
        assert_eq!(result.kind(), Some(FailureKind::Decode));
    }

    #[tokio::test]
    async fn test_generate_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = DiffusionClient::new(Client::new(), format!("http://127.0.0.1:{}/gen", port));

        let result = client.generate(&request()).await;
        assert_eq!(result.kind(), Some(FailureKind::Transport));
    }

    #[tokio::test]
    async fn test_generate_timeout() {
        let server = MockServer::start().await;
        mock_reply(
            &server,
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"success","output":["https://x/img.png"]}"#)
                .set_delay(Duration::from_secs(10)),
        )
        .await;

        let http = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let client = DiffusionClient::new(http, format!("{}/api/v3/dreambooth", server.uri()));

        let result = tokio::time::timeout(Duration::from_secs(5), client.generate(&request()))
            .await
            .expect("generate should not hang");
        assert_eq!(result.kind(), Some(FailureKind::Transport));
        assert!(result.failure().unwrap().is_timeout());
    }

    #[tokio::test]
    async fn test_repeated_calls_are_independent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/dreambooth"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","output":["https://x/a.png","https://x/b.png"]}"#,
            ))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let req = request();
        let first = client.generate(&req).await;
        let second = client.generate(&req).await;

        assert_eq!(first.image_urls(), second.image_urls());
        assert_eq!(first.image_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_download_sniffs_extension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/images/out"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_HEADER.to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = test_client(&server);
        let url = format!("{}/images/out", server.uri());

        let saved = client.download_image(&url, dir.path(), "ap_test_0").await.unwrap();
        assert_eq!(saved, dir.path().join("ap_test_0.jpg"));
        assert_eq!(std::fs::read(&saved).unwrap(), JPEG_HEADER);
        assert!(!dir.path().join("ap_test_0.part").exists());
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = format!("{}/missing.png", server.uri());
        let err = test_client(&server)
            .download_image(&url, dir.path(), "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(PNG_HEADER, "https://x/img"), "png");
        assert_eq!(extension_for(JPEG_HEADER, "https://x/img.png"), "jpg");
        assert_eq!(extension_for(b"????", "https://x/img.webp?sig=1"), "webp");
        assert_eq!(extension_for(b"????", "https://x/img"), "png");
    }
}
