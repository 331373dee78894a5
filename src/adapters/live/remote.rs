//! Live adapter for a Stable Diffusion HTTP service.

use reqwest::Client;
use tracing::debug;

use crate::error::GenError;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, GenerationRequest, ImageGenerator,
};

/// Calls `POST {base_url}/predict` and decodes the raw image bytes it returns.
pub struct RemoteGenerator {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl RemoteGenerator {
    /// Create a generator for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
        }
    }

    /// Send `token` as a bearer credential with every request.
    #[must_use]
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    /// The endpoint requests are posted to.
    #[must_use]
    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }
}

impl ImageGenerator for RemoteGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let url = self.predict_url();
            debug!(%url, steps = request.steps, guidance_scale = request.guidance_scale, "posting generation request");

            let mut builder = self.client.post(&url).json(&request);
            if let Some(ref token) = self.api_token {
                builder = builder.bearer_auth(token);
            }
            let response = builder.send().await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await?;
                return Err(GenError::Service { status: status.as_u16(), body });
            }

            let bytes = response.bytes().await?;
            debug!(len = bytes.len(), "received image body");
            GeneratedImage::decode(&bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let generator = RemoteGenerator::new("http://localhost:8000/");
        assert_eq!(generator.predict_url(), "http://localhost:8000/predict");
    }

    #[tokio::test]
    async fn success_returns_decoded_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(serde_json::json!({
                "prompt": "a red fox in snow",
                "num_inference_steps": 20,
                "guidance_scale": 7.5,
                "negative_prompt": "low quality, bad anatomy, worst quality, low resolution",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(512, 512)))
            .expect(1)
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri());
        let image = generator.generate(&GenerationRequest::new("a red fox in snow")).await.unwrap();
        assert_eq!((image.width(), image.height()), (512, 512));
    }

    #[tokio::test]
    async fn error_status_carries_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri());
        let err = generator.generate(&GenerationRequest::new("a cat")).await.unwrap_err();
        assert!(matches!(err, GenError::Service { status: 500, .. }));
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_string("definitely not a png"))
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri());
        let err = generator.generate(&GenerationRequest::new("a cat")).await.unwrap_err();
        assert!(matches!(err, GenError::Decode(_)));
    }

    #[tokio::test]
    async fn api_token_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(8, 4)))
            .expect(1)
            .mount(&server)
            .await;

        let generator =
            RemoteGenerator::new(&server.uri()).with_api_token(Some("secret".to_string()));
        let image = generator.generate(&GenerationRequest::new("a cat")).await.unwrap();
        assert_eq!((image.width(), image.height()), (8, 4));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        // Port 9 (discard) is not expected to host an HTTP server.
        let generator = RemoteGenerator::new("http://127.0.0.1:9");
        let err = generator.generate(&GenerationRequest::new("a cat")).await.unwrap_err();
        assert!(matches!(err, GenError::Network(_)));
    }
}
