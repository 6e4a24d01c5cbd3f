use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::client::OpenAiClient;
use crate::pipeline::collaborators::ImageGenerator;

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,
    pub inference_steps: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            inference_steps: 16,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    response_format: &'static str,
    response_extension: &'static str,
    width: u32,
    height: u32,
    num_inference_steps: u32,
    seed: i64,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

/// Renders slide images through the Nebius images endpoint.
pub struct NebiusImageGenerator {
    client: OpenAiClient,
    model: String,
    settings: ImageSettings,
}

impl NebiusImageGenerator {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            settings: ImageSettings::default(),
        }
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ImageRequest<'a> {
        ImageRequest {
            model: &self.model,
            prompt,
            response_format: "b64_json",
            response_extension: "jpg",
            width: self.settings.width,
            height: self.settings.height,
            num_inference_steps: self.settings.inference_steps,
            // -1 asks the service for a random seed
            seed: -1,
        }
    }
}

#[async_trait]
impl ImageGenerator for NebiusImageGenerator {
    async fn generate(&self, image_prompt: &str) -> Result<Bytes> {
        let response: ImageResponse = self
            .client
            .post_json("images/generations", &self.request(image_prompt))
            .await?;
        decode_image(response)
    }
}

fn decode_image(response: ImageResponse) -> Result<Bytes> {
    let encoded = response
        .data
        .into_iter()
        .next()
        .and_then(|d| d.b64_json)
        .ok_or_else(|| anyhow!("Image service returned no image data"))?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Image payload is not valid base64")?;

    if bytes.is_empty() {
        return Err(anyhow!("Image service returned an empty image"));
    }
    Ok(Bytes::from(bytes))
}
