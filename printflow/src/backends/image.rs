//! HTTP image generation backend.
//!
//! Google Gemini is the primary provider (returns inline base64 image data);
//! fal.ai Flux is the fallback when only a fal key is configured.

use async_trait::async_trait;
use base64::Engine as _;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{ImageArtifact, ImageBackend};
use crate::config::PipelineConfig;
use crate::errors::BackendError;
use crate::prompt::build_prompt;
use crate::request::ImageStyle;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

/// Image generation over HTTP: Gemini primary, fal.ai fallback.
#[derive(Debug, Clone)]
pub struct HttpImageBackend {
    client: reqwest::Client,
    gemini_api_key: String,
    fal_key: String,
    fal_base_url: String,
    output_dir: PathBuf,
}

impl HttpImageBackend {
    /// Creates a backend from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            client,
            gemini_api_key: config.gemini_api_key.clone(),
            fal_key: config.fal_key.clone(),
            fal_base_url: config.fal_base_url.clone(),
            output_dir: config.output_dir.clone(),
        })
    }

    fn save_path(&self) -> PathBuf {
        self.output_dir.join(format!("image_{}.png", Uuid::new_v4()))
    }

    async fn generate_gemini(&self, prompt: &str) -> Result<ImageArtifact, BackendError> {
        let url = format!("{GEMINI_BASE_URL}/models/{GEMINI_MODEL}:generateContent");
        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": format!("Generate an image: {prompt}")}]}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.gemini_api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(Some(status.as_u16()), body));
        }

        let data: serde_json::Value = response.json().await?;
        let parts = data["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| BackendError::decode(format!("no candidates in response: {data}")))?;

        let image_b64 = parts
            .iter()
            .find_map(|part| part["inlineData"]["data"].as_str())
            .ok_or_else(|| {
                // The model may answer in text explaining why no image came back.
                let text: String = parts
                    .iter()
                    .filter_map(|part| part["text"].as_str())
                    .collect();
                BackendError::decode(format!("no image data in response; model said: {text}"))
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image_b64)
            .map_err(|err| BackendError::decode(format!("bad base64 image data: {err}")))?;

        let path = self.save_path();
        write_bytes(&path, &bytes)?;

        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), serde_json::json!("gemini"));
        metadata.insert("model".to_string(), serde_json::json!(GEMINI_MODEL));

        Ok(ImageArtifact {
            url: path.display().to_string(),
            local_path: Some(path),
            prompt: String::new(),
            original_prompt: String::new(),
            width: 1024,
            height: 1024,
            metadata,
        })
    }

    async fn generate_fal(&self, prompt: &str) -> Result<ImageArtifact, BackendError> {
        let response = self
            .client
            .post(format!("{}/fal-ai/flux/dev", self.fal_base_url))
            .header("Authorization", format!("Key {}", self.fal_key))
            .json(&serde_json::json!({
                "prompt": prompt,
                "image_size": "square",
                "num_images": 1,
                "enable_safety_checker": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(Some(status.as_u16()), body));
        }

        let data: serde_json::Value = response.json().await?;
        let image_url = data["images"][0]["url"]
            .as_str()
            .ok_or_else(|| BackendError::decode(format!("no image url in response: {data}")))?
            .to_string();

        let local_path = match self.download(&image_url).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(%err, "could not save a local copy of the generated image");
                None
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), serde_json::json!("fal"));
        metadata.insert("model".to_string(), serde_json::json!("flux-dev"));

        Ok(ImageArtifact {
            url: image_url,
            local_path,
            prompt: String::new(),
            original_prompt: String::new(),
            width: 1024,
            height: 1024,
            metadata,
        })
    }

    async fn download(&self, url: &str) -> Result<PathBuf, BackendError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::api(Some(status.as_u16()), "image download failed"));
        }
        let bytes = response.bytes().await?;

        let path = self.save_path();
        write_bytes(&path, &bytes)?;
        Ok(path)
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn generate(
        &self,
        prompt: &str,
        style: ImageStyle,
    ) -> Result<ImageArtifact, BackendError> {
        let full_prompt = build_prompt(prompt, style);
        tracing::debug!(style = %style, "generating image");

        let mut artifact = if !self.gemini_api_key.is_empty() {
            self.generate_gemini(&full_prompt).await?
        } else if !self.fal_key.is_empty() {
            self.generate_fal(&full_prompt).await?
        } else {
            return Err(BackendError::api(
                None,
                "no image generation API configured; set GEMINI_API_KEY or FAL_KEY",
            ));
        };

        artifact.original_prompt = prompt.to_string();
        artifact.prompt = full_prompt;
        artifact
            .metadata
            .insert("style".to_string(), serde_json::json!(style.as_str()));
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(config: &PipelineConfig) -> HttpImageBackend {
        HttpImageBackend::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_backend_fails_without_network() {
        let config = PipelineConfig::default();
        let err = backend(&config)
            .generate("a cute robot", ImageStyle::Figurine)
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Api { status: None, .. }));
        assert!(err.to_string().contains("no image generation API configured"));
    }

    #[test]
    fn test_save_path_lands_in_output_dir() {
        let config = PipelineConfig::default().with_output_dir("/tmp/printflow-test");
        let path = backend(&config).save_path();
        assert!(path.starts_with("/tmp/printflow-test"));
        assert_eq!(path.extension().unwrap(), "png");
    }
}
