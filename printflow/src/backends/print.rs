//! HTTP print service backend (Shapeways).
//!
//! Acquires a client-credentials access token, caches it until expiry,
//! uploads meshes as base64 JSON bodies, and parses material pricing.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::path::Path;

use super::{Material, ModelUpload, PriceSheet, PrintBackend};
use crate::config::PipelineConfig;
use crate::errors::BackendError;

/// Seconds shaved off the advertised token lifetime.
const TOKEN_EXPIRY_BUFFER_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Print service client for the Shapeways API.
#[derive(Debug)]
pub struct ShapewaysBackend {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl ShapewaysBackend {
    /// Creates a backend from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self, BackendError> {
        // Uploads can be slow; reuse the configured long timeout.
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.shapeways_base_url.clone(),
            client_id: config.shapeways_client_id.clone(),
            client_secret: config.shapeways_client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    async fn ensure_token(&self) -> Result<String, BackendError> {
        if let Some(token) = self.token.lock().clone() {
            if token.is_valid() {
                return Ok(token.access_token);
            }
        }

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(
                Some(status.as_u16()),
                format!("failed to get access token: {body}"),
            ));
        }

        let data: serde_json::Value = response.json().await?;
        let access_token = data["access_token"]
            .as_str()
            .ok_or_else(|| BackendError::decode("no access_token in token response"))?
            .to_string();
        let expires_in = data["expires_in"].as_i64().unwrap_or(3600);

        let cached = CachedToken {
            access_token: access_token.clone(),
            expires_at: Utc::now()
                + ChronoDuration::seconds(expires_in - TOKEN_EXPIRY_BUFFER_SECONDS),
        };
        *self.token.lock() = Some(cached);

        Ok(access_token)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, BackendError> {
        let token = self.ensure_token().await?;

        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(token);
        if let Some(json) = body {
            builder = builder.json(&json);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(Some(status.as_u16()), body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PrintBackend for ShapewaysBackend {
    async fn upload(&self, mesh_path: &Path) -> Result<ModelUpload, BackendError> {
        if !mesh_path.exists() {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", mesh_path.display()),
            )));
        }

        let filename = mesh_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.stl")
            .to_string();

        // The API takes the file inline, base64-encoded in a JSON body.
        let file_data = std::fs::read(mesh_path)?;
        let file_base64 = base64::engine::general_purpose::STANDARD.encode(file_data);

        let data = self
            .request(
                reqwest::Method::POST,
                "/models/v1",
                Some(serde_json::json!({
                    "fileName": filename,
                    "file": file_base64,
                    "description": "3D model uploaded via printflow",
                    "hasRightsToModel": 1,
                    "acceptTermsAndConditions": 1,
                })),
            )
            .await?;

        let model = data.get("model").unwrap_or(&data);
        let model_id = model["modelId"]
            .as_str()
            .map(str::to_string)
            .or_else(|| model["modelId"].as_u64().map(|id| id.to_string()))
            .ok_or_else(|| BackendError::decode(format!("no modelId in response: {data}")))?;

        let printability_issues = model["printabilityIssues"]
            .as_array()
            .map(|issues| {
                issues
                    .iter()
                    .filter_map(|issue| issue.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModelUpload {
            model_id,
            filename,
            file_version: model["fileVersion"].as_u64().unwrap_or(1) as u32,
            volume_cm3: model["volume"].as_f64(),
            surface_area_cm2: model["surfaceArea"].as_f64(),
            is_printable: model["isPrintable"].as_bool().unwrap_or(true),
            printability_issues,
            uploaded_at: Utc::now(),
        })
    }

    async fn pricing(&self, model_id: &str) -> Result<PriceSheet, BackendError> {
        let data = self
            .request(reqwest::Method::GET, &format!("/models/{model_id}/v1"), None)
            .await?;

        let materials: Vec<Material> = data["prices"]
            .as_array()
            .map(|prices| {
                prices
                    .iter()
                    .map(|item| Material {
                        id: item["materialId"]
                            .as_str()
                            .map(str::to_string)
                            .or_else(|| item["materialId"].as_u64().map(|id| id.to_string()))
                            .unwrap_or_default(),
                        name: item["material"].as_str().unwrap_or("Unknown").to_string(),
                        color: item["color"].as_str().unwrap_or_default().to_string(),
                        finish: item["finish"].as_str().unwrap_or_default().to_string(),
                        price: item["price"].as_f64().unwrap_or(0.0),
                        currency: item["currency"].as_str().unwrap_or("USD").to_string(),
                        min_wall_thickness_mm: item["minimumWallThickness"]
                            .as_f64()
                            .unwrap_or(0.0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(PriceSheet::new(model_id, materials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_validity() {
        let live = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + ChronoDuration::minutes(5),
        };
        assert!(live.is_valid());

        let stale = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() - ChronoDuration::seconds(1),
        };
        assert!(!stale.is_valid());
    }

    #[test]
    fn test_upload_missing_file_fails_locally() {
        let backend = ShapewaysBackend::new(&PipelineConfig::default()).unwrap();
        let err = tokio_test::block_on(backend.upload(Path::new("/nonexistent/model.stl")))
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
