// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Face-embedding engine: model loading and descriptor extraction
//!
//! Detection, landmarks and descriptors are computed by a local embedding
//! service. This module prepares images, talks to the service, and makes sure
//! the model is loaded once per process.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::retry::{with_backoff_if, RetryConfig};
use crate::similarity::Descriptor;
use crate::{FinderError, Result};

/// Anything that can turn an image into a face descriptor
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Load the model if that has not happened yet
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Descriptor of the most prominent face, or `None` if no face was found
    async fn detect_single_face(&self, image: &DynamicImage) -> Result<Option<Descriptor>>;
}

/// Decode an image file into a bitmap
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let data = std::fs::read(path)?;
    decode_bytes(&data)
}

/// Decode in-memory image bytes into a bitmap
pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(data)?)
}

/// Downscale to `max_dimension` on the longest side and encode as JPEG
pub fn prepare_image(img: &DynamicImage, max_dimension: u32) -> Result<Vec<u8>> {
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle)
    } else {
        img.clone()
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    Ok(buffer)
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    model: &'a str,
    image: String,
    landmarks: bool,
    descriptor: bool,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

#[derive(Deserialize)]
struct DetectedFace {
    #[serde(default)]
    score: f32,
    descriptor: Vec<f32>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

/// HTTP client for the local face-embedding service
pub struct FaceEngineClient {
    client: Client,
    base_url: String,
    model: String,
    descriptor_len: usize,
    max_dimension: u32,
    retry: RetryConfig,
}

impl FaceEngineClient {
    /// Create a new engine client
    pub fn new(config: &EngineConfig, max_dimension: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.url.trim_end_matches('/').replace("/api/detect", "");

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            descriptor_len: config.descriptor_len,
            max_dimension,
            retry: config.retry_config(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the service is reachable
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/models", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                FinderError::ModelUnavailable(format!(
                    "Cannot connect to face engine at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List models the service can serve
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/models", self.base_url);
        let response = self.client.get(&url).send().await?;
        let models: ModelsResponse = response.json().await?;
        Ok(models.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if the configured model is available
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == &self.model || m.starts_with(&format!("{}:", self.model))))
    }

    async fn detect_once(&self, payload: &DetectRequest<'_>) -> Result<DetectResponse> {
        let url = format!("{}/api/detect", self.base_url);

        let response = self.client.post(&url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(FinderError::EngineStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Detect faces in an image and return the highest scoring descriptor
    pub async fn detect(&self, img: &DynamicImage) -> Result<Option<Descriptor>> {
        let jpeg = prepare_image(img, self.max_dimension)?;
        let payload = DetectRequest {
            model: &self.model,
            image: general_purpose::STANDARD.encode(&jpeg),
            landmarks: true,
            descriptor: true,
        };

        debug!("Sending detect request: model={}, {} bytes", self.model, jpeg.len());

        let response =
            with_backoff_if(&self.retry, || self.detect_once(&payload), FinderError::is_transient).await?;
        let best = pick_single_face(response.faces);

        match best {
            Some(values) if values.len() != self.descriptor_len => Err(FinderError::DimensionMismatch {
                expected: self.descriptor_len,
                actual: values.len(),
            }),
            Some(values) => Ok(Some(Descriptor::new(values))),
            None => Ok(None),
        }
    }
}

fn pick_single_face(faces: Vec<DetectedFace>) -> Option<Vec<f32>> {
    faces
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|f| f.descriptor)
}

/// Process-wide face model: the first caller loads it, everyone else reuses it
pub struct FaceModel {
    client: FaceEngineClient,
    loaded: OnceCell<()>,
}

impl FaceModel {
    pub fn new(client: FaceEngineClient) -> Self {
        Self {
            client,
            loaded: OnceCell::new(),
        }
    }

    pub fn from_config(config: &crate::AppConfig) -> Result<Self> {
        Ok(Self::new(FaceEngineClient::new(&config.engine, config.scan.max_dimension)?))
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.initialized()
    }

    pub fn client(&self) -> &FaceEngineClient {
        &self.client
    }

    /// Load the model (health check + availability), at most once
    pub async fn load_models(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                info!("Loading face model '{}' from {}", self.client.model(), self.client.base_url());
                self.client.health_check().await?;
                if !self.client.model_available().await? {
                    return Err(FinderError::ModelUnavailable(format!(
                        "Model '{}' is not served by {}",
                        self.client.model(),
                        self.client.base_url()
                    )));
                }
                info!("Face model ready");
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FaceEmbedder for FaceModel {
    async fn ensure_ready(&self) -> Result<()> {
        self.load_models().await
    }

    async fn detect_single_face(&self, image: &DynamicImage) -> Result<Option<Descriptor>> {
        self.load_models().await?;
        self.client.detect(image).await
    }
}
