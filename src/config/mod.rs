// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for photo-finder

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::retry::RetryConfig;
use crate::similarity::DEFAULT_THRESHOLD;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Face-embedding engine configuration
    pub engine: EngineConfig,

    /// Match classification settings
    #[serde(default)]
    pub matching: MatchConfig,

    /// Folder scan settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Registered reference faces
    #[serde(default)]
    pub references: ReferenceConfig,

    /// Web gallery settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Scan history log
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    pub url: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_descriptor_len")]
    pub descriptor_len: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchConfig {
    /// Similarity cutoff on a 0-100 scale
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
    #[serde(default = "default_yield_ms")]
    pub yield_ms: u64,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_true")]
    pub skip_known: bool,
    #[serde(default)]
    pub include: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReferenceConfig {
    #[serde(default = "default_references_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_timeout() -> u64 { 60 }
fn default_retries() -> u32 { 2 }
fn default_descriptor_len() -> usize { 128 }
fn default_threshold() -> f32 { DEFAULT_THRESHOLD }
fn default_yield_every() -> usize { 10 }
fn default_yield_ms() -> u64 { 50 }
fn default_max_files() -> usize { 1000 }
fn default_max_dimension() -> u32 { 1024 }
fn default_true() -> bool { true }
fn default_references_path() -> String { "references.json".to_string() }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_db_path() -> String { "photo_finder.db".to_string() }
fn default_history_path() -> String { "scan_history.jsonl".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                url: "http://localhost:5500".to_string(),
                model: "face-recognition-128".to_string(),
                timeout_secs: default_timeout(),
                retries: default_retries(),
                descriptor_len: default_descriptor_len(),
            },
            matching: MatchConfig::default(),
            scan: ScanConfig::default(),
            references: ReferenceConfig::default(),
            web: WebConfig::default(),
            database: DatabaseConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { threshold: default_threshold() }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            yield_every: default_yield_every(),
            yield_ms: default_yield_ms(),
            recursive: false,
            max_files: default_max_files(),
            max_dimension: default_max_dimension(),
            skip_known: true,
            include: Vec::new(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self { path: default_references_path() }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { path: default_history_path() }
    }
}

impl EngineConfig {
    /// Retry policy for calls to the embedding service
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            retries: self.retries,
            ..RetryConfig::default()
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::FinderError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the scanner cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.matching.threshold;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(crate::FinderError::Config(format!(
                "matching.threshold must be in (0, 100], got {}",
                threshold
            )));
        }
        if self.scan.yield_every == 0 {
            return Err(crate::FinderError::Config("scan.yield_every must be at least 1".to_string()));
        }
        if self.scan.max_files == 0 {
            return Err(crate::FinderError::Config("scan.max_files must be at least 1".to_string()));
        }
        if self.engine.descriptor_len == 0 {
            return Err(crate::FinderError::Config("engine.descriptor_len must be at least 1".to_string()));
        }
        for pattern in &self.scan.include {
            glob::Pattern::new(pattern).map_err(|e| {
                crate::FinderError::Config(format!("Invalid include pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }
}
