// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Face-match batch scanner
//!
//! Walks a list of images one at a time: decode, extract a descriptor, compare
//! against the registered references, and store matches in the local cache.
//! A file that fails is logged and skipped; it never stops the scan.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::db::{content_hash, Database};
use crate::engine::{decode_bytes, FaceEmbedder};
use crate::similarity::{Classifier, Descriptor};
use crate::Result;

/// Live progress of a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStatus {
    pub is_processing: bool,
    /// 0-100
    pub progress: u8,
    pub current_file: String,
    pub total: usize,
    pub processed: usize,
    pub match_count: usize,
    pub failed: usize,
}

/// One matched image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMatch {
    /// Cache id; `None` when the image was already stored by an earlier scan
    pub id: Option<String>,
    pub path: PathBuf,
    pub similarity: f32,
}

/// Result of a whole scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub processed: usize,
    pub matched: usize,
    pub failed: usize,
    pub no_face: usize,
    pub skipped_known: usize,
    pub cancelled: bool,
    pub matches: Vec<ScanMatch>,
}

/// Pacing and storage knobs
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Pause after every N images (`i % N == 0`)
    pub yield_every: usize,
    pub yield_pause: Duration,
    /// Don't store a match whose bytes are already cached
    pub skip_known: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            yield_every: 10,
            yield_pause: Duration::from_millis(50),
            skip_known: true,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            yield_every: config.scan.yield_every.max(1),
            yield_pause: Duration::from_millis(config.scan.yield_ms),
            skip_known: config.scan.skip_known,
        }
    }
}

enum Outcome {
    NoFace,
    BelowThreshold(Option<f32>),
    Stored { id: String, similarity: f32 },
    AlreadyKnown { similarity: f32 },
}

/// Sequential photo scanner
pub struct Scanner<'a> {
    embedder: &'a dyn FaceEmbedder,
    db: &'a Database,
    classifier: Classifier,
    options: ScanOptions,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a> Scanner<'a> {
    pub fn new(embedder: &'a dyn FaceEmbedder, db: &'a Database, classifier: Classifier) -> Self {
        Self {
            embedder,
            db,
            classifier,
            options: ScanOptions::default(),
            shutdown: None,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop between files once the receiver reads `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Scan `files` against `references`, reporting progress after every step.
    ///
    /// Only a model load failure aborts the scan.
    pub async fn process_photos<F>(
        &self,
        files: &[PathBuf],
        references: &[Descriptor],
        mut on_progress: F,
    ) -> Result<ScanSummary>
    where
        F: FnMut(&ScanStatus),
    {
        let total = files.len();
        let mut status = ScanStatus {
            is_processing: true,
            total,
            ..Default::default()
        };
        let mut summary = ScanSummary {
            total,
            ..Default::default()
        };
        on_progress(&status);

        self.embedder.ensure_ready().await?;

        if references.is_empty() {
            info!("No reference faces registered; nothing can match");
        }

        for (i, path) in files.iter().enumerate() {
            if self.shutdown_requested() {
                info!("Scan cancelled after {} of {} images", i, total);
                summary.cancelled = true;
                break;
            }

            status.current_file = display_name(path);
            status.progress = percent(i, total);
            on_progress(&status);

            match self.process_one(path, references).await {
                Ok(Outcome::Stored { id, similarity }) => {
                    debug!("Match {:?} ({:.1})", path, similarity);
                    summary.matches.push(ScanMatch { id: Some(id), path: path.clone(), similarity });
                }
                Ok(Outcome::AlreadyKnown { similarity }) => {
                    debug!("Match {:?} ({:.1}) already cached", path, similarity);
                    summary.skipped_known += 1;
                    summary.matches.push(ScanMatch { id: None, path: path.clone(), similarity });
                }
                Ok(Outcome::BelowThreshold(similarity)) => {
                    debug!("No match {:?} (best {:?})", path, similarity);
                }
                Ok(Outcome::NoFace) => {
                    debug!("No face in {:?}", path);
                    summary.no_face += 1;
                }
                Err(e) => {
                    error!("Error processing {:?}: {}", path, e);
                    summary.failed += 1;
                }
            }

            if i % self.options.yield_every.max(1) == 0 && !self.options.yield_pause.is_zero() {
                tokio::time::sleep(self.options.yield_pause).await;
            }

            summary.processed = i + 1;
            summary.matched = summary.matches.len();
            status.processed = summary.processed;
            status.match_count = summary.matched;
            status.failed = summary.failed;
            on_progress(&status);
        }

        status.is_processing = false;
        if !summary.cancelled {
            status.progress = 100;
            status.current_file.clear();
        }
        on_progress(&status);

        info!(
            "Scan finished: {} processed, {} matched, {} failed",
            summary.processed, summary.matched, summary.failed
        );

        Ok(summary)
    }

    async fn process_one(&self, path: &Path, references: &[Descriptor]) -> Result<Outcome> {
        let bytes = tokio::fs::read(path).await?;
        let img = decode_bytes(&bytes)?;

        let descriptor = match self.embedder.detect_single_face(&img).await? {
            Some(d) => d,
            None => return Ok(Outcome::NoFace),
        };
        drop(img);

        let decision = self.classifier.classify(&descriptor, references)?;
        let similarity = match decision.similarity {
            Some(s) if decision.is_match => s,
            other => return Ok(Outcome::BelowThreshold(other)),
        };

        if self.options.skip_known && self.db.find_by_hash(&content_hash(&bytes))?.is_some() {
            return Ok(Outcome::AlreadyKnown { similarity });
        }

        let photo = self.db.add_photo(
            &display_name(path),
            &path.to_string_lossy(),
            bytes,
            descriptor,
            similarity,
        )?;

        Ok(Outcome::Stored { id: photo.id, similarity })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round() as u8
}
