// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scan history log (one JSON line per completed scan)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::scanner::ScanSummary;
use crate::Result;

/// A finished scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub folder: PathBuf,
    pub threshold: f32,
    pub total: usize,
    pub processed: usize,
    pub matched: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl ScanRecord {
    pub fn from_summary(
        folder: &Path,
        threshold: f32,
        started_at: DateTime<Utc>,
        summary: &ScanSummary,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            folder: folder.to_path_buf(),
            threshold,
            total: summary.total,
            processed: summary.processed,
            matched: summary.matched,
            failed: summary.failed,
            cancelled: summary.cancelled,
        }
    }
}

/// Append-only scan log
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append a record to the log
    pub fn append(&self, record: &ScanRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all records, skipping unreadable lines
    pub fn read_all(&self) -> Result<Vec<ScanRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(records)
    }

    /// Get the most recent N records (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<ScanRecord>> {
        let mut records = self.read_all()?;
        records.reverse();
        records.truncate(count);
        Ok(records)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
