// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! photo-finder: Local Face-Matching Photo Finder
//!
//! Register your face from up to three angles, scan a folder of event photos,
//! and keep the ones you appear in. Images never leave the machine: descriptors
//! come from a local face-embedding service and matches live in a local SQLite cache.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod registration;
pub mod retry;
pub mod scanner;
pub mod similarity;
pub mod source;
pub mod web;

pub use config::AppConfig;
pub use error::{FinderError, Result};
