// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Reference face registration (front, left and right angles)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::engine::{decode_image, FaceEmbedder};
use crate::similarity::Descriptor;
use crate::{FinderError, Result};

/// Head angle of a reference photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Angle {
    Front,
    Left,
    Right,
}

impl Angle {
    /// Registration order
    pub const ALL: [Angle; 3] = [Angle::Front, Angle::Left, Angle::Right];

    pub fn hint(&self) -> &'static str {
        match self {
            Angle::Front => "Look straight at the camera, face centred",
            Angle::Left => "Turn your head slightly to the left so your right ear shows",
            Angle::Right => "Turn your head slightly to the right so your left ear shows",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Angle::Front => "front",
            Angle::Left => "left",
            Angle::Right => "right",
        };
        f.pad(name)
    }
}

impl FromStr for Angle {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(Angle::Front),
            "left" => Ok(Angle::Left),
            "right" => Ok(Angle::Right),
            other => Err(FinderError::Reference(format!("Unknown angle '{}'", other))),
        }
    }
}

/// One registered face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFace {
    pub angle: Angle,
    pub descriptor: Descriptor,
    pub source: PathBuf,
    pub registered_at: DateTime<Utc>,
}

/// Registered faces, in front/left/right order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSet {
    faces: Vec<ReferenceFace>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; a missing file is an empty set
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&content)?;
        set.check_order()?;
        Ok(set)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Angle expected next, `None` once all three are in
    pub fn next_angle(&self) -> Option<Angle> {
        Angle::ALL.get(self.faces.len()).copied()
    }

    pub fn push(&mut self, face: ReferenceFace) -> Result<()> {
        match self.next_angle() {
            None => Err(FinderError::Reference("All three angles are already registered".to_string())),
            Some(expected) if expected != face.angle => Err(FinderError::Reference(format!(
                "Expected the {} angle next, got {}",
                expected, face.angle
            ))),
            Some(_) => {
                if let Some(first) = self.faces.first() {
                    if first.descriptor.len() != face.descriptor.len() {
                        return Err(FinderError::DimensionMismatch {
                            expected: first.descriptor.len(),
                            actual: face.descriptor.len(),
                        });
                    }
                }
                self.faces.push(face);
                Ok(())
            }
        }
    }

    pub fn faces(&self) -> &[ReferenceFace] {
        &self.faces
    }

    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.faces.iter().map(|f| f.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.faces.len() == Angle::ALL.len()
    }

    pub fn clear(&mut self) {
        self.faces.clear();
    }

    /// Fails if the stored descriptors were produced by a model with a different output size
    pub fn check_descriptor_len(&self, expected: usize) -> Result<()> {
        match self.faces.iter().find(|f| f.descriptor.len() != expected) {
            Some(face) => Err(FinderError::DimensionMismatch {
                expected,
                actual: face.descriptor.len(),
            }),
            None => Ok(()),
        }
    }

    fn check_order(&self) -> Result<()> {
        if self.faces.len() > Angle::ALL.len() {
            return Err(FinderError::Reference("More than three reference faces".to_string()));
        }
        for (face, expected) in self.faces.iter().zip(Angle::ALL) {
            if face.angle != expected {
                return Err(FinderError::Reference(format!(
                    "Reference file out of order: {} where {} was expected",
                    face.angle, expected
                )));
            }
        }
        Ok(())
    }
}

/// Extract the descriptor of the face in `path` for the given angle
pub async fn register_face(
    embedder: &dyn FaceEmbedder,
    path: &Path,
    angle: Angle,
) -> Result<ReferenceFace> {
    embedder.ensure_ready().await?;

    let img = decode_image(path)?;
    let descriptor = embedder
        .detect_single_face(&img)
        .await?
        .ok_or_else(|| FinderError::NoFaceDetected(path.display().to_string()))?;

    info!("Registered {} face from {:?}", angle, path);

    Ok(ReferenceFace {
        angle,
        descriptor,
        source: path.to_path_buf(),
        registered_at: Utc::now(),
    })
}
