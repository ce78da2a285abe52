// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Export matched photos to a folder

use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::MatchedPhoto;
use crate::Result;

/// Write each photo under its original file name; clashes get `_1`, `_2`, ...
pub fn export_photos(photos: &[MatchedPhoto], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(photos.len());
    for photo in photos {
        let target = unique_path(dir, &safe_name(&photo.filename, &photo.id));
        std::fs::write(&target, &photo.blob)?;
        written.push(target);
    }

    info!("Exported {} photo(s) to {:?}", written.len(), dir);
    Ok(written)
}

// Stored names come from arbitrary folders; keep only the last component
fn safe_name(filename: &str, id: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{}.jpg", id))
}

fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(filename);
    let stem = name.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = name.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::similarity::Descriptor;
    use tempfile::tempdir;

    #[test]
    fn test_export_with_collisions() {
        let db = Database::in_memory().unwrap();
        db.add_photo("IMG_1.jpg", "/day1/IMG_1.jpg", b"one".to_vec(), Descriptor::new(vec![0.0]), 80.0).unwrap();
        db.add_photo("IMG_1.jpg", "/day2/IMG_1.jpg", b"two".to_vec(), Descriptor::new(vec![0.0]), 75.0).unwrap();
        db.add_photo("IMG_2.jpg", "/day2/IMG_2.jpg", b"three".to_vec(), Descriptor::new(vec![0.0]), 65.0).unwrap();

        let out = tempdir().unwrap();
        let written = export_photos(&db.get_all_photos().unwrap(), out.path()).unwrap();

        assert_eq!(written, vec![
            out.path().join("IMG_1.jpg"),
            out.path().join("IMG_1_1.jpg"),
            out.path().join("IMG_2.jpg"),
        ]);
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"two");
    }

    #[test]
    fn test_path_components_are_stripped() {
        assert_eq!(safe_name("../../etc/passwd", "id"), "passwd");
        assert_eq!(safe_name("", "abc"), "abc.jpg");
    }
}
