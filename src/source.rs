// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Folder selection: which files in a directory get scanned

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{FinderError, Result};

/// Extensions treated as images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// How to walk a folder
#[derive(Debug, Clone)]
pub struct SelectOptions {
    pub recursive: bool,
    pub include: Vec<String>,
    pub max_files: usize,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            include: Vec::new(),
            max_files: 1000,
        }
    }
}

impl SelectOptions {
    pub fn from_config(scan: &crate::config::ScanConfig) -> Self {
        Self {
            recursive: scan.recursive,
            include: scan.include.clone(),
            max_files: scan.max_files,
        }
    }
}

/// Images picked from a folder
#[derive(Debug, Clone, Default)]
pub struct ImageSelection {
    pub images: Vec<PathBuf>,
    /// Files dropped because they are not images
    pub excluded: usize,
    /// Images dropped by the `max_files` cap
    pub truncated: usize,
}

/// Check the file name for hidden, temporary and system files
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if filename.starts_with('.') {
        return false;
    }

    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    let skip_names = ["desktop.ini", "thumbs.db"];
    !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
}

/// Check whether the extension is a supported image type
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Collect the images to scan from `dir`
pub fn collect_images(dir: &Path, options: &SelectOptions) -> Result<ImageSelection> {
    if !dir.is_dir() {
        return Err(FinderError::FileSystem(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }

    let patterns = options
        .include
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| FinderError::Config(format!("Invalid include pattern '{}': {}", p, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    walk(dir, options.recursive, &mut files)?;
    files.sort();

    let mut selection = ImageSelection::default();
    for file in files {
        if !should_process(&file) {
            debug!("Skipping {:?}", file);
            continue;
        }
        if !is_image(&file) {
            selection.excluded += 1;
            continue;
        }
        if !patterns.is_empty() && !matches_any(&patterns, dir, &file) {
            continue;
        }
        selection.images.push(file);
    }

    if selection.excluded > 0 {
        info!("Excluded {} non-image file(s)", selection.excluded);
    }

    if selection.images.is_empty() {
        return Err(FinderError::NoImages(dir.display().to_string()));
    }

    if selection.images.len() > options.max_files {
        selection.truncated = selection.images.len() - options.max_files;
        selection.images.truncate(options.max_files);
        warn!(
            "Folder has more than {} images, {} left out",
            options.max_files, selection.truncated
        );
    }

    Ok(selection)
}

fn matches_any(patterns: &[Pattern], root: &Path, file: &Path) -> bool {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let name = file.file_name().map(Path::new).unwrap_or(relative);
    patterns.iter().any(|p| p.matches_path(relative) || p.matches_path(name))
}

fn walk(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                walk(&path, true, files)?;
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_should_process() {
        assert!(should_process(Path::new("/tmp/IMG_0001.JPG")));
        assert!(!should_process(Path::new("/tmp/.hidden.jpg")));
        assert!(!should_process(Path::new("/tmp/photo.jpg.part")));
        assert!(!should_process(Path::new("/tmp/Thumbs.db")));
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a.jpeg")));
        assert!(is_image(Path::new("a.PNG")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }

    #[test]
    fn test_collects_images_and_counts_excluded() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.jpg");
        touch(dir.path(), "a.png");
        touch(dir.path(), "readme.txt");
        touch(dir.path(), "nested/c.jpg");

        let selection = collect_images(dir.path(), &SelectOptions::default()).unwrap();
        let names: Vec<_> = selection
            .images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
        assert_eq!(selection.excluded, 1);
    }

    #[test]
    fn test_recursive_walk() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "day2/b.jpg");

        let options = SelectOptions { recursive: true, ..Default::default() };
        assert_eq!(collect_images(dir.path(), &options).unwrap().images.len(), 2);
    }

    #[test]
    fn test_include_patterns() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "stage_01.jpg");
        touch(dir.path(), "crowd_01.jpg");

        let options = SelectOptions { include: vec!["stage_*".to_string()], ..Default::default() };
        let selection = collect_images(dir.path(), &options).unwrap();
        assert_eq!(selection.images, vec![dir.path().join("stage_01.jpg")]);
    }

    #[test]
    fn test_no_images_is_error() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        let err = collect_images(dir.path(), &SelectOptions::default()).unwrap_err();
        assert!(matches!(err, FinderError::NoImages(_)));
    }

    #[test]
    fn test_max_files_cap() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("{}.jpg", i));
        }
        let options = SelectOptions { max_files: 3, ..Default::default() };
        let selection = collect_images(dir.path(), &options).unwrap();
        assert_eq!(selection.images.len(), 3);
        assert_eq!(selection.truncated, 2);
    }
}
