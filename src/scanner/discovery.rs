use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List the image files directly inside `directory`.
///
/// Sub-directories are not descended. Extensions are matched
/// case-insensitively. Results are sorted by path for consistent ordering.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        anyhow::bail!("Input directory not found: {}", directory.display());
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to list directory {}", directory.display()))?;
        let path = entry.path();

        if path.is_file() && has_image_extension(path, extensions) {
            images.push(path.to_path_buf());
        }
    }

    images.sort();

    Ok(images)
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.to_lowercase() == ext_lower)
        }
        None => false,
    }
}
