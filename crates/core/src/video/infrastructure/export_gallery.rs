use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::export_name;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("export directory does not exist: {0}")]
    MissingDirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write thumbnail {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// An image file found in an export directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFrame {
    pub path: PathBuf,
    pub file_name: String,
    /// Present when the file name follows the export pattern.
    pub base_name: Option<String>,
    pub position: Option<usize>,
}

/// Lists image files in `dir`, sorted by file name.
pub fn list(dir: &Path) -> Result<Vec<ExportedFrame>, GalleryError> {
    if !dir.is_dir() {
        return Err(GalleryError::MissingDirectory(dir.to_path_buf()));
    }

    let read_err = |source| GalleryError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let parsed = export_name::parse(&file_name);
        entries.push(ExportedFrame {
            path,
            base_name: parsed.as_ref().map(|(base, _)| base.clone()),
            position: parsed.map(|(_, position)| position),
            file_name,
        });
    }

    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Writes a thumbnail of every entry into `out_dir`, keeping aspect ratio so
/// the longest side is `max_side` pixels. Returns the written paths in order.
pub fn write_thumbnails(
    entries: &[ExportedFrame],
    out_dir: &Path,
    max_side: u32,
    writer: &dyn ImageWriter,
) -> Result<Vec<PathBuf>, GalleryError> {
    fs::create_dir_all(out_dir).map_err(|source| GalleryError::Read {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let img = image::open(&entry.path)
            .map_err(|source| GalleryError::Decode {
                path: entry.path.clone(),
                source,
            })?
            .to_rgb8();
        let (w, h) = img.dimensions();
        let frame = Frame::new(img.into_raw(), w, h, 3, entry.position.unwrap_or(0));

        let target = out_dir.join(&entry.file_name);
        writer
            .write(&target, &frame, Some(fit_within(w, h, max_side)))
            .map_err(|source| GalleryError::Write {
                path: target.clone(),
                source,
            })?;
        log::debug!("Thumbnail written: {}", target.display());
        written.push(target);
    }
    Ok(written)
}

/// Scales `(width, height)` so the longest side equals `max_side`.
fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f64;
    let scale = max_side.max(1) as f64 / longest;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
