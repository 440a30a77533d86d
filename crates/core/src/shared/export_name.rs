//! File naming of exported frames: `{base_name}_Frame-{position}.jpg`.

use crate::shared::constants::{EXPORT_EXTENSION, EXPORT_FRAME_MARKER};

pub fn format(base_name: &str, position: usize) -> String {
    format!("{base_name}{EXPORT_FRAME_MARKER}{position}.{EXPORT_EXTENSION}")
}

/// Splits an exported file name back into base name and position.
///
/// Accepts any image extension; the marker is searched from the right so
/// base names containing it still parse.
pub fn parse(file_name: &str) -> Option<(String, usize)> {
    let (stem, _ext) = file_name.rsplit_once('.')?;
    let (base, position) = stem.rsplit_once(EXPORT_FRAME_MARKER)?;
    if base.is_empty() {
        return None;
    }
    let position = position.parse().ok()?;
    Some((base.to_string(), position))
}
