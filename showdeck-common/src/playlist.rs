//! Playlist item types shared between the media controller and its clients

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// One entry in the operator's playlist
///
/// The playback engine never sees these; it is only ever handed the
/// `filepath`. Duration is populated lazily from engine DurationChanged
/// events once the item has actually been loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Stable entry id (items can share a filepath)
    pub id: Uuid,

    /// Absolute path handed to the playback engine on load
    pub filepath: String,

    /// Display name derived from the path
    pub filename: String,

    /// Media duration in seconds, unknown until first loaded
    pub duration: Option<f64>,

    /// Operator free-text notes for this item
    pub notes: String,
}

impl PlaylistItem {
    /// Create a new item from a file path, deriving the display name
    pub fn new(filepath: impl Into<String>) -> Self {
        let filepath = filepath.into();
        let filename = Path::new(&filepath)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.clone());

        Self {
            id: Uuid::new_v4(),
            filepath,
            filename,
            duration: None,
            notes: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_derivation() {
        let item = PlaylistItem::new("/media/show/clip.mp4");
        assert_eq!(item.filename, "clip.mp4");
        assert_eq!(item.filepath, "/media/show/clip.mp4");
        assert!(item.duration.is_none());
        assert!(item.notes.is_empty());
    }

    #[test]
    fn test_filename_falls_back_to_path() {
        let item = PlaylistItem::new("..");
        assert_eq!(item.filename, "..");
    }

    #[test]
    fn test_items_get_distinct_ids() {
        let a = PlaylistItem::new("/media/a.mp4");
        let b = PlaylistItem::new("/media/a.mp4");
        assert_ne!(a.id, b.id);
    }
}
