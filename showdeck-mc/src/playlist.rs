//! Playlist manager - ordered media sequence plus the current-item cursor
//!
//! Exclusively owns the ordering and the cursor. The playback engine never
//! holds a reference into the playlist; it only ever receives a filepath
//! string at load time. Cursor movements are announced on the event bus as
//! CurrentItemChanged, carrying the item or None when the list empties.

use showdeck_common::events::{EventBus, ShowdeckEvent};
use showdeck_common::playlist::PlaylistItem;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct PlaylistState {
    items: Vec<PlaylistItem>,
    current: Option<usize>,
}

/// Ordered playlist with a single current-item cursor
pub struct PlaylistManager {
    bus: Arc<EventBus>,
    inner: RwLock<PlaylistState>,
}

impl PlaylistManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            inner: RwLock::new(PlaylistState {
                items: Vec::new(),
                current: None,
            }),
        }
    }

    /// Append a file to the playlist
    ///
    /// Nonexistent paths are ignored, matching drag-and-drop intake where
    /// stale paths are routine. The first successful add selects itself, so
    /// an operator always has a current item once the list is non-empty.
    pub async fn add(&self, filepath: &str) -> Option<PlaylistItem> {
        if !Path::new(filepath).exists() {
            warn!("Ignoring playlist add for missing file: {}", filepath);
            return None;
        }

        let item = PlaylistItem::new(filepath);
        let select_first = {
            let mut state = self.inner.write().await;
            state.items.push(item.clone());
            state.current.is_none()
        };
        debug!("Added {} to playlist", item.filename);

        if select_first {
            self.set_current_index(0).await;
        }
        Some(item)
    }

    /// Remove the item at `index`; returns whether anything was removed
    ///
    /// The cursor follows the list: removing before it shifts it back,
    /// removing the current item re-selects the same slot (or the new last
    /// item), and emptying the list clears it entirely.
    pub async fn remove(&self, index: usize) -> bool {
        let announce = {
            let mut state = self.inner.write().await;
            if index >= state.items.len() {
                return false;
            }
            state.items.remove(index);

            match state.current {
                Some(_) if state.items.is_empty() => {
                    state.current = None;
                    Some(None)
                }
                Some(current) if index < current => {
                    state.current = Some(current - 1);
                    None
                }
                Some(current) if index == current => {
                    let new_index = current.min(state.items.len() - 1);
                    state.current = Some(new_index);
                    Some(Some(state.items[new_index].clone()))
                }
                _ => None,
            }
        };

        if let Some(item) = announce {
            self.emit_current(item);
        }
        true
    }

    /// The item under the cursor, if any
    pub async fn current(&self) -> Option<PlaylistItem> {
        let state = self.inner.read().await;
        state.current.map(|i| state.items[i].clone())
    }

    /// The cursor position, if any
    pub async fn current_index(&self) -> Option<usize> {
        self.inner.read().await.current
    }

    /// Snapshot of the full ordered list
    pub async fn items(&self) -> Vec<PlaylistItem> {
        self.inner.read().await.items.clone()
    }

    /// Advance the cursor; returns whether advancement occurred
    pub async fn next(&self) -> bool {
        let target = {
            let state = self.inner.read().await;
            match state.current {
                Some(i) if i + 1 < state.items.len() => Some(i + 1),
                _ => None,
            }
        };
        match target {
            Some(i) => self.set_current_index(i).await,
            None => false,
        }
    }

    /// Move the cursor back; returns whether movement occurred
    pub async fn previous(&self) -> bool {
        let target = {
            let state = self.inner.read().await;
            match state.current {
                Some(i) if i > 0 => Some(i - 1),
                _ => None,
            }
        };
        match target {
            Some(i) => self.set_current_index(i).await,
            None => false,
        }
    }

    /// Move the cursor to `index`, announcing the newly selected item
    pub async fn set_current_index(&self, index: usize) -> bool {
        let item = {
            let mut state = self.inner.write().await;
            if index >= state.items.len() {
                return false;
            }
            state.current = Some(index);
            state.items[index].clone()
        };
        self.emit_current(Some(item));
        true
    }

    /// Record the duration the engine discovered for the current item
    ///
    /// Duration arrives lazily via DurationChanged events; the playlist is
    /// where it sticks so the operator sees it without reloading.
    pub async fn set_current_duration(&self, duration: f64) {
        let mut state = self.inner.write().await;
        if let Some(index) = state.current {
            state.items[index].duration = Some(duration);
        }
    }

    /// Attach operator notes to the item at `index`
    pub async fn set_notes(&self, index: usize, notes: String) -> bool {
        let mut state = self.inner.write().await;
        match state.items.get_mut(index) {
            Some(item) => {
                item.notes = notes;
                true
            }
            None => false,
        }
    }

    fn emit_current(&self, item: Option<PlaylistItem>) {
        self.bus.emit_lossy(ShowdeckEvent::CurrentItemChanged {
            item,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn media_dir(names: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            File::create(dir.path().join(name)).unwrap();
        }
        dir
    }

    fn path(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    fn manager() -> (PlaylistManager, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(100));
        (PlaylistManager::new(Arc::clone(&bus)), bus)
    }

    #[tokio::test]
    async fn test_add_ignores_missing_files() {
        let (playlist, _bus) = manager();
        assert!(playlist.add("/nonexistent/clip.mp4").await.is_none());
        assert!(playlist.items().await.is_empty());
        assert!(playlist.current().await.is_none());
    }

    #[tokio::test]
    async fn test_first_add_selects_itself() {
        let dir = media_dir(&["a.mp4", "b.mp4"]);
        let (playlist, bus) = manager();
        let mut rx = bus.subscribe();

        playlist.add(&path(&dir, "a.mp4")).await.unwrap();
        playlist.add(&path(&dir, "b.mp4")).await.unwrap();

        assert_eq!(playlist.current_index().await, Some(0));
        assert_eq!(playlist.current().await.unwrap().filename, "a.mp4");

        // Exactly one selection event: the second add does not move the cursor
        match rx.try_recv().unwrap() {
            ShowdeckEvent::CurrentItemChanged { item, .. } => {
                assert_eq!(item.unwrap().filename, "a.mp4")
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_next_and_previous_report_advancement() {
        let dir = media_dir(&["a.mp4", "b.mp4"]);
        let (playlist, _bus) = manager();
        playlist.add(&path(&dir, "a.mp4")).await;
        playlist.add(&path(&dir, "b.mp4")).await;

        assert!(!playlist.previous().await, "already at the start");
        assert!(playlist.next().await);
        assert_eq!(playlist.current_index().await, Some(1));
        assert!(!playlist.next().await, "already at the end");
        assert!(playlist.previous().await);
        assert_eq!(playlist.current_index().await, Some(0));
    }

    #[tokio::test]
    async fn test_set_current_index_bounds() {
        let dir = media_dir(&["a.mp4"]);
        let (playlist, _bus) = manager();
        playlist.add(&path(&dir, "a.mp4")).await;

        assert!(playlist.set_current_index(0).await);
        assert!(!playlist.set_current_index(5).await);
        assert_eq!(playlist.current_index().await, Some(0));
    }

    #[tokio::test]
    async fn test_remove_before_cursor_shifts_it() {
        let dir = media_dir(&["a.mp4", "b.mp4", "c.mp4"]);
        let (playlist, _bus) = manager();
        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            playlist.add(&path(&dir, name)).await;
        }
        playlist.set_current_index(2).await;

        assert!(playlist.remove(0).await);
        assert_eq!(playlist.current_index().await, Some(1));
        assert_eq!(playlist.current().await.unwrap().filename, "c.mp4");
    }

    #[tokio::test]
    async fn test_remove_current_reselects_same_slot() {
        let dir = media_dir(&["a.mp4", "b.mp4", "c.mp4"]);
        let (playlist, _bus) = manager();
        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            playlist.add(&path(&dir, name)).await;
        }
        playlist.set_current_index(1).await;

        assert!(playlist.remove(1).await);
        assert_eq!(playlist.current().await.unwrap().filename, "c.mp4");
    }

    #[tokio::test]
    async fn test_removing_last_item_announces_empty_list() {
        let dir = media_dir(&["a.mp4"]);
        let (playlist, bus) = manager();
        playlist.add(&path(&dir, "a.mp4")).await;

        let mut rx = bus.subscribe();
        assert!(playlist.remove(0).await);
        assert!(playlist.current().await.is_none());

        match rx.try_recv().unwrap() {
            ShowdeckEvent::CurrentItemChanged { item, .. } => assert!(item.is_none()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_out_of_range() {
        let (playlist, _bus) = manager();
        assert!(!playlist.remove(0).await);
    }

    #[tokio::test]
    async fn test_duration_and_notes_enrichment() {
        let dir = media_dir(&["a.mp4"]);
        let (playlist, _bus) = manager();
        playlist.add(&path(&dir, "a.mp4")).await;

        playlist.set_current_duration(93.5).await;
        assert!(playlist.set_notes(0, "opening act".to_string()).await);
        assert!(!playlist.set_notes(9, "nope".to_string()).await);

        let item = playlist.current().await.unwrap();
        assert_eq!(item.duration, Some(93.5));
        assert_eq!(item.notes, "opening act");
    }
}
