use crate::models::{MediaDraft, MediaItem, MediaType};
use crate::store::StoreFacade;

/// Media items in the live snapshot. Everything returned is a copy.
pub struct CatalogStore<'a> {
    store: &'a StoreFacade,
}

impl<'a> CatalogStore<'a> {
    pub(crate) fn new(store: &'a StoreFacade) -> Self {
        Self { store }
    }

    /// All items in insertion order.
    pub async fn list(&self) -> Vec<MediaItem> {
        self.store.read(|s| s.media_items.clone()).await
    }

    pub async fn photos(&self) -> Vec<MediaItem> {
        self.of_type(MediaType::Photo).await
    }

    pub async fn videos(&self) -> Vec<MediaItem> {
        self.of_type(MediaType::Video).await
    }

    async fn of_type(&self, kind: MediaType) -> Vec<MediaItem> {
        self.store
            .read(|s| {
                s.media_items
                    .iter()
                    .filter(|m| m.media_type == kind)
                    .cloned()
                    .collect()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Option<MediaItem> {
        self.store
            .read(|s| s.media_items.iter().find(|m| m.id == id).cloned())
            .await
    }

    /// Appends a new item and saves. The item is returned even if the save
    /// fails; the outcome is published on [`StoreFacade::subscribe`].
    pub async fn insert(&self, draft: MediaDraft) -> MediaItem {
        let item = draft.materialize();
        self.store
            .mutate(|s| {
                s.media_items.push(item.clone());
                true
            })
            .await;
        tracing::info!(media_id = %item.id, media_type = ?item.media_type, "Media item added");
        item
    }

    /// Removes the first item with `id`. Returns false, and saves nothing,
    /// when no item matches.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self
            .store
            .mutate(|s| match s.media_items.iter().position(|m| m.id == id) {
                Some(pos) => {
                    s.media_items.remove(pos);
                    true
                }
                None => false,
            })
            .await
            .is_some();

        if removed {
            tracing::info!(media_id = %id, "Media item removed");
        } else {
            tracing::debug!(media_id = %id, "No media item to remove");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::MemoryBackend;
    use crate::domain::SnapshotBackend;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn ready_store() -> (StoreFacade, MemoryBackend) {
        let backend = MemoryBackend::new("local");
        let store = StoreFacade::new(vec![Arc::new(backend.clone()) as Arc<dyn SnapshotBackend>], "admin");
        store.initialize().await;
        (store, backend)
    }

    fn draft(kind: MediaType, cover: &str, urls: &[&str]) -> MediaDraft {
        MediaDraft {
            media_type: kind,
            cover_url: cover.to_string(),
            media_urls: urls.iter().map(|u| u.to_string()).collect(),
            description: "d".to_string(),
            credits: vec![],
        }
    }

    #[tokio::test]
    async fn insert_defaults_media_urls_and_appends() {
        let (store, _) = ready_store().await;
        let item = store
            .catalog()
            .insert(draft(MediaType::Photo, "https://x/1.jpg", &[]))
            .await;

        assert_eq!(item.media_urls, vec!["https://x/1.jpg".to_string()]);
        assert_eq!(item.media_type, MediaType::Photo);
        assert!(!item.id.is_empty());
        assert_eq!(store.catalog().list().await.last(), Some(&item));
    }

    #[tokio::test]
    async fn insert_keeps_supplied_media_urls() {
        let (store, _) = ready_store().await;
        let item = store
            .catalog()
            .insert(draft(MediaType::Video, "https://x/c.jpg", &["https://x/a.mp4", "https://x/b.mp4"]))
            .await;
        assert_eq!(item.media_urls, vec!["https://x/a.mp4", "https://x/b.mp4"]);
    }

    #[tokio::test]
    async fn inserted_ids_are_unique() {
        let (store, _) = ready_store().await;
        for n in 0..20 {
            store
                .catalog()
                .insert(draft(MediaType::Photo, &format!("https://x/{}.jpg", n), &[]))
                .await;
        }
        let items = store.catalog().list().await;
        let ids: HashSet<_> = items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), items.len());
    }

    #[tokio::test]
    async fn remove_existing_item() {
        let (store, backend) = ready_store().await;
        assert!(store.catalog().remove("photo-1").await);

        assert!(store.catalog().list().await.iter().all(|m| m.id != "photo-1"));
        assert!(store.catalog().get("photo-1").await.is_none());
        assert_eq!(backend.stored().unwrap().media_items.len(), 1);
    }

    #[tokio::test]
    async fn remove_unknown_item_changes_nothing() {
        let (store, backend) = ready_store().await;
        let before = store.catalog().list().await;
        let version = store.stats().await.version;
        let saves = backend.saves().len();

        assert!(!store.catalog().remove("nope").await);
        assert_eq!(store.catalog().list().await, before);
        assert_eq!(store.stats().await.version, version);
        assert_eq!(backend.saves().len(), saves);
    }

    #[tokio::test]
    async fn list_is_a_defensive_copy() {
        let (store, _) = ready_store().await;
        let mut items = store.catalog().list().await;
        items.clear();
        assert_eq!(store.catalog().list().await.len(), 2);
    }

    #[tokio::test]
    async fn filters_by_type() {
        let (store, _) = ready_store().await;
        store
            .catalog()
            .insert(draft(MediaType::Video, "https://x/v.jpg", &["https://x/v.mp4"]))
            .await;

        assert_eq!(store.catalog().photos().await.len(), 1);
        let videos = store.catalog().videos().await;
        assert_eq!(videos.len(), 2);
        assert!(videos.iter().all(|m| m.media_type == MediaType::Video));
    }
}
