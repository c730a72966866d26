//! Disk-backed last-image store

use super::LastImageStore;
use crate::gemini::InlineImage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Writes generated images under a directory and remembers the newest file
/// per conversation. Files stay on disk; only the references expire.
pub struct DiskImageStore {
    dir: PathBuf,
    latest: RwLock<HashMap<String, (PathBuf, Instant)>>,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            latest: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn file_name(image: &InlineImage) -> String {
        let extension = match image.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        };
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let short: String = suffix.chars().take(8).collect();
        format!("gemini_{stamp}_{short}.{extension}")
    }
}

#[async_trait]
impl LastImageStore for DiskImageStore {
    async fn load_last_image(&self, conversation: &str) -> Option<InlineImage> {
        let path = self
            .latest
            .read()
            .await
            .get(conversation)
            .map(|(path, _)| path.clone())?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let fallback_mime = if path.extension().is_some_and(|e| e == "jpg") {
                    "image/jpeg"
                } else {
                    "image/png"
                };
                let image = InlineImage::sniff(bytes.clone())
                    .unwrap_or_else(|| InlineImage::new(bytes, fallback_mime));
                Some(image)
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation, path = %path.display(), error = %e, "Failed to read last image");
                None
            }
        }
    }

    async fn record_generated(&self, conversation: &str, image: &InlineImage) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(image));
        tokio::fs::write(&path, &image.data).await?;
        tracing::info!(conversation = %conversation, path = %path.display(), bytes = image.len(), "Saved generated image");
        self.latest
            .write()
            .await
            .insert(conversation.to_string(), (path, Instant::now()));
        Ok(())
    }

    async fn forget(&self, conversation: &str) {
        self.latest.write().await.remove(conversation);
    }

    async fn sweep_expired(&self, now: Instant, ttl: Duration) -> usize {
        let mut latest = self.latest.write().await;
        let before = latest.len();
        latest.retain(|_, (_, saved_at)| now.saturating_duration_since(*saved_at) <= ttl);
        before - latest.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::test_png;

    #[tokio::test]
    async fn test_record_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(tmp.path().join("out"));
        let image = test_png(64);

        assert!(store.load_last_image("u").await.is_none());
        store.record_generated("u", &image).await.unwrap();

        let loaded = store.load_last_image("u").await.unwrap();
        assert_eq!(loaded, image);
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_newest_wins_and_forget() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(tmp.path());
        store.record_generated("u", &test_png(10)).await.unwrap();
        let newer = test_png(20);
        store.record_generated("u", &newer).await.unwrap();

        assert_eq!(store.load_last_image("u").await, Some(newer));
        store.forget("u").await;
        assert!(store.load_last_image("u").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_drops_old_references() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(tmp.path());
        let ttl = Duration::from_secs(3600);
        store.record_generated("old", &test_png(10)).await.unwrap();

        assert_eq!(store.sweep_expired(Instant::now(), ttl).await, 0);
        assert!(store.load_last_image("old").await.is_some());

        let later = Instant::now() + ttl + Duration::from_secs(1);
        assert_eq!(store.sweep_expired(later, ttl).await, 1);
        assert!(store.load_last_image("old").await.is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(tmp.path());
        store.record_generated("u", &test_png(10)).await.unwrap();
        for entry in std::fs::read_dir(tmp.path()).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }
        assert!(store.load_last_image("u").await.is_none());
    }
}
