//! TTL-bounded image cache
//!
//! Uploaded images are kept for a while so later commands (edit, reference,
//! merge) can find them. In group chats one upload is stored under several
//! derived keys so it can be found by sender, by session or by both.
//! Reads are not destructive; entries live until the TTL sweep.

pub mod disk;

use crate::gemini::InlineImage;
use crate::store::KeyedStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub use disk::DiskImageStore;

/// Separator of composite `session:sender` keys
pub const KEY_SEPARATOR: char = ':';

pub fn composite_key(session: &str, sender: &str) -> String {
    format!("{session}{KEY_SEPARATOR}{sender}")
}

/// Persistent record of the latest generated image per conversation,
/// consulted when the cache has nothing.
#[async_trait]
pub trait LastImageStore: Send + Sync {
    async fn load_last_image(&self, conversation: &str) -> Option<InlineImage>;

    /// Persist a generated image as the conversation's latest
    async fn record_generated(&self, conversation: &str, image: &InlineImage) -> std::io::Result<()>;

    async fn forget(&self, conversation: &str);

    /// Drop references recorded more than `ttl` before `now`. Returns how many went.
    async fn sweep_expired(&self, now: Instant, ttl: Duration) -> usize;
}

#[async_trait]
impl<T: LastImageStore + ?Sized> LastImageStore for Arc<T> {
    async fn load_last_image(&self, conversation: &str) -> Option<InlineImage> {
        (**self).load_last_image(conversation).await
    }

    async fn record_generated(&self, conversation: &str, image: &InlineImage) -> std::io::Result<()> {
        (**self).record_generated(conversation, image).await
    }

    async fn forget(&self, conversation: &str) {
        (**self).forget(conversation).await;
    }

    async fn sweep_expired(&self, now: Instant, ttl: Duration) -> usize {
        (**self).sweep_expired(now, ttl).await
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the upload was originally filed under
    pub owner_key: String,
    pub image: InlineImage,
    pub stored_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) <= ttl
    }
}

pub struct ImageCache {
    entries: KeyedStore<String, CacheEntry>,
    ttl: Duration,
    last_images: Arc<dyn LastImageStore>,
}

impl ImageCache {
    pub fn new(ttl: Duration, last_images: Arc<dyn LastImageStore>) -> Self {
        Self {
            entries: KeyedStore::new(),
            ttl,
            last_images,
        }
    }

    pub fn last_images(&self) -> &dyn LastImageStore {
        self.last_images.as_ref()
    }

    pub async fn put(&self, key: &str, image: InlineImage, now: Instant) {
        self.put_owned(key, key, image, now).await;
    }

    async fn put_owned(&self, key: &str, owner: &str, image: InlineImage, now: Instant) {
        let entry = CacheEntry {
            owner_key: owner.to_string(),
            image,
            stored_at: now,
        };
        self.entries.insert(key.to_string(), entry).await;
    }

    /// Store an upload under every key it may later be looked up by.
    pub async fn put_upload(&self, session: &str, sender: &str, image: InlineImage, now: Instant) {
        self.put_owned(sender, sender, image.clone(), now).await;
        if session != sender {
            self.put_owned(session, sender, image.clone(), now).await;
            self.put_owned(&composite_key(session, sender), sender, image, now)
                .await;
        }
        tracing::debug!(session = %session, sender = %sender, "Cached uploaded image");
    }

    /// Direct lookup
    pub async fn get(&self, key: &str, now: Instant) -> Option<InlineImage> {
        let ttl = self.ttl;
        self.entries
            .with(&key.to_string(), |entry| {
                entry.is_valid(now, ttl).then(|| entry.image.clone())
            })
            .await
            .flatten()
    }

    /// Find the image a command refers to.
    ///
    /// Order: the key itself, the `key:sender` composite, any composite key
    /// with `key` as one of its parts, the parts of `key` if it is composite,
    /// and finally the last generated image (which is re-cached).
    pub async fn resolve(&self, key: &str, sender: Option<&str>, now: Instant) -> Option<InlineImage> {
        if let Some(image) = self.get(key, now).await {
            return Some(image);
        }

        if let Some(sender) = sender.filter(|s| *s != key) {
            if let Some(image) = self.get(&composite_key(key, sender), now).await {
                tracing::debug!(key = %key, sender = %sender, "Resolved image by composite key");
                return Some(image);
            }
        }

        if let Some(image) = self.scan_composites(key, now).await {
            return Some(image);
        }

        for part in key.split(KEY_SEPARATOR).filter(|p| !p.is_empty() && *p != key) {
            if let Some(image) = self.get(part, now).await {
                tracing::debug!(key = %key, part = %part, "Resolved image by key part");
                return Some(image);
            }
        }

        let image = self.last_images.load_last_image(key).await?;
        tracing::info!(key = %key, "Re-cached last generated image");
        self.put(key, image.clone(), now).await;
        Some(image)
    }

    /// Newest valid entry whose composite key starts or ends with `key`
    async fn scan_composites(&self, key: &str, now: Instant) -> Option<InlineImage> {
        let mut best: Option<CacheEntry> = None;
        for candidate in self.entries.keys().await {
            let Some((session, sender)) = candidate.split_once(KEY_SEPARATOR) else {
                continue;
            };
            if session != key && sender != key {
                continue;
            }
            let Some(entry) = self.entries.get(&candidate).await else {
                continue;
            };
            if !entry.is_valid(now, self.ttl) {
                continue;
            }
            if best.as_ref().is_none_or(|b| entry.stored_at > b.stored_at) {
                best = Some(entry);
            }
        }
        best.map(|entry| {
            tracing::debug!(key = %key, owner = %entry.owner_key, "Resolved image by composite scan");
            entry.image
        })
    }

    /// Remove entries older than the TTL. Returns how many were removed.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let removed = self
            .entries
            .retain(|_, entry| entry.is_valid(now, ttl))
            .await;
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cached images");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.len().await
    }
}
