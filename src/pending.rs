//! Pending-operation registry
//!
//! Tracks, per user, which multi-step flow the next qualifying event should
//! be routed to. All kinds share one map and one expiry routine; each kind
//! has its own timeout. Expiry is evaluated lazily when an entry is touched,
//! plus a periodic sweep for cleanliness.
//!
//! The image-awaiting kinds (reverse lookup, analysis, reference edit and
//! merge) are mutually exclusive: registering one displaces the others.
//! The follow-up window is not waiting for an image and coexists with them.

use crate::config::PendingTimeouts;
use crate::gemini::InlineImage;
use crate::store::KeyedStore;
use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    ReverseLookup,
    Analysis,
    Reference,
    FollowUp,
    Merge,
}

impl PendingKind {
    pub const IMAGE_AWAITING: [PendingKind; 4] = [
        PendingKind::Merge,
        PendingKind::Reference,
        PendingKind::ReverseLookup,
        PendingKind::Analysis,
    ];

    pub fn awaits_image(self) -> bool {
        !matches!(self, PendingKind::FollowUp)
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingKind::ReverseLookup => "reverse_lookup",
            PendingKind::Analysis => "analysis",
            PendingKind::Reference => "reference",
            PendingKind::FollowUp => "follow_up",
            PendingKind::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Progress of a merge waiting for its two uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStage {
    WaitingFirstImage,
    WaitingSecondImage { first: InlineImage },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingPayload {
    ReverseLookup,
    Analysis { question: Option<String> },
    Reference { prompt: String },
    /// The image most recently analysed; follow-up questions refer to it
    FollowUp { image: InlineImage },
    Merge { prompt: String, stage: MergeStage },
}

impl PendingPayload {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingPayload::ReverseLookup => PendingKind::ReverseLookup,
            PendingPayload::Analysis { .. } => PendingKind::Analysis,
            PendingPayload::Reference { .. } => PendingKind::Reference,
            PendingPayload::FollowUp { .. } => PendingKind::FollowUp,
            PendingPayload::Merge { .. } => PendingKind::Merge,
        }
    }

    pub fn merge(prompt: impl Into<String>) -> Self {
        PendingPayload::Merge {
            prompt: prompt.into(),
            stage: MergeStage::WaitingFirstImage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub payload: PendingPayload,
    pub started: Instant,
}

/// Result of looking up a pending operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumed {
    Present(PendingPayload),
    Expired,
    Absent,
}

/// Result of feeding an upload to the merge flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeProgress {
    /// No merge waiting; the upload belongs to some other path
    NotPending,
    /// A merge was waiting but timed out; the entry is cleared
    Expired,
    /// First image stored, still waiting for the second
    FirstStored,
    /// Both images present; the entry is cleared
    Ready {
        prompt: String,
        first: InlineImage,
        second: InlineImage,
    },
}

type UserPending = HashMap<PendingKind, PendingOperation>;

pub struct PendingRegistry {
    entries: KeyedStore<String, UserPending>,
    timeouts: PendingTimeouts,
}

impl PendingRegistry {
    pub fn new(timeouts: PendingTimeouts) -> Self {
        Self {
            entries: KeyedStore::new(),
            timeouts,
        }
    }

    fn is_expired(timeouts: &PendingTimeouts, op: &PendingOperation, now: Instant) -> bool {
        now.saturating_duration_since(op.started) > timeouts.for_kind(op.payload.kind())
    }

    /// Register (or overwrite) the entry for the payload's kind. Returns the
    /// image-awaiting kinds this registration displaced.
    pub async fn register(&self, user: &str, payload: PendingPayload, now: Instant) -> Vec<PendingKind> {
        let kind = payload.kind();
        let displaced = self
            .entries
            .with_or_insert(&user.to_string(), HashMap::new, |ops| {
                let mut displaced = Vec::new();
                if kind.awaits_image() {
                    for other in PendingKind::IMAGE_AWAITING {
                        if other != kind && ops.remove(&other).is_some() {
                            displaced.push(other);
                        }
                    }
                }
                ops.insert(
                    kind,
                    PendingOperation {
                        payload,
                        started: now,
                    },
                );
                displaced
            })
            .await;

        if displaced.is_empty() {
            tracing::debug!(user = %user, kind = %kind, "Registered pending operation");
        } else {
            tracing::info!(user = %user, kind = %kind, ?displaced, "Registered pending operation, displacing others");
        }
        displaced
    }

    /// Remove and return the entry for `kind`. Expired entries are removed
    /// and reported as `Expired`.
    pub async fn try_consume(&self, user: &str, kind: PendingKind, now: Instant) -> Consumed {
        let timeouts = self.timeouts;
        let consumed = self
            .entries
            .with(&user.to_string(), |ops| match ops.remove(&kind) {
                None => Consumed::Absent,
                Some(op) if Self::is_expired(&timeouts, &op, now) => Consumed::Expired,
                Some(op) => Consumed::Present(op.payload),
            })
            .await
            .unwrap_or(Consumed::Absent);

        if consumed == Consumed::Expired {
            tracing::info!(user = %user, kind = %kind, "Pending operation expired");
        }
        consumed
    }

    /// Like `try_consume` but leaves the entry in place.
    pub async fn peek(&self, user: &str, kind: PendingKind, now: Instant) -> Consumed {
        let timeouts = self.timeouts;
        self.entries
            .with(&user.to_string(), |ops| match ops.get(&kind) {
                None => Consumed::Absent,
                Some(op) if Self::is_expired(&timeouts, op, now) => Consumed::Expired,
                Some(op) => Consumed::Present(op.payload.clone()),
            })
            .await
            .unwrap_or(Consumed::Absent)
    }

    /// Feed an uploaded image to the merge flow, if one is waiting.
    pub async fn accept_merge_image(&self, user: &str, image: InlineImage, now: Instant) -> MergeProgress {
        let timeouts = self.timeouts;
        let progress = self
            .entries
            .with(&user.to_string(), |ops| {
                let Some(op) = ops.get_mut(&PendingKind::Merge) else {
                    return MergeProgress::NotPending;
                };
                if Self::is_expired(&timeouts, op, now) {
                    ops.remove(&PendingKind::Merge);
                    return MergeProgress::Expired;
                }
                let PendingPayload::Merge { prompt, stage } = &mut op.payload else {
                    return MergeProgress::NotPending;
                };
                match stage {
                    MergeStage::WaitingFirstImage => {
                        *stage = MergeStage::WaitingSecondImage { first: image };
                        MergeProgress::FirstStored
                    }
                    MergeStage::WaitingSecondImage { first } => {
                        let ready = MergeProgress::Ready {
                            prompt: std::mem::take(prompt),
                            first: first.clone(),
                            second: image,
                        };
                        ops.remove(&PendingKind::Merge);
                        ready
                    }
                }
            })
            .await
            .unwrap_or(MergeProgress::NotPending);

        match &progress {
            MergeProgress::FirstStored => {
                tracing::info!(user = %user, "Merge received first image");
            }
            MergeProgress::Ready { .. } => {
                tracing::info!(user = %user, "Merge received second image");
            }
            MergeProgress::Expired => {
                tracing::info!(user = %user, "Merge expired before images arrived");
            }
            MergeProgress::NotPending => {}
        }
        progress
    }

    /// The live image-awaiting kind for `user`, if any
    pub async fn awaiting_image(&self, user: &str, now: Instant) -> Option<PendingKind> {
        let timeouts = self.timeouts;
        self.entries
            .with(&user.to_string(), |ops| {
                PendingKind::IMAGE_AWAITING.into_iter().find(|kind| {
                    ops.get(kind)
                        .is_some_and(|op| !Self::is_expired(&timeouts, op, now))
                })
            })
            .await
            .flatten()
    }

    /// Restart the clock of a live entry. Returns false if absent or expired.
    pub async fn touch(&self, user: &str, kind: PendingKind, now: Instant) -> bool {
        let timeouts = self.timeouts;
        self.entries
            .with(&user.to_string(), |ops| match ops.get_mut(&kind) {
                Some(op) if !Self::is_expired(&timeouts, op, now) => {
                    op.started = now;
                    true
                }
                _ => false,
            })
            .await
            .unwrap_or(false)
    }

    /// Drop every pending operation of `user`. Returns how many there were.
    pub async fn clear_user(&self, user: &str) -> usize {
        let count = self
            .entries
            .with(&user.to_string(), |ops| {
                let count = ops.len();
                ops.clear();
                count
            })
            .await
            .unwrap_or(0);
        self.entries.remove(&user.to_string()).await;
        count
    }

    /// Remove expired entries of every user. Returns how many were removed.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let timeouts = self.timeouts;
        let mut removed = 0;
        self.entries
            .retain(|_, ops| {
                let before = ops.len();
                ops.retain(|_, op| !Self::is_expired(&timeouts, op, now));
                removed += before - ops.len();
                !ops.is_empty()
            })
            .await;
        if removed > 0 {
            tracing::info!(removed, "Swept expired pending operations");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::test_png;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(180);
    const ONE: Duration = Duration::from_secs(1);

    fn registry() -> PendingRegistry {
        PendingRegistry::new(PendingTimeouts::default())
    }

    fn reference(prompt: &str) -> PendingPayload {
        PendingPayload::Reference {
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn test_consume_within_timeout() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("u", reference("make it blue"), t0).await;
        assert_eq!(
            reg.try_consume("u", PendingKind::Reference, t0 + TIMEOUT - ONE).await,
            Consumed::Present(reference("make it blue"))
        );
        assert_eq!(
            reg.try_consume("u", PendingKind::Reference, t0).await,
            Consumed::Absent
        );
    }

    #[tokio::test]
    async fn test_consume_after_timeout_clears() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("u", reference("p"), t0).await;
        assert_eq!(
            reg.try_consume("u", PendingKind::Reference, t0 + TIMEOUT + ONE).await,
            Consumed::Expired
        );
        assert_eq!(
            reg.try_consume("u", PendingKind::Reference, t0 + TIMEOUT + ONE).await,
            Consumed::Absent
        );
    }

    #[tokio::test]
    async fn test_per_kind_timeouts() {
        let reg = PendingRegistry::new(PendingTimeouts {
            analysis: Duration::from_secs(10),
            ..PendingTimeouts::default()
        });
        let t0 = Instant::now();
        reg.register("u", PendingPayload::Analysis { question: None }, t0).await;
        assert_eq!(
            reg.peek("u", PendingKind::Analysis, t0 + Duration::from_secs(11)).await,
            Consumed::Expired
        );
        // peek does not clear
        assert_eq!(
            reg.peek("u", PendingKind::Analysis, t0 + Duration::from_secs(11)).await,
            Consumed::Expired
        );
    }

    #[tokio::test]
    async fn test_merge_two_phase() {
        let reg = registry();
        let t0 = Instant::now();
        let first = test_png(10);
        let second = test_png(20);

        reg.register("u", PendingPayload::merge("blend them"), t0).await;
        assert_eq!(
            reg.accept_merge_image("u", first.clone(), t0 + ONE).await,
            MergeProgress::FirstStored
        );
        assert_eq!(
            reg.peek("u", PendingKind::Merge, t0 + ONE).await,
            Consumed::Present(PendingPayload::Merge {
                prompt: "blend them".to_string(),
                stage: MergeStage::WaitingSecondImage {
                    first: first.clone()
                },
            })
        );

        assert_eq!(
            reg.accept_merge_image("u", second.clone(), t0 + ONE + ONE).await,
            MergeProgress::Ready {
                prompt: "blend them".to_string(),
                first,
                second,
            }
        );
        assert_eq!(reg.peek("u", PendingKind::Merge, t0).await, Consumed::Absent);
    }

    #[tokio::test]
    async fn test_image_without_merge_is_noop() {
        let reg = registry();
        let t0 = Instant::now();
        assert_eq!(
            reg.accept_merge_image("u", test_png(8), t0).await,
            MergeProgress::NotPending
        );

        reg.register("u", PendingPayload::FollowUp { image: test_png(8) }, t0).await;
        assert_eq!(
            reg.accept_merge_image("u", test_png(8), t0).await,
            MergeProgress::NotPending
        );
        assert!(matches!(
            reg.peek("u", PendingKind::FollowUp, t0).await,
            Consumed::Present(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_merge() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("u", PendingPayload::merge("p"), t0).await;
        assert_eq!(
            reg.accept_merge_image("u", test_png(8), t0 + TIMEOUT + ONE).await,
            MergeProgress::Expired
        );
        assert_eq!(
            reg.accept_merge_image("u", test_png(8), t0 + TIMEOUT + ONE).await,
            MergeProgress::NotPending
        );
    }

    #[tokio::test]
    async fn test_image_awaiting_kinds_are_exclusive() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("u", PendingPayload::FollowUp { image: test_png(8) }, t0).await;
        reg.register("u", reference("p"), t0).await;
        let displaced = reg.register("u", PendingPayload::merge("m"), t0).await;

        assert_eq!(displaced, vec![PendingKind::Reference]);
        assert_eq!(reg.awaiting_image("u", t0).await, Some(PendingKind::Merge));
        assert_eq!(reg.peek("u", PendingKind::Reference, t0).await, Consumed::Absent);
        // Follow-up window survives
        assert!(matches!(
            reg.peek("u", PendingKind::FollowUp, t0).await,
            Consumed::Present(_)
        ));
    }

    #[tokio::test]
    async fn test_touch_extends_window() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("u", PendingPayload::FollowUp { image: test_png(8) }, t0).await;
        let later = t0 + Duration::from_secs(100);
        assert!(reg.touch("u", PendingKind::FollowUp, later).await);
        assert!(matches!(
            reg.peek("u", PendingKind::FollowUp, t0 + TIMEOUT + ONE).await,
            Consumed::Present(_)
        ));
        assert!(!reg.touch("u", PendingKind::FollowUp, later + TIMEOUT + ONE).await);
    }

    #[tokio::test]
    async fn test_sweep_and_clear() {
        let reg = registry();
        let t0 = Instant::now();
        reg.register("a", reference("p"), t0).await;
        reg.register("b", reference("p"), t0 + Duration::from_secs(100)).await;
        reg.register("b", PendingPayload::FollowUp { image: test_png(8) }, t0).await;

        assert_eq!(reg.sweep_expired(t0 + TIMEOUT + ONE).await, 2);
        assert_eq!(reg.peek("a", PendingKind::Reference, t0).await, Consumed::Absent);
        assert!(matches!(
            reg.peek("b", PendingKind::Reference, t0).await,
            Consumed::Present(_)
        ));

        assert_eq!(reg.clear_user("b").await, 1);
        assert_eq!(reg.awaiting_image("b", t0).await, None);
    }
}
