//! Retry budgets and backoff schedule

use std::time::Duration;

/// Exponential backoff: `initial * factor^retry`, capped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 1.5,
            cap: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.cap.as_secs_f64() {
            self.cap
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}

/// Per-flow call parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallProfile {
    pub name: &'static str,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Treat 403 as transient
    pub retry_forbidden: bool,
    pub timeout: Duration,
    /// Ask for image output in addition to text
    pub with_images: bool,
}

const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
const TEXT_TIMEOUT: Duration = Duration::from_secs(60);

impl CallProfile {
    pub const fn generate(max_retries: u32) -> Self {
        Self {
            name: "generate",
            max_retries,
            retry_forbidden: false,
            timeout: IMAGE_TIMEOUT,
            with_images: true,
        }
    }

    pub const fn edit(max_retries: u32) -> Self {
        Self {
            name: "edit",
            max_retries,
            retry_forbidden: false,
            timeout: IMAGE_TIMEOUT,
            with_images: true,
        }
    }

    pub const fn merge(max_retries: u32) -> Self {
        Self {
            name: "merge",
            max_retries,
            retry_forbidden: true,
            timeout: IMAGE_TIMEOUT,
            with_images: true,
        }
    }

    pub const fn text(max_retries: u32) -> Self {
        Self {
            name: "text",
            max_retries,
            retry_forbidden: false,
            timeout: TEXT_TIMEOUT,
            with_images: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2250));
        // 1.5^6 = 11.39 > 10
        assert_eq!(policy.delay_for(6), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let policy = BackoffPolicy::default();
        let delays: Vec<_> = (0..20).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_only_merge_retries_forbidden() {
        assert!(CallProfile::merge(10).retry_forbidden);
        assert!(!CallProfile::edit(5).retry_forbidden);
        assert!(!CallProfile::text(2).with_images);
        assert_eq!(CallProfile::merge(10).attempts(), 11);
    }
}
