//! Process configuration from environment variables

use crate::pending::PendingKind;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-exp-image-generation";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TTL_SECS: u64 = 180;
const DEFAULT_IMAGE_TTL_SECS: u64 = 600;
const DEFAULT_LAST_IMAGE_TTL_SECS: u64 = 24 * 60 * 60;

/// How the API key reaches upstream. Fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `?key=` query parameter against the public endpoint
    Direct,
    /// `Authorization: Bearer` against a relay
    Proxy,
}

/// Retries after the first attempt, per flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudgets {
    pub generate: u32,
    pub edit: u32,
    pub merge: u32,
    pub text: u32,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            generate: 5,
            edit: 5,
            merge: 10,
            text: 2,
        }
    }
}

/// Independent expiry per pending-operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimeouts {
    pub reverse_lookup: Duration,
    pub analysis: Duration,
    pub reference: Duration,
    pub follow_up: Duration,
    pub merge: Duration,
}

impl Default for PendingTimeouts {
    fn default() -> Self {
        let ttl = Duration::from_secs(DEFAULT_TTL_SECS);
        Self {
            reverse_lookup: ttl,
            analysis: ttl,
            reference: ttl,
            follow_up: ttl,
            merge: ttl,
        }
    }
}

impl PendingTimeouts {
    pub fn for_kind(&self, kind: PendingKind) -> Duration {
        match kind {
            PendingKind::ReverseLookup => self.reverse_lookup,
            PendingKind::Analysis => self.analysis,
            PendingKind::Reference => self.reference,
            PendingKind::FollowUp => self.follow_up,
            PendingKind::Merge => self.merge,
        }
    }
}

/// Optional prompt translation side-call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateConfig {
    pub enabled: bool,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl TranslateConfig {
    /// A service is reachable. `enabled` only sets the default for users
    /// who have not switched translation on or off themselves.
    pub fn is_configured(&self) -> bool {
        !self.api_base.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub auth_mode: AuthMode,
    pub image_model: String,
    pub chat_model: String,
    /// Models offered by the model-switch command
    pub chat_models: Vec<String>,
    pub translate: TranslateConfig,
    pub save_dir: PathBuf,
    pub port: u16,
    pub conversation_ttl: Duration,
    pub image_ttl: Duration,
    /// How long a conversation's saved image stays recallable after it was generated
    pub last_image_ttl: Duration,
    pub pending: PendingTimeouts,
    pub retries: RetryBudgets,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |name: &str, default: u64| {
            let value = var(name).and_then(|v| match v.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(variable = name, value = %v, "Ignoring non-numeric duration");
                    None
                }
            });
            Duration::from_secs(value.unwrap_or(default))
        };
        let pending_ttl = |name: &str| secs(name, DEFAULT_TTL_SECS);

        let (base_url, auth_mode) = match var("GEMINI_PROXY_URL") {
            Some(proxy) => (proxy, AuthMode::Proxy),
            None => (
                var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                AuthMode::Direct,
            ),
        };

        let chat_model = var("GEMINI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let mut chat_models: Vec<String> = var("GEMINI_CHAT_MODELS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !chat_models.contains(&chat_model) {
            chat_models.insert(0, chat_model.clone());
        }

        let enabled = var("TRANSLATE_ENABLED").is_some_and(|v| parse_bool(&v));

        Self {
            api_key: var("GEMINI_API_KEY").unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_mode,
            image_model: var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            chat_model,
            chat_models,
            translate: TranslateConfig {
                enabled,
                api_base: var("TRANSLATE_API_BASE")
                    .map(|b| b.trim_end_matches('/').to_string())
                    .unwrap_or_default(),
                api_key: var("TRANSLATE_API_KEY").unwrap_or_default(),
                model: var("TRANSLATE_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
            save_dir: var("IMAGE_SAVE_DIR").map_or_else(|| PathBuf::from("./generated"), PathBuf::from),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8000),
            conversation_ttl: secs("CONVERSATION_TTL_SECS", DEFAULT_TTL_SECS),
            image_ttl: secs("IMAGE_TTL_SECS", DEFAULT_IMAGE_TTL_SECS),
            last_image_ttl: secs("LAST_IMAGE_TTL_SECS", DEFAULT_LAST_IMAGE_TTL_SECS),
            pending: PendingTimeouts {
                reverse_lookup: pending_ttl("PENDING_REVERSE_TIMEOUT_SECS"),
                analysis: pending_ttl("PENDING_ANALYSIS_TIMEOUT_SECS"),
                reference: pending_ttl("PENDING_REFERENCE_TIMEOUT_SECS"),
                follow_up: pending_ttl("PENDING_FOLLOW_UP_TIMEOUT_SECS"),
                merge: pending_ttl("PENDING_MERGE_TIMEOUT_SECS"),
            },
            retries: RetryBudgets::default(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
