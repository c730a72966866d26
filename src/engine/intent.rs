//! Parsed commands arriving from the chat front end

use crate::cache::composite_key;
use crate::gemini::InlineImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Generate,
    Edit,
    ReferenceEdit,
    Merge,
    ReverseLookup,
    Analyze,
    FollowUp,
    EndConversation,
    Chat,
    Expand,
    TranslateOn,
    TranslateOff,
    ListModels,
    SwitchModel,
    ImageUpload,
    Other,
}

impl IntentKind {
    /// Commands that call the upstream API (directly or after an upload)
    pub fn needs_api(self) -> bool {
        !matches!(
            self,
            IntentKind::EndConversation
                | IntentKind::TranslateOn
                | IntentKind::TranslateOff
                | IntentKind::ListModels
                | IntentKind::SwitchModel
                | IntentKind::Other
        )
    }
}

#[derive(Debug, Clone)]
pub struct Intent {
    pub user_key: String,
    /// Chat the message came from; equals `user_key` in private chats
    pub session_key: String,
    pub is_group: bool,
    pub kind: IntentKind,
    pub arg_text: String,
    pub image: Option<InlineImage>,
}

impl Intent {
    pub fn new(user_key: impl Into<String>, kind: IntentKind, arg_text: impl Into<String>) -> Self {
        let user_key = user_key.into();
        Self {
            session_key: user_key.clone(),
            user_key,
            is_group: false,
            kind,
            arg_text: arg_text.into(),
            image: None,
        }
    }

    #[cfg(test)]
    pub fn upload(user_key: impl Into<String>, image: InlineImage) -> Self {
        let mut intent = Self::new(user_key, IntentKind::ImageUpload, "");
        intent.image = Some(image);
        intent
    }

    pub fn in_group(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self.is_group = true;
        self
    }

    /// Key of this user's conversation. Group members each get their own.
    pub fn conversation_key(&self) -> String {
        if self.is_group && self.session_key != self.user_key {
            composite_key(&self.session_key, &self.user_key)
        } else {
            self.user_key.clone()
        }
    }

    pub fn arg(&self) -> &str {
        self.arg_text.trim()
    }
}
