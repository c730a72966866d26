//! Orchestration entry point
//!
//! Each intent runs as its own unit of work. Intents of the same user are
//! serialized through a per-user gate so two uploads in quick succession
//! reach the merge flow in order; different users proceed in parallel.

mod intent;
mod sink;

pub use intent::{Intent, IntentKind};
#[cfg(test)]
pub use sink::RecordingSink;
pub use sink::{ChannelSink, ReplySink};

use crate::cache::{ImageCache, LastImageStore};
use crate::config::Config;
use crate::gemini::{
    CallProfile, GatewayConfig, GatewayError, GeminiGateway, GenerateRequest, History,
    InlineImage, Part, Role, Transport,
};
use crate::pending::{Consumed, MergeProgress, PendingKind, PendingPayload, PendingRegistry};
use crate::response::{localize_refusal, ProcessedResponse, Reply};
use crate::session::{SessionKind, SessionStore};
use crate::store::KeyedStore;
use crate::translate::{ChatCompletionsTranslator, Translator};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

const REVERSE_PROMPT: &str = "Describe this image in detail so it could be recreated by an image \
generation model. Cover the subject, composition, style, lighting and colours. Reply with the \
description only.";

const ANALYSIS_PROMPT: &str = "Analyse this image. Describe what it shows, notable details, and \
what it appears to convey.";

const NO_IMAGE: &str = "No image was generated. Please try a different description.";

fn expand_prompt(prompt: &str) -> String {
    format!(
        "Expand the following image prompt into a detailed, vivid description suitable for an \
         image generation model. Keep the original intent. Reply with the expanded prompt only.\n\n{prompt}"
    )
}

fn merge_reinforcement(prompt: &str) -> String {
    format!(
        "Please merge these two images. {prompt}. Make sure to include the generated image in your response."
    )
}

/// Counts from a full sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub images: usize,
    pub pending: usize,
    pub last_images: usize,
}

pub struct Engine {
    config: Config,
    sessions: SessionStore,
    pending: PendingRegistry,
    cache: ImageCache,
    gateway: GeminiGateway,
    translator: Option<Arc<dyn Translator>>,
    /// Per-user translation switch; absent means the global setting
    translate_overrides: KeyedStore<String, bool>,
    chat_model: RwLock<String>,
    gates: KeyedStore<String, ()>,
}

impl Engine {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        last_images: Arc<dyn LastImageStore>,
    ) -> Self {
        let translator: Option<Arc<dyn Translator>> = if config.translate.is_configured() {
            Some(Arc::new(ChatCompletionsTranslator::new(
                transport.clone(),
                config.translate.clone(),
            )))
        } else {
            None
        };
        Self {
            sessions: SessionStore::new(config.conversation_ttl),
            pending: PendingRegistry::new(config.pending),
            cache: ImageCache::new(config.image_ttl, last_images),
            gateway: GeminiGateway::new(transport, GatewayConfig::from(&config)),
            translator,
            translate_overrides: KeyedStore::new(),
            chat_model: RwLock::new(config.chat_model.clone()),
            gates: KeyedStore::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[cfg(test)]
    pub fn pending(&self) -> &PendingRegistry {
        &self.pending
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn has_api_key(&self) -> bool {
        self.config.has_api_key()
    }

    pub async fn chat_model(&self) -> String {
        self.chat_model.read().await.clone()
    }

    /// Run `intent` on its own task. Replies arrive on the returned channel,
    /// which closes once the intent is fully handled.
    pub fn dispatch(self: &Arc<Self>, intent: Intent) -> mpsc::Receiver<Reply> {
        let (tx, rx) = mpsc::channel(32);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let sink = ChannelSink::new(tx);
            engine.handle(intent, &sink).await;
        });
        rx
    }

    /// Handle one intent to completion.
    pub async fn handle(&self, intent: Intent, sink: &dyn ReplySink) {
        let _gate = self.gates.lock(&intent.user_key).await;
        let now = Instant::now();
        self.sessions.sweep_expired(now).await;
        self.cache.sweep_expired(now).await;

        tracing::info!(
            user = %intent.user_key,
            session = %intent.session_key,
            group = intent.is_group,
            kind = ?intent.kind,
            "Handling intent"
        );

        if intent.kind.needs_api() && !self.config.has_api_key() {
            if intent.kind == IntentKind::ImageUpload {
                if let Some(image) = intent.image.clone() {
                    self.cache
                        .put_upload(&intent.session_key, &intent.user_key, image, now)
                        .await;
                }
                return;
            }
            sink.send(Reply::text(
                "The image service is not configured: please set the Gemini API key.",
            ))
            .await;
            return;
        }

        match intent.kind {
            IntentKind::Generate => self.generate(&intent, sink).await,
            IntentKind::Edit => self.edit(&intent, sink).await,
            IntentKind::ReferenceEdit => self.start_reference(&intent, sink, now).await,
            IntentKind::Merge => self.start_merge(&intent, sink, now).await,
            IntentKind::ReverseLookup => {
                self.pending
                    .register(&intent.user_key, PendingPayload::ReverseLookup, now)
                    .await;
                sink.send(Reply::text(self.upload_request(PendingKind::ReverseLookup)))
                    .await;
            }
            IntentKind::Analyze => {
                let question = Some(intent.arg().to_string()).filter(|q| !q.is_empty());
                self.pending
                    .register(&intent.user_key, PendingPayload::Analysis { question }, now)
                    .await;
                sink.send(Reply::text(self.upload_request(PendingKind::Analysis)))
                    .await;
            }
            IntentKind::FollowUp => self.follow_up(&intent, sink, now).await,
            IntentKind::EndConversation => self.end_conversation(&intent, sink).await,
            IntentKind::Chat => self.chat(&intent, sink).await,
            IntentKind::Expand => self.expand(&intent, sink).await,
            IntentKind::TranslateOn => self.set_translate(&intent, true, sink).await,
            IntentKind::TranslateOff => self.set_translate(&intent, false, sink).await,
            IntentKind::ListModels => self.list_models(sink).await,
            IntentKind::SwitchModel => self.switch_model(&intent, sink).await,
            IntentKind::ImageUpload => self.image_upload(&intent, sink, now).await,
            IntentKind::Other => self.other(&intent, sink, now).await,
        }
    }

    /// Periodic cleanup of every store
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let report = SweepReport {
            sessions: self.sessions.sweep_expired(now).await,
            images: self.cache.sweep_expired(now).await,
            pending: self.pending.sweep_expired(now).await,
            last_images: self
                .cache
                .last_images()
                .sweep_expired(now, self.config.last_image_ttl)
                .await,
        };
        // Idle gates only; held ones are skipped
        self.gates.retain(|_, _| false).await;
        report
    }

    // ========================================================================
    // Image flows
    // ========================================================================

    async fn generate(&self, intent: &Intent, sink: &dyn ReplySink) {
        let prompt = intent.arg();
        if prompt.is_empty() {
            sink.send(Reply::text("Please describe the image you want to generate."))
                .await;
            return;
        }
        let conversation = intent.conversation_key();
        if self.sessions.kind(&conversation).await != Some(SessionKind::Generate) {
            self.sessions
                .create_or_reset(&conversation, SessionKind::Generate, false, Instant::now())
                .await;
        }

        sink.send(Reply::text("Generating your image, please wait...")).await;
        let prompt = self.translate(&intent.user_key, prompt).await;
        let request = GenerateRequest::new(&self.config.image_model, prompt);
        let result = self
            .call_image(
                &request,
                CallProfile::generate(self.config.retries.generate),
                Some(self.history(&conversation)),
            )
            .await;
        self.deliver(&conversation, &request, result, sink).await;
    }

    async fn edit(&self, intent: &Intent, sink: &dyn ReplySink) {
        let prompt = intent.arg();
        if prompt.is_empty() {
            sink.send(Reply::text("Please describe how the image should be edited."))
                .await;
            return;
        }
        let conversation = intent.conversation_key();
        let Some(image) = self
            .cache
            .resolve(&conversation, Some(&intent.user_key), Instant::now())
            .await
        else {
            sink.send(Reply::text(
                "No image found to edit. Please upload an image or generate one first.",
            ))
            .await;
            return;
        };
        if self.sessions.kind(&conversation).await != Some(SessionKind::Edit) {
            self.sessions
                .create_or_reset(&conversation, SessionKind::Edit, true, Instant::now())
                .await;
        }

        sink.send(Reply::text("Editing your image, please wait...")).await;
        let prompt = self.translate(&intent.user_key, prompt).await;
        let request = GenerateRequest::new(&self.config.image_model, prompt).with_image(image);
        let result = self
            .call_image(
                &request,
                CallProfile::edit(self.config.retries.edit),
                Some(self.history(&conversation)),
            )
            .await;
        self.deliver(&conversation, &request, result, sink).await;
    }

    async fn start_reference(&self, intent: &Intent, sink: &dyn ReplySink, now: Instant) {
        let prompt = intent.arg();
        if prompt.is_empty() {
            sink.send(Reply::text(
                "Please describe the edit, then upload the reference image.",
            ))
            .await;
            return;
        }
        self.sessions
            .create_or_reset(&intent.conversation_key(), SessionKind::Reference, true, now)
            .await;
        self.pending
            .register(
                &intent.user_key,
                PendingPayload::Reference {
                    prompt: prompt.to_string(),
                },
                now,
            )
            .await;
        sink.send(Reply::text(self.upload_request(PendingKind::Reference)))
            .await;
    }

    async fn start_merge(&self, intent: &Intent, sink: &dyn ReplySink, now: Instant) {
        let prompt = intent.arg();
        if prompt.is_empty() {
            sink.send(Reply::text(
                "Please describe how the two images should be merged.",
            ))
            .await;
            return;
        }
        self.pending
            .register(&intent.user_key, PendingPayload::merge(prompt), now)
            .await;
        let secs = self.config.pending.for_kind(PendingKind::Merge).as_secs();
        sink.send(Reply::text(format!(
            "Please send the first image within {secs} seconds."
        )))
        .await;
    }

    async fn image_upload(&self, intent: &Intent, sink: &dyn ReplySink, now: Instant) {
        let Some(image) = intent.image.clone() else {
            sink.send(Reply::text("The uploaded file is not a supported image."))
                .await;
            return;
        };
        self.cache
            .put_upload(&intent.session_key, &intent.user_key, image.clone(), now)
            .await;
        let user = &intent.user_key;

        match self.pending.accept_merge_image(user, image.clone(), now).await {
            MergeProgress::NotPending => {}
            MergeProgress::Expired => {
                sink.send(Reply::text(timed_out(PendingKind::Merge))).await;
                return;
            }
            MergeProgress::FirstStored => {
                sink.send(Reply::text("First image received. Please send the second image."))
                    .await;
                return;
            }
            MergeProgress::Ready {
                prompt,
                first,
                second,
            } => {
                self.merge(intent, &prompt, first, second, sink).await;
                return;
            }
        }

        for kind in [
            PendingKind::Reference,
            PendingKind::ReverseLookup,
            PendingKind::Analysis,
        ] {
            match self.pending.try_consume(user, kind, now).await {
                Consumed::Absent => {}
                Consumed::Expired => {
                    sink.send(Reply::text(timed_out(kind))).await;
                    return;
                }
                Consumed::Present(payload) => {
                    self.resume(intent, payload, image, sink).await;
                    return;
                }
            }
        }
        tracing::debug!(user = %user, "Upload cached with no pending operation");
    }

    async fn resume(&self, intent: &Intent, payload: PendingPayload, image: InlineImage, sink: &dyn ReplySink) {
        match payload {
            PendingPayload::Reference { prompt } => {
                self.reference_edit(intent, &prompt, image, sink).await;
            }
            PendingPayload::ReverseLookup => self.reverse_lookup(image, sink).await,
            PendingPayload::Analysis { question } => {
                self.analyze(intent, question.as_deref(), image, sink).await;
            }
            PendingPayload::FollowUp { .. } | PendingPayload::Merge { .. } => {}
        }
    }

    async fn reference_edit(&self, intent: &Intent, prompt: &str, image: InlineImage, sink: &dyn ReplySink) {
        let conversation = intent.conversation_key();
        sink.send(Reply::text("Image received, editing it now...")).await;
        let prompt = self.translate(&intent.user_key, prompt).await;
        let request = GenerateRequest::new(&self.config.image_model, prompt).with_image(image);
        let result = self
            .call_image(&request, CallProfile::edit(self.config.retries.edit), None)
            .await;
        self.deliver(&conversation, &request, result, sink).await;
    }

    async fn merge(
        &self,
        intent: &Intent,
        prompt: &str,
        first: InlineImage,
        second: InlineImage,
        sink: &dyn ReplySink,
    ) {
        let conversation = intent.conversation_key();
        self.sessions
            .create_or_reset(&conversation, SessionKind::Merge, true, Instant::now())
            .await;
        sink.send(Reply::text("Both images received, merging them now..."))
            .await;

        let prompt = self.translate(&intent.user_key, prompt).await;
        let profile = CallProfile::merge(self.config.retries.merge);
        let request = GenerateRequest::new(&self.config.image_model, prompt.clone())
            .with_image(first.clone())
            .with_image(second.clone());
        let mut result = self.gateway.generate(&request, profile, None).await;

        if matches!(&result, Ok(processed) if !processed.has_images()) {
            tracing::info!(user = %intent.user_key, "Merge returned no image, retrying with reinforced prompt");
            let reinforced = GenerateRequest::new(&self.config.image_model, merge_reinforcement(&prompt))
                .with_image(first)
                .with_image(second);
            result = self.gateway.generate(&reinforced, profile, None).await;
        }
        self.deliver(&conversation, &request, result, sink).await;
    }

    /// Image call that repeats once when the model only says it is working on it
    async fn call_image(
        &self,
        request: &GenerateRequest,
        profile: CallProfile,
        history: Option<History<'_>>,
    ) -> Result<ProcessedResponse, GatewayError> {
        let result = self.gateway.generate(request, profile, history).await;
        match result {
            Ok(processed) if processed.is_wait_notice() => {
                tracing::warn!(profile = profile.name, "Model returned only a wait notice, retrying");
                self.gateway.generate(request, profile, history).await
            }
            other => other,
        }
    }

    /// Send the outcome of an image call and record a successful one.
    async fn deliver(
        &self,
        conversation: &str,
        request: &GenerateRequest,
        result: Result<ProcessedResponse, GatewayError>,
        sink: &dyn ReplySink,
    ) {
        let processed = match result {
            Ok(processed) => processed,
            Err(e) => {
                sink.send(Reply::Text(e.user_message(self.gateway.auth_mode())))
                    .await;
                return;
            }
        };

        if !processed.has_images() {
            let text = processed.text();
            let message = if text.is_empty() {
                NO_IMAGE.to_string()
            } else {
                localize_refusal(&text)
            };
            sink.send(Reply::Text(message)).await;
            return;
        }

        let now = Instant::now();
        self.sessions
            .append(conversation, Role::User, request.turn().parts, now)
            .await;
        let mut model_parts = Vec::new();
        for pair in &processed.pairs {
            if let Some(text) = &pair.text {
                model_parts.push(Part::text(text.clone()));
            }
            model_parts.push(Part::Image(pair.image.clone()));
        }
        if let Some(text) = &processed.trailing_text {
            model_parts.push(Part::text(text.clone()));
        }
        self.sessions
            .append(conversation, Role::Model, model_parts, now)
            .await;

        if let Some(last) = processed.images().last() {
            self.remember_generated(conversation, last.clone(), now).await;
        }
        for reply in processed.into_replies() {
            sink.send(reply).await;
        }
    }

    async fn remember_generated(&self, conversation: &str, image: InlineImage, now: Instant) {
        if let Err(e) = self
            .cache
            .last_images()
            .record_generated(conversation, &image)
            .await
        {
            tracing::warn!(conversation = %conversation, error = %e, "Failed to save generated image");
        }
        self.cache.put(conversation, image, now).await;
    }

    // ========================================================================
    // Text flows
    // ========================================================================

    async fn call_text(
        &self,
        prompt: String,
        image: Option<InlineImage>,
        history: Option<History<'_>>,
    ) -> Result<String, GatewayError> {
        let mut request = GenerateRequest::new(self.chat_model().await, prompt);
        if let Some(image) = image {
            request = request.with_image(image);
        }
        let processed = self
            .gateway
            .generate(&request, CallProfile::text(self.config.retries.text), history)
            .await?;
        Ok(processed.text())
    }

    async fn send_text_result(&self, result: Result<String, GatewayError>, sink: &dyn ReplySink) -> bool {
        match result {
            Ok(text) if !text.is_empty() => {
                sink.send(Reply::Text(text)).await;
                true
            }
            Ok(_) => {
                sink.send(Reply::text("The model returned an empty answer. Please try again."))
                    .await;
                false
            }
            Err(e) => {
                sink.send(Reply::Text(e.user_message(self.gateway.auth_mode())))
                    .await;
                false
            }
        }
    }

    async fn reverse_lookup(&self, image: InlineImage, sink: &dyn ReplySink) {
        sink.send(Reply::text("Image received, working out its prompt..."))
            .await;
        let result = self.call_text(REVERSE_PROMPT.to_string(), Some(image), None).await;
        self.send_text_result(result, sink).await;
    }

    async fn analyze(&self, intent: &Intent, question: Option<&str>, image: InlineImage, sink: &dyn ReplySink) {
        sink.send(Reply::text("Image received, analysing it...")).await;
        let prompt = question.map_or_else(|| ANALYSIS_PROMPT.to_string(), str::to_string);
        let result = self.call_text(prompt, Some(image.clone()), None).await;
        if self.send_text_result(result, sink).await {
            self.pending
                .register(&intent.user_key, PendingPayload::FollowUp { image }, Instant::now())
                .await;
            let secs = self.config.pending.for_kind(PendingKind::FollowUp).as_secs();
            sink.send(Reply::text(format!(
                "You can ask follow-up questions about this image within {secs} seconds."
            )))
            .await;
        }
    }

    async fn follow_up(&self, intent: &Intent, sink: &dyn ReplySink, now: Instant) {
        let question = intent.arg();
        if question.is_empty() {
            sink.send(Reply::text("Please include your follow-up question."))
                .await;
            return;
        }
        let user = &intent.user_key;
        let image = match self.pending.peek(user, PendingKind::FollowUp, now).await {
            Consumed::Absent => {
                sink.send(Reply::text(
                    "There is no recent image analysis to follow up on. Analyse an image first.",
                ))
                .await;
                return;
            }
            Consumed::Expired => {
                self.pending.try_consume(user, PendingKind::FollowUp, now).await;
                sink.send(Reply::text(timed_out(PendingKind::FollowUp))).await;
                return;
            }
            Consumed::Present(PendingPayload::FollowUp { image }) => image,
            Consumed::Present(_) => return,
        };

        let result = self.call_text(question.to_string(), Some(image), None).await;
        if self.send_text_result(result, sink).await {
            self.pending
                .touch(user, PendingKind::FollowUp, Instant::now())
                .await;
        }
    }

    async fn chat(&self, intent: &Intent, sink: &dyn ReplySink) {
        let text = intent.arg();
        if text.is_empty() {
            sink.send(Reply::text("Please enter a message.")).await;
            return;
        }
        let conversation = intent.conversation_key();
        let result = self
            .call_text(text.to_string(), None, Some(self.history(&conversation)))
            .await;
        if let Ok(answer) = &result {
            if !answer.is_empty() {
                let now = Instant::now();
                self.sessions
                    .append(&conversation, Role::User, vec![Part::text(text)], now)
                    .await;
                self.sessions
                    .append(&conversation, Role::Model, vec![Part::text(answer.clone())], now)
                    .await;
            }
        }
        self.send_text_result(result, sink).await;
    }

    async fn expand(&self, intent: &Intent, sink: &dyn ReplySink) {
        let prompt = intent.arg();
        if prompt.is_empty() {
            sink.send(Reply::text("Please enter the prompt to expand.")).await;
            return;
        }
        let result = self.call_text(expand_prompt(prompt), None, None).await;
        self.send_text_result(result, sink).await;
    }

    // ========================================================================
    // Settings and housekeeping
    // ========================================================================

    async fn end_conversation(&self, intent: &Intent, sink: &dyn ReplySink) {
        let conversation = intent.conversation_key();
        let ended = self.sessions.end(&conversation).await;
        let cleared = self.pending.clear_user(&intent.user_key).await;
        self.cache.last_images().forget(&conversation).await;
        tracing::info!(conversation = %conversation, ended, cleared, "Conversation ended");
        sink.send(Reply::text(
            "Conversation ended. Your next request starts a new conversation.",
        ))
        .await;
    }

    async fn set_translate(&self, intent: &Intent, enabled: bool, sink: &dyn ReplySink) {
        self.translate_overrides
            .insert(intent.user_key.clone(), enabled)
            .await;
        let message = match (enabled, self.translator.is_some()) {
            (true, true) => "Prompt translation enabled.",
            (true, false) => "Prompt translation enabled, but no translation service is configured.",
            (false, _) => "Prompt translation disabled.",
        };
        sink.send(Reply::text(message)).await;
    }

    async fn list_models(&self, sink: &dyn ReplySink) {
        let current = self.chat_model().await;
        let mut lines = vec!["Available chat models:".to_string()];
        for (index, model) in self.config.chat_models.iter().enumerate() {
            let marker = if *model == current { " (current)" } else { "" };
            lines.push(format!("{}. {model}{marker}", index + 1));
        }
        sink.send(Reply::Text(lines.join("\n"))).await;
    }

    async fn switch_model(&self, intent: &Intent, sink: &dyn ReplySink) {
        let arg = intent.arg();
        let models = &self.config.chat_models;
        let chosen = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| models.get(index))
            .or_else(|| models.iter().find(|m| m.as_str() == arg));

        let Some(model) = chosen else {
            sink.send(Reply::Text(format!(
                "Unknown model '{arg}'. Choose a number between 1 and {}.",
                models.len()
            )))
            .await;
            return;
        };
        *self.chat_model.write().await = model.clone();
        tracing::info!(model = %model, "Switched chat model");
        sink.send(Reply::Text(format!("Chat model switched to {model}.")))
            .await;
    }

    async fn other(&self, intent: &Intent, sink: &dyn ReplySink, now: Instant) {
        let user = &intent.user_key;
        for kind in PendingKind::IMAGE_AWAITING {
            match self.pending.peek(user, kind, now).await {
                Consumed::Absent => {}
                Consumed::Expired => {
                    self.pending.try_consume(user, kind, now).await;
                    sink.send(Reply::text(timed_out(kind))).await;
                    return;
                }
                Consumed::Present(_) => {
                    sink.send(Reply::text(reminder(kind))).await;
                    return;
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn history<'a>(&'a self, conversation: &'a str) -> History<'a> {
        History {
            sessions: &self.sessions,
            key: conversation,
        }
    }

    fn upload_request(&self, kind: PendingKind) -> String {
        let secs = self.config.pending.for_kind(kind).as_secs();
        let what = match kind {
            PendingKind::ReverseLookup => "to work out its prompt",
            PendingKind::Analysis => "to analyse",
            _ => "to edit",
        };
        format!("Please upload the image {what} within {secs} seconds.")
    }

    /// Best-effort translation; the original text is used on any failure.
    async fn translate(&self, user: &str, text: &str) -> String {
        let Some(translator) = &self.translator else {
            return text.to_string();
        };
        let enabled = self
            .translate_overrides
            .get(&user.to_string())
            .await
            .unwrap_or(self.config.translate.enabled);
        if !enabled {
            return text.to_string();
        }
        match translator.translate(text).await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Translation failed, using original prompt");
                text.to_string()
            }
        }
    }
}

fn timed_out(kind: PendingKind) -> &'static str {
    match kind {
        PendingKind::Merge => "The merge request timed out. Please start the merge again.",
        PendingKind::Reference => {
            "The reference edit timed out. Please send the reference edit command again."
        }
        PendingKind::ReverseLookup => {
            "The image prompt request timed out. Please send the command again."
        }
        PendingKind::Analysis => "The analysis request timed out. Please send the command again.",
        PendingKind::FollowUp => {
            "The follow-up window has expired. Please analyse the image again."
        }
    }
}

fn reminder(kind: PendingKind) -> &'static str {
    match kind {
        PendingKind::Merge => "Waiting for the images to merge. Please upload them one at a time.",
        PendingKind::Reference => "Waiting for the image for your reference edit. Please upload it.",
        PendingKind::ReverseLookup | PendingKind::Analysis => {
            "Waiting for your image. Please upload it."
        }
        PendingKind::FollowUp => "",
    }
}
