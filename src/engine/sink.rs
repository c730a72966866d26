//! Reply delivery back to the chat front end

use crate::response::Reply;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: Reply);
}

/// Forwards replies into a channel. A closed receiver drops them.
pub struct ChannelSink {
    tx: mpsc::Sender<Reply>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Reply>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ReplySink for ChannelSink {
    async fn send(&self, reply: Reply) {
        if self.tx.send(reply).await.is_err() {
            tracing::debug!("Reply receiver closed, dropping reply");
        }
    }
}

#[cfg(test)]
pub use testing::RecordingSink;

#[cfg(test)]
mod testing {
    use super::*;
    use crate::gemini::InlineImage;
    use std::sync::Mutex;

    /// Collects replies for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        replies: Mutex<Vec<Reply>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn replies(&self) -> Vec<Reply> {
            self.replies.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.replies()
                .into_iter()
                .filter_map(|r| match r {
                    Reply::Text(t) => Some(t),
                    Reply::Image(_) => None,
                })
                .collect()
        }

        pub fn images(&self) -> Vec<InlineImage> {
            self.replies()
                .into_iter()
                .filter_map(|r| match r {
                    Reply::Image(i) => Some(i),
                    Reply::Text(_) => None,
                })
                .collect()
        }

        pub fn last_text(&self) -> Option<String> {
            self.texts().pop()
        }

        pub fn clear(&self) {
            self.replies.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, reply: Reply) {
            self.replies.lock().unwrap().push(reply);
        }
    }
}
