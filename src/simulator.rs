use std::env;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cli::chat::conversation_state::SharedConversation;

/// Delay before a simulated reply lands, unless overridden by env.
pub const DEFAULT_DELAY_MS: u64 = 1500;

/// Optional override for the reply delay, in milliseconds.
pub const DELAY_ENV_VAR: &str = "CHAT_RESPONSE_DELAY_MS";

/// The fixed pool every simulated reply is drawn from.
pub const CANNED_REPLIES: [&str; 4] = [
    "I understand your question. Let me help you with that.",
    "Thank you for asking. Here's what I can tell you about that.",
    "I'd be happy to assist you with your inquiry.",
    "That's a great question. Let me provide you with the information.",
];

/// Selection strategy for the reply pool, injectable for deterministic tests.
pub trait ReplyPicker: Send + Sync {
    /// Returns an index in `0..pool_size`.
    fn pick(&self, pool_size: usize) -> usize;
}

/// Uniform random selection, the production picker.
pub struct RandomPicker;

impl ReplyPicker for RandomPicker {
    fn pick(&self, pool_size: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_size)
    }
}

pub struct SimulatorConfig {
    pub delay: Duration,
    pub replies: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            replies: CANNED_REPLIES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl SimulatorConfig {
    /// Default config with the delay overridable via `CHAT_RESPONSE_DELAY_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(DELAY_ENV_VAR) {
            match raw.parse::<u64>() {
                Ok(ms) => config.delay = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring invalid {}={}", DELAY_ENV_VAR, raw),
            }
        }
        config
    }
}

/// Fabricates assistant replies: fixed delay, then one canned string at
/// random. Cannot fail; there is no real I/O behind it.
pub struct ResponseSimulator {
    config: Arc<SimulatorConfig>,
    picker: Arc<dyn ReplyPicker>,
    conversation: SharedConversation,
}

impl ResponseSimulator {
    pub fn new(conversation: SharedConversation, config: SimulatorConfig) -> Self {
        Self::with_picker(conversation, config, Arc::new(RandomPicker))
    }

    pub fn with_picker(
        conversation: SharedConversation,
        config: SimulatorConfig,
        picker: Arc<dyn ReplyPicker>,
    ) -> Self {
        assert!(!config.replies.is_empty(), "reply pool must not be empty");
        Self {
            config: Arc::new(config),
            picker,
            conversation,
        }
    }

    /// Schedule the simulated reply to `user_text`.
    ///
    /// The typing flag is set before this returns; the delay and the append
    /// run on a spawned task. Overlapping calls are not serialized: each
    /// task appends its own reply when its own delay elapses, so two
    /// in-flight responses land in completion order.
    pub async fn respond_to(&self, user_text: &str) -> JoinHandle<()> {
        self.conversation.lock().await.set_typing(true);
        debug!(
            "Scheduling simulated reply in {}ms to: {}",
            self.config.delay.as_millis(),
            user_text
        );

        let config = Arc::clone(&self.config);
        let picker = Arc::clone(&self.picker);
        let conversation = Arc::clone(&self.conversation);
        tokio::spawn(async move {
            tokio::time::sleep(config.delay).await;
            let index = picker.pick(config.replies.len());
            debug!("Selected canned reply {}", index);
            conversation
                .lock()
                .await
                .append_assistant_message(&config.replies[index]);
        })
    }
}
