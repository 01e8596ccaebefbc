use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};

/// Assistant greeting every conversation starts with.
pub const GREETING: &str = "Hello! How can I assist you today?";

/// Shared handle to the conversation, locked briefly around each append.
pub type SharedConversation = Arc<Mutex<ConversationState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the conversation. Immutable once appended.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

/// Notification sent to the subscriber after each state mutation.
#[derive(Debug, Clone)]
pub enum StateChange {
    UserMessage(Message),
    AssistantMessage(Message),
    Typing(bool),
}

/// In-memory conversation: an append-only message list plus the typing flag.
///
/// Messages are never reordered or edited; ids are assigned here and are
/// strictly increasing for the lifetime of the state, including across
/// `clear`.
#[derive(Debug)]
pub struct ConversationState {
    messages: Vec<Message>,
    is_typing: bool,
    next_id: u64,
    events: Option<mpsc::UnboundedSender<StateChange>>,
}

impl ConversationState {
    pub fn new() -> Self {
        let mut state = Self {
            messages: Vec::new(),
            is_typing: false,
            next_id: 1,
            events: None,
        };
        state.append(Role::Assistant, GREETING);
        state
    }

    /// Register the single observer. Subsequent mutations emit a
    /// `StateChange` on the returned channel.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn append(&mut self, role: Role, content: &str) -> Message {
        let message = Message {
            id: self.next_id,
            content: content.to_string(),
            role,
            timestamp: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push(message.clone());
        message
    }

    fn notify(&self, change: StateChange) {
        if let Some(events) = &self.events {
            // The receiver may be gone during shutdown; nothing to do then.
            let _ = events.send(change);
        }
    }

    /// Append a user message. The text is taken as-is, empty included.
    pub fn append_user_message(&mut self, text: &str) -> Message {
        let message = self.append(Role::User, text);
        self.notify(StateChange::UserMessage(message.clone()));
        message
    }

    /// Append an assistant message and clear the typing flag.
    pub fn append_assistant_message(&mut self, text: &str) -> Message {
        let message = self.append(Role::Assistant, text);
        self.is_typing = false;
        self.notify(StateChange::AssistantMessage(message.clone()));
        message
    }

    pub fn set_typing(&mut self, flag: bool) {
        self.is_typing = flag;
        self.notify(StateChange::Typing(flag));
    }

    /// Drop the history and reseed the greeting. Ids keep counting up.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.is_typing = false;
        self.append(Role::Assistant, GREETING);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_holds_exactly_the_greeting() {
        let state = ConversationState::new();
        assert_eq!(state.len(), 1);
        assert!(!state.is_typing());
        let greeting = &state.messages()[0];
        assert_eq!(greeting.role, Role::Assistant);
        assert_eq!(greeting.content, GREETING);
    }

    #[test]
    fn user_append_preserves_exact_text() {
        let mut state = ConversationState::new();
        state.append_user_message("  What are your hours?  ");
        let last = state.messages().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "  What are your hours?  ");
    }

    #[test]
    fn empty_text_is_accepted_unvalidated() {
        let mut state = ConversationState::new();
        state.append_user_message("");
        assert_eq!(state.messages().last().unwrap().content, "");
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut state = ConversationState::new();
        state.append_user_message("one");
        state.append_assistant_message("two");
        state.append_user_message("three");
        let ids: Vec<u64> = state.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn assistant_append_clears_typing() {
        let mut state = ConversationState::new();
        state.set_typing(true);
        assert!(state.is_typing());
        state.append_assistant_message("done");
        assert!(!state.is_typing());
    }

    #[test]
    fn user_append_leaves_typing_untouched() {
        let mut state = ConversationState::new();
        state.set_typing(true);
        state.append_user_message("still waiting");
        assert!(state.is_typing());
    }

    #[test]
    fn clear_reseeds_the_greeting() {
        let mut state = ConversationState::new();
        state.append_user_message("hi");
        state.set_typing(true);
        state.clear();
        assert_eq!(state.len(), 1);
        assert!(!state.is_typing());
        assert_eq!(state.messages()[0].content, GREETING);
    }

    #[test]
    fn clear_does_not_reuse_ids() {
        let mut state = ConversationState::new();
        state.append_user_message("hi");
        let last_id = state.messages().last().unwrap().id;
        state.clear();
        assert!(state.messages()[0].id > last_id);
    }

    #[tokio::test]
    async fn subscriber_sees_changes_in_order() {
        let mut state = ConversationState::new();
        let mut rx = state.subscribe();
        state.append_user_message("hello");
        state.set_typing(true);
        state.append_assistant_message("reply");

        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::UserMessage(m) if m.content == "hello"
        ));
        assert!(matches!(rx.try_recv().unwrap(), StateChange::Typing(true)));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::AssistantMessage(m) if m.content == "reply"
        ));
        assert!(rx.try_recv().is_err());
    }
}
