//! Per-agent message store.

use chrono::Utc;
use parley_core::message::{ConversationId, ConversationState, Message, Role};
use parley_core::provider::SystemPromptPlacement;

/// Ordered, append-only history owned by exactly one agent.
#[derive(Debug, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    system_prompt: String,
    conversation_id: ConversationId,
}

impl MessageStore {
    /// Empty store for `conversation_id`.
    pub fn new(conversation_id: ConversationId, system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: system_prompt.into(),
            conversation_id,
        }
    }

    /// A fresh store: a leading system message when the provider keeps the
    /// persona in history, otherwise empty with the prompt held aside.
    pub fn fresh(
        conversation_id: ConversationId,
        system_prompt: impl Into<String>,
        placement: SystemPromptPlacement,
    ) -> Self {
        let mut store = Self::new(conversation_id, system_prompt);
        if placement == SystemPromptPlacement::InHistory {
            let system = Message::system(store.system_prompt.clone());
            store.messages.push(system);
        }
        store
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Remove and return the last entry.
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Adopt a persisted state.
    ///
    /// Returns `false` and leaves the store untouched when the state belongs
    /// to another conversation.
    pub fn load(&mut self, state: ConversationState) -> bool {
        if state.conversation_id != self.conversation_id {
            return false;
        }
        self.messages = state.messages;
        self.system_prompt = state.system_prompt;
        true
    }

    /// Snapshot for persistence, stamped with the current time.
    pub fn to_state(&self) -> ConversationState {
        ConversationState {
            messages: self.messages.clone(),
            system_prompt: self.system_prompt.clone(),
            conversation_id: self.conversation_id.clone(),
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> ConversationId {
        ConversationId::from("conv_run")
    }

    #[test]
    fn fresh_in_history_starts_with_system() {
        let store = MessageStore::fresh(conv(), "persona", SystemPromptPlacement::InHistory);
        assert_eq!(store.all(), &[Message::system("persona")]);
        assert_eq!(store.count_by_role(Role::System), 1);
    }

    #[test]
    fn fresh_detached_is_empty() {
        let store = MessageStore::fresh(conv(), "persona", SystemPromptPlacement::Detached);
        assert!(store.is_empty());
        assert_eq!(store.system_prompt(), "persona");
    }

    #[test]
    fn append_and_count() {
        let mut store = MessageStore::fresh(conv(), "p", SystemPromptPlacement::InHistory);
        store.append(Message::user("q1"));
        store.append(Message::assistant("a1"));
        store.append(Message::user("q2"));
        assert_eq!(store.count_by_role(Role::User), 2);
        assert_eq!(store.count_by_role(Role::Assistant), 1);
        assert_eq!(store.len(), 4);
        assert_eq!(store.pop(), Some(Message::user("q2")));
        assert_eq!(store.last(), Some(&Message::assistant("a1")));
    }

    #[test]
    fn load_accepts_matching_conversation() {
        let mut store = MessageStore::fresh(conv(), "new persona", SystemPromptPlacement::InHistory);
        let state = ConversationState {
            messages: vec![
                Message::system("old persona"),
                Message::user("q"),
                Message::assistant("a"),
            ],
            system_prompt: "old persona".into(),
            conversation_id: conv(),
            last_updated: Utc::now(),
        };
        assert!(store.load(state));
        assert_eq!(store.len(), 3);
        assert_eq!(store.system_prompt(), "old persona");
    }

    #[test]
    fn load_rejects_other_conversation_without_mutation() {
        let mut store = MessageStore::fresh(conv(), "persona", SystemPromptPlacement::InHistory);
        let before = store.all().to_vec();
        let state = ConversationState {
            messages: vec![Message::user("stale"), Message::assistant("stale")],
            system_prompt: "other".into(),
            conversation_id: ConversationId::from("conv_other"),
            last_updated: Utc::now(),
        };
        assert!(!store.load(state));
        assert_eq!(store.all(), before.as_slice());
        assert_eq!(store.system_prompt(), "persona");
    }

    #[test]
    fn to_state_round_trips() {
        let mut store = MessageStore::fresh(conv(), "persona", SystemPromptPlacement::InHistory);
        for i in 0..4 {
            store.append(Message::user(format!("q{i}")));
            store.append(Message::assistant(format!("a{i}")));
        }
        let state = store.to_state();
        assert_eq!(state.conversation_id, conv());
        assert_eq!(state.messages.len(), 9);
        assert_eq!(state.message_count(), 8);

        let mut reloaded = MessageStore::new(conv(), "");
        assert!(reloaded.load(state));
        assert_eq!(reloaded.all(), store.all());
    }
}
