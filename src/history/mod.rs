use crate::models::chat::{ Message, Role };

/// Number of trailing messages that make up the provider context. The client
/// trims to this before sending and the server trims again when it builds the
/// upstream payload.
pub const HISTORY_WINDOW: usize = 6;

/// Append-only, chronologically ordered list of turns for one chat screen.
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a completed exchange in one step so observers never see a user
    /// turn without its reply.
    pub fn push_exchange(&mut self, user: Message, reply: Message) {
        self.messages.reserve(2);
        self.messages.push(user);
        self.messages.push(reply);
    }

    /// The trailing `limit` messages, oldest first.
    pub fn window(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Trims `messages` to the trailing window and drops leading assistant turns
/// so the context always opens with a user turn.
pub fn context_window(messages: &[Message], limit: usize) -> &[Message] {
    let start = messages.len().saturating_sub(limit);
    let tail = &messages[start..];
    let first_user = tail
        .iter()
        .position(|m| m.role() == Role::User)
        .unwrap_or(tail.len());
    &tail[first_user..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convo(n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..n {
            let msg = if i % 2 == 0 {
                Message::user(format!("u{}", i)).unwrap()
            } else {
                Message::assistant(format!("a{}", i)).unwrap()
            };
            history.push(msg);
        }
        history
    }

    #[test]
    fn window_keeps_trailing_messages_in_order() {
        let history = convo(9);
        let window = history.window(HISTORY_WINDOW);
        let contents: Vec<&str> = window.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["a3", "u4", "a5", "u6", "a7", "u8"]);
    }

    #[test]
    fn window_larger_than_history_returns_everything() {
        let history = convo(3);
        assert_eq!(history.window(HISTORY_WINDOW).len(), 3);
    }

    #[test]
    fn context_window_starts_with_user_turn() {
        let history = convo(9);
        let ctx = context_window(history.messages(), HISTORY_WINDOW);
        assert_eq!(ctx.first().unwrap().content(), "u4");
        assert_eq!(ctx.len(), 5);
    }

    #[test]
    fn context_window_of_only_assistant_turns_is_empty() {
        let msgs = vec![Message::assistant("welcome").unwrap()];
        assert!(context_window(&msgs, HISTORY_WINDOW).is_empty());
    }
}
