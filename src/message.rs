use serde::{Deserialize, Serialize};

/// A single conversation turn, the unit of capability history.
///
/// Every [`Capability`](crate::traversal::Capability) invocation receives the
/// node's accumulated history as a slice of messages and returns the new turns
/// to append. Roles follow the usual chat convention; use the constants on
/// [`Message`] for the standard ones.
///
/// # Examples
///
/// ```
/// use botmark::message::Message;
///
/// let user = Message::user("What's the weather like?");
/// let reply = Message::assistant("Sunny.");
/// assert!(user.has_role(Message::USER));
/// assert!(!reply.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the turn.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
