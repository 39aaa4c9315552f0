use crate::domain::{ChatId, UserId};

/// Normalized inbound message, as delivered by a transport adapter.
///
/// `sender` is `None` for messages with no identifiable author (for example
/// channel posts), which the router treats as unregistered traffic.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub sender: Option<UserId>,
    pub sender_name: Option<String>,
    pub text: String,
}
