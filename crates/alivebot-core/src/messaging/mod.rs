//! Cross-messenger abstractions (Telegram today; anything with a chat id later).

pub mod port;
pub mod throttled;
pub mod types;
