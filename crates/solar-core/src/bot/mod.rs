//! Telegram chat commands
//!
//! [`Dispatcher`] polls a [`BotTransport`] for new updates and answers
//! `/start` and `/status` from the authorized chat.

mod dispatcher;
pub mod telegram;

use alloc::string::String;
use alloc::vec::Vec;

use thiserror_no_std::Error;

use crate::net::NetError;

pub use dispatcher::{
    Dispatcher, PollLimiter, PollOutcome, START_COMMAND, STATUS_COMMAND, UNAUTHORIZED_REPLY,
};
pub use telegram::TelegramClient;

/// One inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub chat_id: String,
    /// Sender's first name. May be empty.
    pub sender_name: String,
    pub text: String,
}

/// A bot update. Only text messages carry a [`CommandMessage`]; the others
/// are still acknowledged through their id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: i64,
    pub message: Option<CommandMessage>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    #[error("bot transport: {0}")]
    Net(#[from] NetError),
    #[error("bot API answered HTTP {0}")]
    Status(u16),
    #[error("bot API error: {0}")]
    Api(heapless::String<64>),
    #[error("could not decode bot API response")]
    Decode,
}

pub trait BotTransport {
    /// Fetch updates with an id of `offset` or above.
    fn get_updates(&mut self, offset: i64) -> impl Future<Output = Result<Vec<Update>, BotError>>;

    fn send_message(&mut self, chat_id: &str, text: &str) -> impl Future<Output = Result<(), BotError>>;
}
