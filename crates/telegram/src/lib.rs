//! Telegram Bot API integration.
//!
//! - **Transport** (`api`): JSON-over-HTTPS calls to the Bot API, decoded into
//!   the `{ok, result, description}` envelope whatever the HTTP status.
//! - **Client** (`client`): the `MessagingClient` used by sync runs, with
//!   rate-limit waits and bounded retries.

pub mod api;
pub mod client;

pub use api::{ApiResponse, BotApi, HttpBotApi, TransportError};
pub use client::{rate_limit_wait, TelegramClient};
