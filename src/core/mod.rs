pub mod chat;
pub mod chat_stream;
pub mod config;
pub mod keyring;
pub mod message;
pub mod retry;
pub mod routing;
pub mod session;
pub mod transcript;
