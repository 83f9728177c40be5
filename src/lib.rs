//! Mande is a terminal client for the Gemini API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the transcript model, turn orchestration, the streaming
//!   aggregator and its retry policy, sessions, and configuration.
//! - [`providers`] defines the model collaborator traits and the Gemini REST
//!   client behind them; [`api`] holds the wire payloads it exchanges.
//! - [`news`] fetches RSS items and turns them into press clippings.
//! - [`ui`] parses answer markdown into blocks and styles them for the terminal.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod news;
pub mod providers;
pub mod ui;
pub mod utils;
