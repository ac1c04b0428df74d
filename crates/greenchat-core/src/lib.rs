//! Core domain and application logic for the GREEN-API WhatsApp chat client.
//!
//! The gateway lives behind the [`gateway::Gateway`] port; the HTTP adapter
//! and the terminal front end are separate crates.

pub mod chat;
pub mod config;
pub mod domain;
pub mod drain;
pub mod errors;
pub mod events;
pub mod flow;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod poller;
pub mod send;
pub mod transcript;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
