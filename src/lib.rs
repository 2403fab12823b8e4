//! AM2R Connector
//!
//! Keeps a running AM2R game in sync over a local newline-delimited JSON
//! socket, healing the link whenever the game restarts, and optionally holds
//! a session with a multiworld server.

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod link;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod sync;
