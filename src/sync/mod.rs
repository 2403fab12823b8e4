//! Sync loop between the connector and the game

mod runner;

pub use runner::*;
