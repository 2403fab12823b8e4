//! Wire formats spoken by the connector
//!
//! - `frame`: newline-delimited JSON frames exchanged with the local game
//! - `messages`: the game payload/response shapes
//! - `packets`: multiworld server packets (JSON arrays tagged by `cmd`)

mod frame;
mod messages;
mod packets;

pub use frame::*;
pub use messages::*;
pub use packets::*;
