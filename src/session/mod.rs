//! Multiworld server session

mod client;

pub use client::*;
