//! Link to the local game process
//!
//! Handles the TCP connection to AM2R, including:
//! - Dialing with a bounded timeout
//! - Framed request/response exchanges with split write and read budgets
//! - Fault classification and the status state machine
//! - Teardown and redial

mod status;
mod supervisor;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use status::*;
pub use supervisor::*;
pub use transport::*;
