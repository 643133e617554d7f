//! Wire framing, serial transport, and typed commands for the AAG
//! CloudWatcher's 15-byte block protocol.

pub mod command;
pub mod frame;
pub mod transport;

pub use command::*;
pub use frame::*;
pub use transport::*;
