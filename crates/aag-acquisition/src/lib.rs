//! Sensor session, acquisition loop, shared state snapshot, and the SOLO
//! export schema.

pub mod loop_;
pub mod session;
pub mod solo;
pub mod state;

pub use loop_::AcquisitionLoop;
pub use session::{SensorError, SensorSession, SessionConfig, StateError};
pub use solo::{reading_to_solo, SoloSnapshot};
pub use state::{SharedState, StateSnapshot};
