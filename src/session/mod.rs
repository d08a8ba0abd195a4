//! Per-connection sessions: one generator, one velocity window and one tick
//! schedule each, sharing nothing mutable with other sessions.

pub mod lifecycle;
pub mod registry;
pub mod sink;

pub use lifecycle::{Session, SessionBuilder, SessionExit};
pub use registry::SessionRegistry;
pub use sink::{ChannelSink, ResultSink};
