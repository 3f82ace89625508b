//! The host bridge: list building, value marshaling, execution dispatch
//! and output capture, tied together by [`Session`].

pub mod builder;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod marshal;
pub mod session;

pub use dispatch::ExecutionOutcome;
pub use error::BridgeError;
pub use session::Session;
