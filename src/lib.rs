// Library interface for scrcbot
// This allows integration tests to access internal modules

pub mod car;
pub mod config;
pub mod driver;
pub mod errors;
pub mod logger;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use car::{CarControl, CarState};
pub use config::{ClientConfig, Stage};
pub use driver::{Driver, NoOverrides, OverrideSource, OverrideState, PolicyState, SharedOverrides};
pub use errors::ScrcError;
pub use logger::TelemetryLog;
pub use protocol::Message;
pub use session::{SessionClient, SessionState, Transport, UdpTransport};
