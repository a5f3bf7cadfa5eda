pub mod audio;
pub mod config;
pub mod gate;
pub mod keys;
pub mod midi;
pub mod session;
pub mod telemetry;
pub mod terminal;

pub use gate::PauseGate;
pub use session::{CaptureSession, SessionConfig, SessionState};
