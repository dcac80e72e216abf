pub mod controller;
pub mod gate;

pub use controller::{SessionController, SessionSnapshot, SessionStatus};
pub use gate::{GateDecision, ProfileGate, ProfileSetup};
