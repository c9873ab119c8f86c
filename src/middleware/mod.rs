//! HTTP middleware: token locator and request gate.

pub mod gate;
pub mod locate;

pub use gate::{authenticate, GateState};
pub use locate::locate_token;
