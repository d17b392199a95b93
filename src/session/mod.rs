//! Scan sessions: drive capture, decode and routing to a single outcome.

mod controls;
mod scanner;
mod state;
#[cfg(test)]
mod tests;

pub use controls::{ScanControls, ScanInputs};
pub use scanner::{ScanReport, Scanner};
pub use state::{ScanSession, SessionState};
