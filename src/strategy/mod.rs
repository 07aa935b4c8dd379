// Trading decision rules
pub mod toggle;

use crate::models::{ActionDecision, Position};

pub use toggle::PositionToggle;

/// A decision plus the reason behind it, for the status line
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: ActionDecision,
    pub reason: String,
}

/// Base trait for decision rules.
///
/// Implementations are pure: they see a fresh position read and the session state,
/// and keep no belief of their own about what is held.
pub trait Strategy: Send + Sync {
    fn decide(&self, session_open: bool, position: Option<&Position>) -> Decision;

    /// Get strategy name
    fn name(&self) -> &str;
}
