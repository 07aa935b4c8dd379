use super::{Decision, Strategy};
use crate::models::{ActionDecision, Position};

/// Position-presence toggle
///
/// Opens a position when none is held and closes it when one is, one order per tick.
/// Never trades while the session is closed.
///
/// States (inferred from the ledger each tick, never stored):
/// - NoPosition → buy
/// - Holding → sell
#[derive(Debug, Clone, Default)]
pub struct PositionToggle;

impl PositionToggle {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for PositionToggle {
    fn decide(&self, session_open: bool, position: Option<&Position>) -> Decision {
        if !session_open {
            return Decision {
                action: ActionDecision::None,
                reason: "Market closed".to_string(),
            };
        }

        match position {
            Some(position) => Decision {
                action: ActionDecision::Sell,
                reason: format!("Holding {} {}, closing it", position.quantity, position.symbol),
            },
            None => Decision {
                action: ActionDecision::Buy,
                reason: "No open position, opening one".to_string(),
            },
        }
    }

    fn name(&self) -> &str {
        "PositionToggle"
    }
}
