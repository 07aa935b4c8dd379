use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{with_timeout, PositionLedger};
use crate::models::{ActionDecision, OrderReceipt, SessionClock};
use crate::strategy::Strategy;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Submitted {
        decision: ActionDecision,
        receipt: OrderReceipt,
    },
    Skipped {
        decision: ActionDecision,
        reason: String,
    },
}

/// Reads the ledger, asks the strategy, and submits at most one order per call
pub struct Executor {
    ledger: Arc<dyn PositionLedger>,
    strategy: Box<dyn Strategy>,
    symbol: String,
    order_quantity: i64,
    call_timeout: Duration,
}

impl Executor {
    pub fn new(
        ledger: Arc<dyn PositionLedger>,
        strategy: Box<dyn Strategy>,
        symbol: impl Into<String>,
        order_quantity: i64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            strategy,
            symbol: symbol.into(),
            order_quantity,
            call_timeout,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Run one decide-and-dispatch step for the traded symbol.
    ///
    /// Position and pending orders are read fresh right before the decision, so an
    /// order is never submitted from a previous tick's view of the ledger.
    pub async fn execute(&self, clock: &SessionClock) -> Result<TradeOutcome> {
        let position = with_timeout(
            self.call_timeout,
            "position lookup",
            self.ledger.current_position(&self.symbol),
        )
        .await?;

        let decision = self.strategy.decide(clock.is_open, position.as_ref());
        tracing::info!(
            symbol = %self.symbol,
            strategy = self.strategy.name(),
            "Determined action for {}: {} ({})",
            self.symbol,
            decision.action,
            decision.reason
        );

        let side = match decision.action.side() {
            Some(side) => side,
            None => {
                return Ok(TradeOutcome::Skipped {
                    decision: decision.action,
                    reason: decision.reason,
                })
            }
        };

        // An unfilled order from an earlier tick is not reflected in the position yet
        let pending = with_timeout(
            self.call_timeout,
            "open order lookup",
            self.ledger.open_orders(&self.symbol),
        )
        .await?;
        if let Some(order) = pending.first() {
            return Ok(TradeOutcome::Skipped {
                decision: decision.action,
                reason: format!(
                    "{} order {} still pending ({})",
                    order.side, order.id, order.status
                ),
            });
        }

        // Closing a short takes a buy, so a held position dictates both side and size
        let (side, quantity) = match (&decision.action, &position) {
            (ActionDecision::Sell, Some(held)) => held.closing_order(),
            _ => (side, self.order_quantity),
        };

        let receipt = with_timeout(
            self.call_timeout,
            "order submission",
            self.ledger.submit_order(&self.symbol, quantity, side),
        )
        .await?;

        Ok(TradeOutcome::Submitted {
            decision: decision.action,
            receipt,
        })
    }
}
