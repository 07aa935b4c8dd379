use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{with_timeout, PositionLedger};
use crate::models::{OrderReceipt, Position, SessionClock};
use crate::Result;

/// Reference closing window: start flattening 20 minutes before the bell
pub const DEFAULT_CLOSING_WINDOW: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone)]
pub struct SweepFailure {
    pub position: Position,
    pub error: String,
}

/// What the sweep managed to close, and what it could not
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub closed: Vec<(Position, OrderReceipt)>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn attempted(&self) -> usize {
        self.closed.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Force-closes every open position ahead of the session close
pub struct LiquidationSweep {
    ledger: Arc<dyn PositionLedger>,
    closing_window: Duration,
    call_timeout: Duration,
}

impl LiquidationSweep {
    pub fn new(
        ledger: Arc<dyn PositionLedger>,
        closing_window: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            closing_window,
            call_timeout,
        }
    }

    /// True once the time left until close is inside the closing window
    pub fn is_due(&self, clock: &SessionClock) -> bool {
        match chrono::Duration::from_std(self.closing_window) {
            Ok(window) => clock.time_to_close() <= window,
            // A window too large for chrono is always "inside"
            Err(_) => true,
        }
    }

    /// Close every open position, not just the traded symbol.
    ///
    /// Only a failure to enumerate positions is returned as an error. A failed
    /// order for one position is recorded and the sweep moves on to the next.
    /// A position with an unfilled order is left alone and recorded as failed.
    pub async fn run(&self) -> Result<SweepReport> {
        let positions = with_timeout(
            self.call_timeout,
            "position listing",
            self.ledger.list_positions(),
        )
        .await?;

        tracing::warn!(
            "🔔 Closing window reached - liquidating {} open position(s)",
            positions.len()
        );

        let mut report = SweepReport::default();

        for (i, position) in positions.into_iter().enumerate() {
            // A pending order would fill on top of the closing order
            if let Some(error) = self.pending_order(&position.symbol).await {
                tracing::error!("  ✗ Skipping {}: {}", position.symbol, error);
                report.failed.push(SweepFailure { position, error });
                continue;
            }

            let (side, quantity) = position.closing_order();
            tracing::info!(
                "  [{}] {} {} {} to close",
                i + 1,
                side,
                quantity,
                position.symbol
            );

            let result = with_timeout(
                self.call_timeout,
                "order submission",
                self.ledger.submit_order(&position.symbol, quantity, side),
            )
            .await;

            match result {
                Ok(receipt) => {
                    tracing::info!(
                        "  ✓ Liquidation order {} for {} - status: {}",
                        receipt.id,
                        position.symbol,
                        receipt.status
                    );
                    report.closed.push((position, receipt));
                }
                Err(e) => {
                    tracing::error!("  ✗ Failed to liquidate {}: {}", position.symbol, e);
                    report.failed.push(SweepFailure {
                        position,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Liquidation sweep finished: {} closed, {} failed",
            report.closed.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Why `symbol` cannot be closed yet, if it has an unfilled order or its orders cannot be read
    async fn pending_order(&self, symbol: &str) -> Option<String> {
        let pending = with_timeout(
            self.call_timeout,
            "open order lookup",
            self.ledger.open_orders(symbol),
        )
        .await;

        match pending {
            Ok(orders) => orders.first().map(|order| {
                format!(
                    "{} order {} still pending ({})",
                    order.side, order.id, order.status
                )
            }),
            Err(e) => Some(e.to_string()),
        }
    }
}
