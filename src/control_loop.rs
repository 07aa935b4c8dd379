//! Single-worker trading loop
//!
//! One tick: poll the clock, then either wait out a closed market, liquidate inside
//! the closing window, or run one trading step followed by the playlist side effect.
//! Only a completed sweep or an operator stop ends `run`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::Settings;
use crate::content::{PlaylistCurator, PlaylistOutcome};
use crate::error::BotError;
use crate::execution::{Executor, LiquidationSweep, SweepReport, TradeOutcome};
use crate::gateway::{with_timeout, ClockGateway, PositionLedger};
use crate::models::LoopPhase;
use crate::scheduler::{Scheduler, Wake};
use crate::strategy::{PositionToggle, Strategy};
use crate::Result;

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// Clock poll failed; retried after the trading interval
    ClockUnavailable(BotError),
    MarketClosed,
    /// Inside the closing window but positions could not be listed; retried next tick
    SweepDeferred(BotError),
    Liquidated(SweepReport),
    Traded {
        trade: Result<TradeOutcome>,
        /// `None` when no curator is configured
        playlist: Option<Result<PlaylistOutcome>>,
    },
    /// The loop already reached `Stopped`; nothing was polled
    Halted,
}

#[derive(Debug)]
pub enum LoopExit {
    SweepCompleted(SweepReport),
    StopRequested,
}

pub struct ControlLoop {
    clock: Arc<dyn ClockGateway>,
    executor: Executor,
    sweep: LiquidationSweep,
    curator: Option<PlaylistCurator>,
    scheduler: Box<dyn Scheduler>,
    tick_interval: Duration,
    closed_backoff: Duration,
    call_timeout: Duration,
    phase: LoopPhase,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(
        settings: &Settings,
        clock: Arc<dyn ClockGateway>,
        ledger: Arc<dyn PositionLedger>,
        curator: Option<PlaylistCurator>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self::with_strategy(
            settings,
            clock,
            ledger,
            Box::new(PositionToggle::new()),
            curator,
            scheduler,
        )
    }

    pub fn with_strategy(
        settings: &Settings,
        clock: Arc<dyn ClockGateway>,
        ledger: Arc<dyn PositionLedger>,
        strategy: Box<dyn Strategy>,
        curator: Option<PlaylistCurator>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let call_timeout = settings.gateway_timeout();
        Self {
            clock,
            executor: Executor::new(
                ledger.clone(),
                strategy,
                settings.symbol.clone(),
                settings.order_quantity,
                call_timeout,
            ),
            sweep: LiquidationSweep::new(ledger, settings.closing_window(), call_timeout),
            curator,
            scheduler,
            tick_interval: settings.tick_interval(),
            closed_backoff: settings.closed_backoff(),
            call_timeout,
            phase: LoopPhase::Waiting,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Ticks started so far (including failed ones)
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run until the closing sweep completes or a stop is requested
    pub async fn run(&mut self) -> LoopExit {
        tracing::info!(
            "🚀 Control loop starting: trading {} every {:?} (closed-market backoff {:?})",
            self.executor.symbol(),
            self.tick_interval,
            self.closed_backoff
        );

        loop {
            if self.scheduler.stop_requested() {
                return self.stop_on_request();
            }

            let pause = match self.tick().await {
                TickOutcome::Liquidated(report) => {
                    tracing::info!(
                        "👋 Session done: {} position(s) closed, {} failed",
                        report.closed.len(),
                        report.failed.len()
                    );
                    return LoopExit::SweepCompleted(report);
                }
                // Stepped to completion before run() was called
                TickOutcome::Halted => return LoopExit::StopRequested,
                TickOutcome::MarketClosed => self.closed_backoff,
                _ => self.tick_interval,
            };

            if self.scheduler.sleep(pause).await == Wake::Stopped {
                return self.stop_on_request();
            }
        }
    }

    /// One pass of the loop. Never fails: every error is logged and folded into the outcome.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.phase == LoopPhase::Stopped {
            return TickOutcome::Halted;
        }

        self.ticks += 1;
        tracing::info!(
            "💹 [TICK {}] {} ({})",
            self.ticks,
            Utc::now().format("%H:%M:%S"),
            self.phase
        );

        let clock = match with_timeout(self.call_timeout, "clock snapshot", self.clock.snapshot())
            .await
        {
            Ok(clock) => clock,
            Err(e) => {
                tracing::error!("✗ {} - retrying in {:?}", e, self.tick_interval);
                return TickOutcome::ClockUnavailable(e);
            }
        };

        if !clock.is_open {
            self.set_phase(LoopPhase::Waiting);
            match clock.next_open {
                Some(next_open) => tracing::info!(
                    "Market is closed (opens {}). Waiting {:?}...",
                    next_open.format("%Y-%m-%d %H:%M UTC"),
                    self.closed_backoff
                ),
                None => {
                    tracing::info!("Market is closed. Waiting {:?}...", self.closed_backoff)
                }
            }
            return TickOutcome::MarketClosed;
        }

        // A deferred sweep stays due even if the clock drifts back out of the window
        if self.phase == LoopPhase::Liquidating || self.sweep.is_due(&clock) {
            return self.liquidate().await;
        }

        self.set_phase(LoopPhase::Trading);
        tracing::info!(
            "Market open, {} min to close",
            clock.time_to_close().num_minutes()
        );

        let trade = self.executor.execute(&clock).await;
        log_trade(&trade);

        let playlist = match &self.curator {
            Some(curator) => {
                let result = curator.curate().await;
                log_playlist(&result);
                Some(result)
            }
            None => None,
        };

        TickOutcome::Traded { trade, playlist }
    }

    async fn liquidate(&mut self) -> TickOutcome {
        self.set_phase(LoopPhase::Liquidating);

        match self.sweep.run().await {
            Ok(report) => {
                for failure in &report.failed {
                    tracing::error!(
                        "  ✗ {} ({} shares) left open: {}",
                        failure.position.symbol,
                        failure.position.quantity,
                        failure.error
                    );
                }
                self.set_phase(LoopPhase::Stopped);
                TickOutcome::Liquidated(report)
            }
            Err(e) => {
                tracing::error!("✗ Liquidation deferred to next tick: {}", e);
                TickOutcome::SweepDeferred(e)
            }
        }
    }

    fn stop_on_request(&mut self) -> LoopExit {
        tracing::info!("⚠️  Stop requested, leaving loop in phase {}", self.phase);
        self.set_phase(LoopPhase::Stopped);
        LoopExit::StopRequested
    }

    fn set_phase(&mut self, phase: LoopPhase) {
        if self.phase != phase {
            tracing::debug!("Phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

fn log_trade(trade: &Result<TradeOutcome>) {
    match trade {
        Ok(TradeOutcome::Submitted { decision, receipt }) => tracing::info!(
            "✓ {} order {} for {} {} - status: {}",
            decision,
            receipt.id,
            receipt.quantity,
            receipt.symbol,
            receipt.status
        ),
        Ok(TradeOutcome::Skipped { reason, .. }) => {
            tracing::info!("  No order this tick: {}", reason)
        }
        Err(BotError::OrderRejected(reason)) => {
            tracing::warn!("✗ Order rejected: {}", reason)
        }
        Err(e) => tracing::error!("✗ Trading step failed: {}", e),
    }
}

fn log_playlist(result: &Result<PlaylistOutcome>) {
    match result {
        Ok(_) => {}
        Err(BotError::NoResults(category)) => {
            tracing::warn!("No tracks found for category '{}', no playlist this tick", category)
        }
        Err(e) => tracing::error!("✗ Playlist step failed: {}", e),
    }
}
