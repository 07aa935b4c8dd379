// Order dispatch and close-of-day liquidation
pub mod executor;
pub mod liquidation;

pub use executor::{Executor, TradeOutcome};
pub use liquidation::{LiquidationSweep, SweepFailure, SweepReport, DEFAULT_CLOSING_WINDOW};
