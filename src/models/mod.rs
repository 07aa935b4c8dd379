use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market clock as reported by the broker. Fetched fresh every tick, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClock {
    pub is_open: bool,
    pub now: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
    pub next_open: Option<DateTime<Utc>>,
}

impl SessionClock {
    /// Time left until the session closes (negative once past close)
    pub fn time_to_close(&self) -> chrono::Duration {
        self.next_close - self.now
    }
}

/// An open position. Its existence is the only "holding" signal we track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Negative for shorts
    pub quantity: i64,
}

impl Position {
    /// Side and size of the order that flattens this position
    pub fn closing_order(&self) -> (OrderSide, i64) {
        if self.quantity < 0 {
            (OrderSide::Buy, -self.quantity)
        } else {
            (OrderSide::Sell, self.quantity)
        }
    }
}

/// Price change for a symbol, captured once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub symbol: String,
    pub price_change: Decimal,
}

impl PriceObservation {
    pub fn new(symbol: impl Into<String>, price_change: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price_change,
        }
    }
}

/// What the state machine wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDecision {
    Buy,
    Sell,
    None,
}

impl ActionDecision {
    pub fn side(self) -> Option<OrderSide> {
        match self {
            ActionDecision::Buy => Some(OrderSide::Buy),
            ActionDecision::Sell => Some(OrderSide::Sell),
            ActionDecision::None => None,
        }
    }
}

impl fmt::Display for ActionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionDecision::Buy => write!(f, "buy"),
            ActionDecision::Sell => write!(f, "sell"),
            ActionDecision::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Broker acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    pub status: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
}

/// Lifecycle of the control loop itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopPhase {
    Waiting,
    Trading,
    Liquidating,
    Stopped,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Waiting => write!(f, "waiting"),
            LoopPhase::Trading => write!(f, "trading"),
            LoopPhase::Liquidating => write!(f, "liquidating"),
            LoopPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// A searchable content item (a track, for Spotify)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub name: String,
    pub uri: String,
    pub artist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}
