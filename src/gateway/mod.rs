// Capability traits for the external backends
pub mod memory;

use crate::error::BotError;
use crate::models::{ContentItem, OrderReceipt, OrderSide, Playlist, Position, SessionClock};
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use memory::{InMemoryBroker, InMemoryCatalog};

/// Market clock source
#[async_trait]
pub trait ClockGateway: Send + Sync {
    /// Current session state. No retries here; the loop owns retry policy.
    async fn snapshot(&self) -> Result<SessionClock>;
}

/// Position queries and order submission against the broker
#[async_trait]
pub trait PositionLedger: Send + Sync {
    async fn current_position(&self, symbol: &str) -> Result<Option<Position>>;

    async fn list_positions(&self) -> Result<Vec<Position>>;

    /// Orders accepted by the broker but not yet filled, cancelled or rejected
    async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderReceipt>>;

    async fn submit_order(&self, symbol: &str, quantity: i64, side: OrderSide)
        -> Result<OrderReceipt>;
}

/// Search and playlist creation against the content backend
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Id of the account playlists are created for
    async fn current_user_id(&self) -> Result<String>;

    /// Fails with `NoResults` when the search comes back empty
    async fn search_by_category(&self, label: &str, limit: usize) -> Result<Vec<ContentItem>>;

    async fn create_playlist(&self, owner_id: &str, name: &str) -> Result<Playlist>;

    async fn add_items(&self, playlist_id: &str, item_refs: &[String]) -> Result<()>;
}

/// Bound a gateway call. A call that outlives `limit` becomes `UpstreamUnavailable`.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BotError::upstream(
            operation,
            format!("timed out after {:?}", limit),
        )),
    }
}
