//! In-memory broker and content catalog
//!
//! Paper doubles for the capability traits. `--dry-run` drives the loop against them,
//! and the test suite scripts failures through them.

use crate::error::BotError;
use crate::gateway::{ClockGateway, ContentGateway, PositionLedger};
use crate::models::{ContentItem, OrderReceipt, OrderSide, Playlist, Position, SessionClock};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

enum ClockSource {
    /// Replays snapshots in order, then keeps returning the last one
    Scripted(VecDeque<SessionClock>),
    /// Open from now until `next_close`, in wall-clock time
    Live { next_close: DateTime<Utc> },
}

struct BrokerState {
    clock: ClockSource,
    clock_polls: u32,
    clock_failures: u32,
    ledger_failures: u32,
    positions: BTreeMap<String, i64>,
    open_orders: Vec<OrderReceipt>,
    submitted: Vec<OrderReceipt>,
    rejections: HashMap<String, String>,
    fill_on_submit: bool,
}

/// Paper broker: market clock plus position ledger
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl InMemoryBroker {
    /// Broker whose clock always reports `clock`
    pub fn new(clock: SessionClock) -> Self {
        Self::scripted(vec![clock])
    }

    /// Broker replaying `clocks` one per poll, repeating the last
    pub fn scripted(clocks: Vec<SessionClock>) -> Self {
        Self::with_source(ClockSource::Scripted(clocks.into()))
    }

    /// Broker with a session that is open until `next_close`
    pub fn live_session(next_close: DateTime<Utc>) -> Self {
        Self::with_source(ClockSource::Live { next_close })
    }

    fn with_source(clock: ClockSource) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                clock,
                clock_polls: 0,
                clock_failures: 0,
                ledger_failures: 0,
                positions: BTreeMap::new(),
                open_orders: Vec::new(),
                submitted: Vec::new(),
                rejections: HashMap::new(),
                fill_on_submit: true,
            }),
        }
    }

    pub fn with_position(self, symbol: &str, quantity: i64) -> Self {
        self.lock().positions.insert(symbol.to_string(), quantity);
        self
    }

    /// Leave submitted orders open until `fill_open_orders` is called
    pub fn with_deferred_fills(self) -> Self {
        self.lock().fill_on_submit = false;
        self
    }

    /// Reject every order for `symbol` with `reason`
    pub fn reject_orders_for(self, symbol: &str, reason: &str) -> Self {
        self.lock()
            .rejections
            .insert(symbol.to_string(), reason.to_string());
        self
    }

    /// Make the next `count` clock polls fail
    pub fn fail_clock_polls(&self, count: u32) {
        self.lock().clock_failures = count;
    }

    /// Make the next `count` position/order reads fail
    pub fn fail_ledger_reads(&self, count: u32) {
        self.lock().ledger_failures = count;
    }

    pub fn set_clock(&self, clock: SessionClock) {
        self.lock().clock = ClockSource::Scripted(VecDeque::from([clock]));
    }

    /// Fill every open order, applying it to positions
    pub fn fill_open_orders(&self) -> usize {
        let mut state = self.lock();
        let orders: Vec<OrderReceipt> = state.open_orders.drain(..).collect();
        for order in &orders {
            apply_fill(&mut state.positions, order);
        }
        orders.len()
    }

    pub fn positions(&self) -> Vec<Position> {
        to_positions(&self.lock().positions)
    }

    pub fn submitted_orders(&self) -> Vec<OrderReceipt> {
        self.lock().submitted.clone()
    }

    pub fn clock_polls(&self) -> u32 {
        self.lock().clock_polls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_ledger(state: &mut BrokerState, operation: &'static str) -> Result<()> {
        if state.ledger_failures > 0 {
            state.ledger_failures -= 1;
            return Err(BotError::upstream(operation, "simulated outage"));
        }
        Ok(())
    }
}

fn apply_fill(positions: &mut BTreeMap<String, i64>, order: &OrderReceipt) {
    let delta = match order.side {
        OrderSide::Buy => order.quantity,
        OrderSide::Sell => -order.quantity,
    };
    let quantity = positions.entry(order.symbol.clone()).or_insert(0);
    *quantity += delta;
    if *quantity == 0 {
        positions.remove(&order.symbol);
    }
}

fn to_positions(positions: &BTreeMap<String, i64>) -> Vec<Position> {
    positions
        .iter()
        .map(|(symbol, quantity)| Position {
            symbol: symbol.clone(),
            quantity: *quantity,
        })
        .collect()
}

#[async_trait]
impl ClockGateway for InMemoryBroker {
    async fn snapshot(&self) -> Result<SessionClock> {
        let mut state = self.lock();
        state.clock_polls += 1;

        if state.clock_failures > 0 {
            state.clock_failures -= 1;
            return Err(BotError::upstream("clock snapshot", "simulated outage"));
        }

        match &mut state.clock {
            ClockSource::Scripted(clocks) => {
                let clock = if clocks.len() > 1 {
                    clocks.pop_front()
                } else {
                    clocks.front().cloned()
                };
                clock.ok_or_else(|| BotError::upstream("clock snapshot", "no clock scripted"))
            }
            ClockSource::Live { next_close } => {
                let now = Utc::now();
                Ok(SessionClock {
                    is_open: now < *next_close,
                    now,
                    next_close: *next_close,
                    next_open: None,
                })
            }
        }
    }
}

#[async_trait]
impl PositionLedger for InMemoryBroker {
    async fn current_position(&self, symbol: &str) -> Result<Option<Position>> {
        let mut state = self.lock();
        Self::check_ledger(&mut state, "position lookup")?;

        Ok(state.positions.get(symbol).map(|quantity| Position {
            symbol: symbol.to_string(),
            quantity: *quantity,
        }))
    }

    async fn list_positions(&self) -> Result<Vec<Position>> {
        let mut state = self.lock();
        Self::check_ledger(&mut state, "position listing")?;
        Ok(to_positions(&state.positions))
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderReceipt>> {
        let mut state = self.lock();
        Self::check_ledger(&mut state, "open order lookup")?;

        Ok(state
            .open_orders
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn submit_order(
        &self,
        symbol: &str,
        quantity: i64,
        side: OrderSide,
    ) -> Result<OrderReceipt> {
        let mut state = self.lock();

        if let Some(reason) = state.rejections.get(symbol) {
            return Err(BotError::OrderRejected(reason.clone()));
        }

        let filled = state.fill_on_submit;
        let receipt = OrderReceipt {
            id: Uuid::new_v4().to_string(),
            status: if filled { "filled" } else { "accepted" }.to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
        };

        if filled {
            apply_fill(&mut state.positions, &receipt);
        } else {
            state.open_orders.push(receipt.clone());
        }
        state.submitted.push(receipt.clone());

        Ok(receipt)
    }
}

#[derive(Default)]
struct CatalogState {
    by_category: HashMap<String, Vec<ContentItem>>,
    fallback: Vec<ContentItem>,
    searches: Vec<String>,
    playlists: Vec<(Playlist, Vec<String>)>,
    unavailable: bool,
}

/// Content catalog with canned search results
pub struct InMemoryCatalog {
    user_id: String,
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(CatalogState::default()),
        }
    }

    pub fn with_items(self, category: &str, items: Vec<ContentItem>) -> Self {
        self.lock().by_category.insert(category.to_string(), items);
        self
    }

    /// Items returned for any category without its own entry
    pub fn with_fallback_items(self, items: Vec<ContentItem>) -> Self {
        self.lock().fallback = items;
        self
    }

    /// Make every call fail with `UpstreamUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn searches(&self) -> Vec<String> {
        self.lock().searches.clone()
    }

    /// Playlists created so far, with the item refs added to each
    pub fn playlists(&self) -> Vec<(Playlist, Vec<String>)> {
        self.lock().playlists.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(state: &CatalogState, operation: &'static str) -> Result<()> {
        if state.unavailable {
            return Err(BotError::upstream(operation, "simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentGateway for InMemoryCatalog {
    async fn current_user_id(&self) -> Result<String> {
        Self::check_available(&self.lock(), "user lookup")?;
        Ok(self.user_id.clone())
    }

    async fn search_by_category(&self, label: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let mut state = self.lock();
        Self::check_available(&state, "content search")?;
        state.searches.push(label.to_string());

        let items: Vec<ContentItem> = state
            .by_category
            .get(label)
            .unwrap_or(&state.fallback)
            .iter()
            .take(limit)
            .cloned()
            .collect();

        if items.is_empty() {
            return Err(BotError::NoResults(label.to_string()));
        }
        Ok(items)
    }

    async fn create_playlist(&self, owner_id: &str, name: &str) -> Result<Playlist> {
        let mut state = self.lock();
        Self::check_available(&state, "playlist creation")?;

        let id = format!("pl-{}-{}", owner_id, state.playlists.len() + 1);
        let playlist = Playlist {
            id,
            name: name.to_string(),
            url: None,
        };
        state.playlists.push((playlist.clone(), Vec::new()));
        Ok(playlist)
    }

    async fn add_items(&self, playlist_id: &str, item_refs: &[String]) -> Result<()> {
        let mut state = self.lock();
        Self::check_available(&state, "playlist update")?;

        let entry = state
            .playlists
            .iter_mut()
            .find(|(p, _)| p.id == playlist_id)
            .ok_or_else(|| BotError::upstream("playlist update", "unknown playlist"))?;
        entry.1.extend(item_refs.iter().cloned());
        Ok(())
    }
}
