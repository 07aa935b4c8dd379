use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::AlpacaCredentials;
use crate::error::BotError;
use crate::gateway::{ClockGateway, PositionLedger};
use crate::models::{OrderReceipt, OrderSide, Position, SessionClock};
use crate::Result;

const KEY_ID_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_KEY_HEADER: &str = "APCA-API-SECRET-KEY";

/// Client for the Alpaca trading API (paper or live, depending on the base URL)
#[derive(Clone)]
pub struct AlpacaClient {
    client: Client,
    base_url: String,
    key_id: String,
    secret_key: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ClockRaw {
    timestamp: DateTime<Utc>,
    is_open: bool,
    #[serde(default)]
    next_open: Option<DateTime<Utc>>,
    next_close: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PositionRaw {
    symbol: String,
    qty: String,
    #[serde(default)]
    side: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderRaw {
    id: String,
    symbol: String,
    side: OrderSide,
    status: String,
    /// Absent for notional orders
    #[serde(default)]
    qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    client_order_id: String,
}

// ============== Conversions ==============

fn parse_quantity(raw: &str) -> Option<i64> {
    raw.trim().parse::<Decimal>().ok()?.trunc().to_i64()
}

impl PositionRaw {
    fn into_position(self) -> Result<Position> {
        let quantity = parse_quantity(&self.qty).ok_or_else(|| {
            BotError::upstream("position read", format!("unreadable qty '{}'", self.qty))
        })?;

        // Older API versions report shorts as a positive qty with side=short
        let quantity = match self.side.as_deref() {
            Some("short") if quantity > 0 => -quantity,
            _ => quantity,
        };

        Ok(Position {
            symbol: self.symbol,
            quantity,
        })
    }
}

impl From<OrderRaw> for OrderReceipt {
    fn from(raw: OrderRaw) -> Self {
        OrderReceipt {
            quantity: raw.qty.as_deref().and_then(parse_quantity).unwrap_or(0),
            id: raw.id,
            status: raw.status,
            symbol: raw.symbol,
            side: raw.side,
        }
    }
}

// ============== Implementation ==============

impl AlpacaClient {
    pub fn new(credentials: AlpacaCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::StartupFailure(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            key_id: credentials.key_id,
            secret_key: credentials.secret_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        request
            .header(KEY_ID_HEADER, &self.key_id)
            .header(SECRET_KEY_HEADER, &self.secret_key)
            .send()
            .await
            .map_err(|e| BotError::upstream(operation, e))
    }

    async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(BotError::upstream(
                operation,
                format!("HTTP {}: {}", status, message),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BotError::upstream(operation, format!("malformed response: {}", e)))
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(if body.is_empty() { status.to_string() } else { body }),
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl ClockGateway for AlpacaClient {
    /// Endpoint: GET /v2/clock
    async fn snapshot(&self) -> Result<SessionClock> {
        let operation = "clock snapshot";
        let response = self
            .send(operation, self.client.get(self.url("/v2/clock")))
            .await?;
        let raw: ClockRaw = Self::decode(operation, response).await?;

        Ok(SessionClock {
            is_open: raw.is_open,
            now: raw.timestamp,
            next_close: raw.next_close,
            next_open: raw.next_open,
        })
    }
}

#[async_trait]
impl PositionLedger for AlpacaClient {
    /// Endpoint: GET /v2/positions/{symbol} (404 when flat)
    async fn current_position(&self, symbol: &str) -> Result<Option<Position>> {
        let operation = "position read";
        let url = self.url(&format!("/v2/positions/{}", symbol));
        let response = self.send(operation, self.client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: PositionRaw = Self::decode(operation, response).await?;
        let position = raw.into_position()?;
        Ok((position.quantity != 0).then_some(position))
    }

    /// Endpoint: GET /v2/positions
    async fn list_positions(&self) -> Result<Vec<Position>> {
        let operation = "position listing";
        let response = self
            .send(operation, self.client.get(self.url("/v2/positions")))
            .await?;
        let raw: Vec<PositionRaw> = Self::decode(operation, response).await?;

        raw.into_iter()
            .map(PositionRaw::into_position)
            .filter(|p| !matches!(p, Ok(position) if position.quantity == 0))
            .collect()
    }

    /// Endpoint: GET /v2/orders?status=open&symbols={symbol}
    async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderReceipt>> {
        let operation = "open order read";
        let request = self
            .client
            .get(self.url("/v2/orders"))
            .query(&[("status", "open"), ("symbols", symbol)]);
        let response = self.send(operation, request).await?;
        let raw: Vec<OrderRaw> = Self::decode(operation, response).await?;

        Ok(raw.into_iter().map(OrderReceipt::from).collect())
    }

    /// Endpoint: POST /v2/orders (market, good-till-cancelled)
    async fn submit_order(
        &self,
        symbol: &str,
        quantity: i64,
        side: OrderSide,
    ) -> Result<OrderReceipt> {
        let operation = "order submission";
        let body = OrderRequest {
            symbol,
            qty: quantity.to_string(),
            side,
            order_type: "market",
            time_in_force: "gtc",
            client_order_id: Uuid::new_v4().to_string(),
        };

        let request = self.client.post(self.url("/v2/orders")).json(&body);
        let response = self.send(operation, request).await?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(BotError::OrderRejected(error_message(response).await))
            }
            _ => {
                let raw: OrderRaw = Self::decode(operation, response).await?;
                Ok(raw.into())
            }
        }
    }
}
