use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A chat message as delivered by the transport. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub chat_id: Option<i64>,
}

impl InboundMessage {
    pub fn new(id: i64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            timestamp,
            chat_id: None,
        }
    }

    pub fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

/// Normalized trading instruction extracted from an [`InboundMessage`].
///
/// `symbol` is the exchange symbol (`TWIFUSDT`), `pair_code` keeps the
/// separator (`TWIF_USDT`). Only the template parser constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignal {
    pub(crate) symbol: String,
    pub(crate) pair_code: String,
    pub(crate) source: InboundMessage,
}

impl ParsedSignal {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn pair_code(&self) -> &str {
        &self.pair_code
    }

    pub fn source(&self) -> &InboundMessage {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "LIMIT")]
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

/// Why the risk gate refused an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NonPositiveNotional,
    CooldownActive,
    ExecutionPending,
    DailyTradeLimit,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NonPositiveNotional => "non_positive_notional",
            DenyReason::CooldownActive => "cooldown_active",
            DenyReason::ExecutionPending => "execution_pending",
            DenyReason::DailyTradeLimit => "daily_trade_limit",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a risk evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { notional: Decimal },
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    pub fn notional(&self) -> Option<Decimal> {
        match self {
            Decision::Allow { notional } => Some(*notional),
            Decision::Deny(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub notional: Decimal,
    pub side: Side,
    pub order_type: OrderType,
    pub slippage_bps: u32,
    /// Unit size. When absent, market orders are sized by `notional`.
    pub quantity: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub metadata: BTreeMap<String, String>,
}

impl OrderRequest {
    pub fn market_buy(symbol: impl Into<String>, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            notional,
            side: Side::Buy,
            order_type: OrderType::Market,
            slippage_bps: 0,
            quantity: None,
            limit_price: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAck {
    pub order_id: String,
    pub submitted_at: DateTime<Utc>,
}
