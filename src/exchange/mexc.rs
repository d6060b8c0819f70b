use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Credentials, ModeConfig};
use crate::context::{ExecutionContext, TimeProvider};
use crate::exchange::adapter::{OrderExecutor, SubmissionError};
use crate::model::{OrderAck, OrderRequest, OrderType};

type HmacSha256 = Hmac<Sha256>;

const LIVE_BASE_URL: &str = "https://api.mexc.com";
const TESTNET_BASE_URL: &str = "https://testnet.mexc.com";
const ORDER_ENDPOINT: &str = "/api/v3/order";
const API_KEY_HEADER: &str = "X-MEXC-APIKEY";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const RECV_WINDOW_MS: u64 = 5000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    pub fn parse(raw: &str) -> Result<Self, SubmissionError> {
        match raw {
            "spot" => Ok(MarketType::Spot),
            "futures" => Ok(MarketType::Futures),
            other => Err(SubmissionError::Config(format!(
                "unknown market type {:?}",
                other
            ))),
        }
    }
}

/// Live MEXC REST executor (spot `/api/v3/order`).
pub struct MexcExecutor {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    market: MarketType,
    clock: Arc<dyn TimeProvider>,
}

pub fn base_url_for(environment: &str) -> Result<&'static str, SubmissionError> {
    match environment {
        "live" => Ok(LIVE_BASE_URL),
        "testnet" => Ok(TESTNET_BASE_URL),
        other => Err(SubmissionError::Config(format!(
            "unknown environment {:?}",
            other
        ))),
    }
}

impl MexcExecutor {
    pub fn new(
        credentials: Credentials,
        mode: &ModeConfig,
        ctx: &ExecutionContext,
    ) -> Result<Self, SubmissionError> {
        if credentials.api_key.trim().is_empty() || credentials.api_secret.trim().is_empty() {
            return Err(SubmissionError::Config(
                "api key/secret required for live trading".to_string(),
            ));
        }

        let base_url = match &mode.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => base_url_for(&mode.environment)?.to_string(),
        };
        let market = MarketType::parse(&mode.market_type)?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| SubmissionError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
            base_url,
            market,
            clock: ctx.time.clone(),
        })
    }

    async fn submit_spot(&self, order: &OrderRequest) -> Result<OrderAck, SubmissionError> {
        let params = build_order_params(order, self.clock.now_millis())?;
        let query = canonical_query(params)?;
        let signature = sign_payload(&self.api_secret, &query)?;
        let body = format!("{}&signature={}", query, signature);

        debug!(query = %query, "mexc canonical order query");

        let url = format!("{}{}", self.base_url, ORDER_ENDPOINT);
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(API_KEY_HEADER, &self.api_key)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        interpret_response(status.as_u16(), &text)
    }
}

#[async_trait]
impl OrderExecutor for MexcExecutor {
    async fn submit(&self, order: &OrderRequest) -> Result<OrderAck, SubmissionError> {
        info!(
            symbol = %order.symbol,
            side = order.side.as_str(),
            order_type = order.order_type.as_str(),
            notional = %order.notional,
            "Submitting MEXC order"
        );

        match self.market {
            MarketType::Spot => self.submit_spot(order).await,
            MarketType::Futures => Err(SubmissionError::Unsupported(
                "market futures not yet supported".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "mexc-rest"
    }
}

/// Order parameters before canonicalization.
pub fn build_order_params(
    order: &OrderRequest,
    timestamp_ms: i64,
) -> Result<BTreeMap<&'static str, String>, SubmissionError> {
    if order.symbol.trim().is_empty() {
        return Err(SubmissionError::InvalidRequest("empty symbol".to_string()));
    }

    let mut params = BTreeMap::new();
    params.insert("symbol", order.symbol.to_uppercase());
    params.insert("side", order.side.as_str().to_string());
    params.insert("type", order.order_type.as_str().to_string());
    params.insert("timestamp", timestamp_ms.to_string());
    params.insert("recvWindow", RECV_WINDOW_MS.to_string());

    match (order.order_type, order.quantity, order.limit_price) {
        (OrderType::Market, Some(qty), _) => {
            params.insert("quantity", format_decimal(qty));
        }
        (OrderType::Market, None, _) => {
            if order.notional <= Decimal::ZERO {
                return Err(SubmissionError::InvalidRequest(format!(
                    "invalid notional {}",
                    order.notional
                )));
            }
            // quoteOrderQty targets the notional size directly.
            params.insert("quoteOrderQty", format_decimal(order.notional));
        }
        (OrderType::Limit, Some(qty), Some(price)) => {
            params.insert("quantity", format_decimal(qty));
            params.insert("price", format_decimal(price));
            params.insert("timeInForce", "GTC".to_string());
        }
        (OrderType::Limit, _, _) => {
            return Err(SubmissionError::InvalidRequest(
                "limit orders require quantity and price".to_string(),
            ));
        }
    }

    Ok(params)
}

/// Sorted, form-urlencoded `k=v&k=v`. This exact string is what gets signed.
pub fn canonical_query<K, V, I>(params: I) -> Result<String, SubmissionError>
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    serde_urlencoded::to_string(&sorted)
        .map_err(|e| SubmissionError::InvalidRequest(format!("encode query: {}", e)))
}

/// Hex HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign_payload(secret: &str, payload: &str) -> Result<String, SubmissionError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SubmissionError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Shortest exact decimal string (`100`, `12.5`).
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

#[derive(Deserialize)]
struct MexcError {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct OrderPayload {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(rename = "orderId", default)]
    order_id: Value,
    #[serde(rename = "transactTime", default)]
    transact_time: Option<i64>,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    msg: Option<String>,
}

/// Map an order endpoint response onto an acknowledgement or a rejection.
/// 200 responses can still carry an application error code.
pub(crate) fn interpret_response(status: u16, body: &str) -> Result<OrderAck, SubmissionError> {
    if !(200..300).contains(&status) {
        return Err(match serde_json::from_str::<MexcError>(body) {
            Ok(api_err) => SubmissionError::Rejected {
                status,
                code: code_as_i64(&api_err.code),
                message: api_err.msg,
            },
            Err(_) => SubmissionError::Rejected {
                status,
                code: None,
                message: None,
            },
        });
    }

    let payload: OrderPayload = serde_json::from_str(body)
        .map_err(|e| SubmissionError::Decode(format!("{} | body: {}", e, body)))?;

    if !embedded_code_ok(&payload.code) {
        warn!(code = %payload.code, msg = ?payload.msg, "MEXC application error inside HTTP success");
        return Err(SubmissionError::Rejected {
            status,
            code: code_as_i64(&payload.code),
            message: payload.msg,
        });
    }

    let order_id = normalize_order_id(&payload.order_id);
    if order_id.is_empty() {
        return Err(SubmissionError::Decode(format!(
            "missing orderId | body: {}",
            body
        )));
    }

    let transact_time = payload.transact_time.ok_or_else(|| {
        SubmissionError::Decode(format!("missing transactTime | body: {}", body))
    })?;
    let submitted_at = Utc
        .timestamp_millis_opt(transact_time)
        .single()
        .ok_or_else(|| SubmissionError::Decode(format!("invalid transactTime {}", transact_time)))?;

    debug!(
        symbol = ?payload.symbol,
        order_id = %order_id,
        "MEXC order acknowledged"
    );

    Ok(OrderAck {
        order_id,
        submitted_at,
    })
}

/// Absent, 0, 200 or "ok" mean success.
fn embedded_code_ok(code: &Value) -> bool {
    match code {
        Value::Null => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(200)),
        Value::String(s) => s.eq_ignore_ascii_case("ok") || s == "0" || s == "200",
        _ => false,
    }
}

fn code_as_i64(code: &Value) -> Option<i64> {
    match code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn normalize_order_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}
