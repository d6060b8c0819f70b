use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

use crate::config::{ConfigError, LatencyBudget, Settings};
use crate::exchange::adapter::{OrderExecutor, SubmissionError};
use crate::metrics;
use crate::model::{DenyReason, InboundMessage, OrderAck, OrderRequest, OrderType};
use crate::risk_gate::RiskGate;
use crate::signal_parser::{ParseError, TemplateParser};
use crate::sizing::NotionalPolicy;

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Not a signal (or a malformed one).
    Rejected(ParseError),
    Denied {
        symbol: String,
        reason: DenyReason,
    },
    /// Submission failed; the reservation was released.
    Failed {
        symbol: String,
        error: SubmissionError,
    },
    Executed {
        symbol: String,
        notional: Decimal,
        ack: OrderAck,
    },
}

impl PipelineOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, PipelineOutcome::Executed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Rejected(_) => "rejected",
            PipelineOutcome::Denied { .. } => "denied",
            PipelineOutcome::Failed { .. } => "failed",
            PipelineOutcome::Executed { .. } => "executed",
        }
    }
}

/// usage:
/// let pipeline = Arc::new(SignalPipeline::from_settings(&settings, risk, executor)?);
/// pipeline.run(rx, settings.trading.max_in_flight).await;
pub struct SignalPipeline {
    parser: TemplateParser,
    sizing: NotionalPolicy,
    risk: Arc<RiskGate>,
    executor: Arc<dyn OrderExecutor>,
    order_type: OrderType,
    slippage_bps: u32,
    latency: LatencyBudget,
}

impl SignalPipeline {
    pub fn new(
        parser: TemplateParser,
        sizing: NotionalPolicy,
        risk: Arc<RiskGate>,
        executor: Arc<dyn OrderExecutor>,
        order_type: OrderType,
        slippage_bps: u32,
        latency: LatencyBudget,
    ) -> Self {
        Self {
            parser,
            sizing,
            risk,
            executor,
            order_type,
            slippage_bps,
            latency,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        risk: Arc<RiskGate>,
        executor: Arc<dyn OrderExecutor>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TemplateParser::new(settings.parser.clone()),
            NotionalPolicy::new(&settings.trading, &settings.target_overrides),
            risk,
            executor,
            settings.trading.order_type()?,
            settings.trading.slippage_bps,
            settings.latency.clone(),
        ))
    }

    /// Parse, size, admit, submit and record one message.
    pub async fn handle(&self, message: InboundMessage) -> PipelineOutcome {
        metrics::inc_signals_received();

        let parse_started = Instant::now();
        let parsed = self.parser.parse(&message);
        check_budget("parse", parse_started.elapsed(), self.latency.parse_budget_ms, message.id);

        let signal = match parsed {
            Ok(signal) => signal,
            Err(e) => {
                metrics::inc_parse_rejections(e.code());
                info!(message_id = message.id, reason = e.code(), "message ignored: {}", e);
                return PipelineOutcome::Rejected(e);
            }
        };
        let symbol = signal.symbol().to_string();

        let notional = self.sizing.resolve(&symbol);
        let reservation = match self.risk.reserve(&signal, notional) {
            Ok(reservation) => reservation,
            Err(reason) => {
                metrics::inc_risk_denials(reason.code());
                info!(symbol = %symbol, reason = %reason, "signal denied by risk gate");
                return PipelineOutcome::Denied { symbol, reason };
            }
        };

        let mut order = OrderRequest::market_buy(symbol.clone(), reservation.notional());
        order.order_type = self.order_type;
        order.slippage_bps = self.slippage_bps;
        order
            .metadata
            .insert("source_message_id".to_string(), message.id.to_string());
        if let Some(chat_id) = message.chat_id {
            order
                .metadata
                .insert("source_chat_id".to_string(), chat_id.to_string());
        }

        let submit_started = Instant::now();
        let result = self.executor.submit(&order).await;
        let elapsed = submit_started.elapsed();
        metrics::observe_submit_latency(elapsed.as_secs_f64());
        check_budget("order", elapsed, self.latency.order_budget_ms, message.id);

        match result {
            Ok(ack) => {
                let notional = reservation.notional();
                reservation.confirm(notional);
                metrics::inc_orders_executed();
                info!(
                    symbol = %symbol,
                    notional = %notional,
                    order_id = %ack.order_id,
                    executor = self.executor.name(),
                    "✅ Order executed"
                );
                PipelineOutcome::Executed {
                    symbol,
                    notional,
                    ack,
                }
            }
            Err(e) => {
                // Dropping the reservation frees the slot without starting a cooldown.
                drop(reservation);
                metrics::inc_submission_failures(e.code());
                error!(
                    symbol = %symbol,
                    message_id = message.id,
                    retryable = e.is_retryable(),
                    "❌ Order submission failed: {}",
                    e
                );
                PipelineOutcome::Failed { symbol, error: e }
            }
        }
    }

    /// Consume messages until the sender side closes.
    /// With `max_in_flight > 1` messages are dispatched to tasks, still in arrival order.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>, max_in_flight: usize) {
        let max_in_flight = max_in_flight.max(1);
        let limiter = Arc::new(Semaphore::new(max_in_flight));
        info!(max_in_flight, executor = self.executor.name(), "🚀 Pipeline running");

        while let Some(message) = rx.recv().await {
            if max_in_flight == 1 {
                self.handle(message).await;
                continue;
            }

            let permit = match limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let pipeline = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                pipeline.handle(message).await;
            });
        }

        // Wait for dispatched messages to finish.
        let _ = limiter.acquire_many(max_in_flight as u32).await;
        info!("Pipeline input closed");
    }
}

fn check_budget(stage: &str, elapsed: Duration, budget_ms: u64, message_id: i64) {
    if budget_ms > 0 && elapsed > Duration::from_millis(budget_ms) {
        warn!(
            stage,
            message_id,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms,
            "⚠️ Latency budget exceeded"
        );
    }
}
