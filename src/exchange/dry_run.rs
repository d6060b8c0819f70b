use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::context::{ExecutionContext, TimeProvider};
use crate::exchange::adapter::{OrderExecutor, SubmissionError};
use crate::model::{OrderAck, OrderRequest};

pub const DRY_RUN_ORDER_ID: &str = "dry-run";

/// Logs the order and acknowledges it without any network traffic.
pub struct DryRunExecutor {
    clock: Arc<dyn TimeProvider>,
}

impl DryRunExecutor {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            clock: ctx.time.clone(),
        }
    }
}

#[async_trait]
impl OrderExecutor for DryRunExecutor {
    async fn submit(&self, order: &OrderRequest) -> Result<OrderAck, SubmissionError> {
        if order.notional <= Decimal::ZERO {
            return Err(SubmissionError::InvalidRequest(format!(
                "invalid notional {}",
                order.notional
            )));
        }

        info!(
            symbol = %order.symbol,
            side = order.side.as_str(),
            notional = %order.notional,
            "🧪 DRY RUN order (not sent)"
        );

        Ok(OrderAck {
            order_id: DRY_RUN_ORDER_ID.to_string(),
            submitted_at: self.clock.now(),
        })
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
