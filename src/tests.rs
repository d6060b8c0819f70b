#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::config::tests::SAMPLE;
    use crate::context::ExecutionContext;
    use crate::exchange::dry_run::{DRY_RUN_ORDER_ID, DryRunExecutor};
    use crate::exchange::mexc::{build_order_params, canonical_query, sign_payload};
    use crate::model::{DenyReason, InboundMessage, OrderRequest};
    use crate::pipeline::{PipelineOutcome, SignalPipeline};
    use crate::risk_gate::RiskGate;
    use crate::signal_parser::TemplateParser;
    use crate::sizing::NotionalPolicy;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const SIGNAL: &str = "BUYING #TWIF/USDT

MEGA PUMP SIGNAL: #TWIF

Link :- https://www.mexc.com/exchange/TWIF_USDT

Buy and hold for massive profits🚀 Targets: 2000%-5000%";

    fn start_ms() -> i64 {
        Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_parsed_signal_becomes_signed_order() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        let parser = TemplateParser::new(settings.parser.clone());
        let sizing = NotionalPolicy::new(&settings.trading, &settings.target_overrides);

        let signal = parser
            .parse(&InboundMessage::new(1, SIGNAL, Utc::now()))
            .unwrap();
        let order = OrderRequest::market_buy(signal.symbol(), sizing.resolve(signal.symbol()));

        let params = build_order_params(&order, 1_710_000_000_000).unwrap();
        let query = canonical_query(params).unwrap();
        assert_eq!(
            query,
            "quoteOrderQty=120&recvWindow=5000&side=BUY&symbol=TWIFUSDT&timestamp=1710000000000&type=MARKET"
        );

        let signature = sign_payload("secret", &query).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_dry_run_pipeline_end_to_end() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        let (ctx, _clock) = ExecutionContext::new_simulated(start_ms());
        let risk = Arc::new(RiskGate::new(&settings.risk, ctx.time.clone()));
        let executor = Arc::new(DryRunExecutor::new(&ctx));
        let pipeline = SignalPipeline::from_settings(&settings, risk.clone(), executor).unwrap();

        match pipeline.handle(InboundMessage::new(11, SIGNAL, Utc::now())).await {
            PipelineOutcome::Executed {
                symbol,
                notional,
                ack,
            } => {
                assert_eq!(symbol, "TWIFUSDT");
                assert_eq!(notional, dec!(120));
                assert_eq!(ack.order_id, DRY_RUN_ORDER_ID);
                assert_eq!(ack.submitted_at.timestamp_millis(), start_ms());
            }
            other => panic!("expected execution, got {:?}", other),
        }

        assert_eq!(risk.snapshot().daily_trades, 1);
    }

    #[tokio::test]
    async fn test_daily_cap_resets_at_utc_midnight() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        let (ctx, clock) = ExecutionContext::new_simulated(start_ms());
        let risk = Arc::new(RiskGate::new(&settings.risk, ctx.time.clone()));
        let executor = Arc::new(DryRunExecutor::new(&ctx));
        let pipeline = SignalPipeline::from_settings(&settings, risk, executor).unwrap();

        let signal_for = |pair: &str, id: i64| {
            InboundMessage::new(id, SIGNAL.replace("TWIF_USDT", pair), Utc::now())
        };

        for (id, pair) in ["A_USDT", "B_USDT", "C_USDT"].into_iter().enumerate() {
            assert!(pipeline.handle(signal_for(pair, id as i64)).await.is_executed());
        }
        assert!(matches!(
            pipeline.handle(signal_for("D_USDT", 10)).await,
            PipelineOutcome::Denied {
                reason: DenyReason::DailyTradeLimit,
                ..
            }
        ));

        // 18:30 -> 00:00:01 next day
        clock.advance((5 * 3600 + 30 * 60 + 1) * 1000);
        assert!(pipeline.handle(signal_for("D_USDT", 11)).await.is_executed());
    }
}
