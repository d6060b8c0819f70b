//! MEXC REST submission tests against a mocked endpoint.
//!
//! The simulated clock pins `timestamp`, so the exact signed body is known
//! up front and asserted on the wire.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use signal_execution_rs::config::{Credentials, ModeConfig};
use signal_execution_rs::context::ExecutionContext;
use signal_execution_rs::exchange::adapter::{OrderExecutor, SubmissionError};
use signal_execution_rs::exchange::mexc::{
    MexcExecutor, build_order_params, canonical_query, sign_payload,
};
use signal_execution_rs::model::OrderRequest;

const NOW_MS: i64 = 1_710_000_000_000;
const API_KEY: &str = "mx0-test-key";
const API_SECRET: &str = "mx0-test-secret";

fn executor(base_url: String, market_type: &str) -> MexcExecutor {
    let (ctx, _clock) = ExecutionContext::new_simulated(NOW_MS);
    let mode = ModeConfig {
        exchange: "mexc".to_string(),
        environment: "testnet".to_string(),
        market_type: market_type.to_string(),
        base_url: Some(base_url),
    };
    let credentials = Credentials {
        api_key: API_KEY.to_string(),
        api_secret: API_SECRET.to_string(),
    };
    MexcExecutor::new(credentials, &mode, &ctx).expect("executor")
}

fn signed_body(order: &OrderRequest) -> String {
    let query = canonical_query(build_order_params(order, NOW_MS).unwrap()).unwrap();
    let signature = sign_payload(API_SECRET, &query).unwrap();
    format!("{}&signature={}", query, signature)
}

#[tokio::test]
async fn test_signed_market_order_is_acknowledged() {
    let server = MockServer::start().await;
    let order = OrderRequest::market_buy("TWIFUSDT", dec!(120));

    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(header("X-MEXC-APIKEY", API_KEY))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(signed_body(&order)))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"symbol":"TWIFUSDT","orderId":"C02__1234","orderListId":-1,"transactTime":1710000000456}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let ack = executor(server.uri(), "spot").submit(&order).await.unwrap();

    assert_eq!(ack.order_id, "C02__1234");
    assert_eq!(ack.submitted_at.timestamp_millis(), 1_710_000_000_456);
}

#[tokio::test]
async fn test_http_error_carries_exchange_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"code":30004,"msg":"Insufficient position"}"#,
        ))
        .mount(&server)
        .await;

    let err = executor(server.uri(), "spot")
        .submit(&OrderRequest::market_buy("TWIFUSDT", dec!(100)))
        .await
        .unwrap_err();

    match err {
        SubmissionError::Rejected {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(code, Some(30004));
            assert_eq!(message.as_deref(), Some("Insufficient position"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_error_body_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = executor(server.uri(), "spot")
        .submit(&OrderRequest::market_buy("TWIFUSDT", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Rejected {
            status: 503,
            code: None,
            message: None
        }
    ));
}

#[tokio::test]
async fn test_error_code_inside_http_200_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"code":10007,"msg":"symbol not support api"}"#,
        ))
        .mount(&server)
        .await;

    let err = executor(server.uri(), "spot")
        .submit(&OrderRequest::market_buy("TWIFUSDT", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Rejected {
            status: 200,
            code: Some(10007),
            ..
        }
    ));
}

#[tokio::test]
async fn test_slow_exchange_times_out_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"orderId":"late","transactTime":1}"#)
                .set_delay(Duration::from_secs(7)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(server.uri(), "spot")
        .submit(&OrderRequest::market_buy("TWIFUSDT", dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::Transport {
            timed_out: true,
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_orders_never_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let spot = executor(server.uri(), "spot");
    let err = spot
        .submit(&OrderRequest::market_buy("TWIFUSDT", Decimal::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::InvalidRequest(_)));

    let futures = executor(server.uri(), "futures");
    let err = futures
        .submit(&OrderRequest::market_buy("TWIFUSDT", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Unsupported(_)));
}
