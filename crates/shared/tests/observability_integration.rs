//! 可观测性模块集成测试
//!
//! 测试 metrics 记录函数、HTTP 中间件和配置。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use loyalty_shared::observability::metrics::{
        get_handle, record_accrual_fetch, record_accrual_settlement, record_http_request,
        record_order_upload, record_withdrawal, set_worker_last_run,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/user/orders", 200, 0.05);
        record_http_request("POST", "/api/user/orders", 202, 0.12);
        record_http_request("GET", "/api/user/withdrawals", 204, 0.03);
        record_http_request("POST", "/api/user/balance/withdraw", 402, 0.02);
        record_http_request("POST", "/api/user/orders", 500, 0.25);
    }

    #[test]
    fn test_record_ledger_events() {
        for outcome in ["accepted", "duplicate", "conflict", "invalid"] {
            record_order_upload(outcome);
        }
        record_accrual_fetch("PROCESSED", 0.05);
        record_accrual_fetch("INTEGRATION_TIMEOUT", 5.0);
        for outcome in ["settled", "already_settled", "fetch_failed", "timeout"] {
            record_accrual_settlement(outcome);
        }
        for outcome in ["success", "insufficient_funds", "error"] {
            record_withdrawal(outcome);
        }
        set_worker_last_run("pending_order_poller");
    }

    #[test]
    fn test_handle_absent_without_init() {
        assert!(get_handle().is_none());
    }
}

// ============================================================================
// HTTP 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use loyalty_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"req-42");
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_request_id_as_str() {
        let id = RequestId("test-id-123".to_string());
        assert_eq!(id.as_str(), "test-id-123");
        assert!(format!("{id:?}").contains("test-id-123"));
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use loyalty_shared::observability::ObservabilityConfig;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_with_service_name() {
        let config = ObservabilityConfig::default().with_service_name("loyalty-ledger");
        assert_eq!(config.service_name, "loyalty-ledger");
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use loyalty_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        for _ in 0..10 {
            let guard = ObservabilityGuard::empty();
            drop(guard);
        }
    }
}
