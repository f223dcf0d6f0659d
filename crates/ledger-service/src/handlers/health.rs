//! 健康检查

use axum::Json;

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "loyalty-ledger-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;

    use crate::handlers::test_support::{app, body_json, request, send};
    use crate::repository::MemoryLedger;

    #[tokio::test]
    async fn test_health_needs_no_identity() {
        let app = app(Arc::new(MemoryLedger::new()));

        let response = send(&app, request("GET", "/health", None, Body::empty())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
