//! 积分账本服务入口
//!
//! 启动流程：加载配置 → 初始化可观测性 → 连接数据库 → 组装服务 → 启动补偿轮询 → 启动 HTTP 服务

use std::path::Path;
use std::sync::Arc;

use axum::{Json, http::StatusCode, routing::get};
use loyalty_ledger::{
    AccrualWorker, HttpAccrualClient, OrderRepository, PendingOrderPoller, PgLedgerStore,
    ScoreRepository, TransactionRepository, routes, state::AppState,
};
use loyalty_shared::{
    config::AppConfig, database::Database, observability, retry::RetryPolicy,
};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("loyalty-ledger-service")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting loyalty-ledger-service on {}", config.server_addr());

    let db = Database::connect_with_retry(&config.database, &RetryPolicy::default()).await?;
    if config.database.auto_migrate {
        db.run_migrations(Path::new(&config.database.migrations_dir))
            .await?;
    }

    // 仓储与服务只构造一次，通过 Arc 注入
    let order_repo = Arc::new(OrderRepository::new(db.pool().clone()));
    let score_repo = Arc::new(ScoreRepository::new(db.pool().clone()));
    let transaction_repo = Arc::new(TransactionRepository::new(db.pool().clone()));
    let ledger = Arc::new(PgLedgerStore::new(db.pool().clone()));
    let accrual_client = Arc::new(HttpAccrualClient::from_config(&config.accrual)?);

    let accrual_worker = AccrualWorker::from_config(
        accrual_client,
        order_repo.clone(),
        ledger.clone(),
        &config.accrual,
    );
    info!(base_url = %config.accrual.base_url, "AccrualWorker initialized");

    let poller = PendingOrderPoller::from_config(
        accrual_worker.clone(),
        order_repo.clone(),
        &config.accrual,
    );
    let poller_handle = tokio::spawn(async move {
        poller.run().await;
    });

    let state = AppState::assemble(
        order_repo,
        score_repo,
        transaction_repo,
        ledger,
        accrual_worker,
    );

    let app = routes::app(state)
        .route(
            "/ready",
            get({
                let db_for_ready = db.clone();
                move || readiness_check(db_for_ready.clone())
            }),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server.request_timeout(),
        ));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller_handle.abort();
    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

/// 就绪探针：检查数据库连接是否可用
async fn readiness_check(db: Database) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = db.health_check().await.is_ok();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": "loyalty-ledger-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" }
        }
    }));

    (status, body)
}
