//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("order_uploads_total", "Total number of order uploads");
    metrics::describe_counter!(
        "accrual_fetches_total",
        "Total number of accrual oracle fetches"
    );
    metrics::describe_histogram!(
        "accrual_fetch_duration_seconds",
        "Accrual oracle fetch duration in seconds"
    );
    metrics::describe_counter!(
        "accrual_settlements_total",
        "Total number of accrual settlements"
    );
    metrics::describe_counter!("withdrawals_total", "Total number of withdrawals");
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last background worker run"
    );
    metrics::describe_gauge!(
        "accrual_stalled_orders",
        "Pending orders that reached the accrual attempt limit"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单上传结果（accepted / duplicate / conflict / invalid）
#[inline]
pub fn record_order_upload(outcome: &str) {
    metrics::counter!("order_uploads_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录一次 accrual 查询
#[inline]
pub fn record_accrual_fetch(outcome: &str, duration_secs: f64) {
    metrics::counter!("accrual_fetches_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("accrual_fetch_duration_seconds").record(duration_secs);
}

/// 记录结算结果（settled / already_settled / failed）
#[inline]
pub fn record_accrual_settlement(outcome: &str) {
    metrics::counter!("accrual_settlements_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// 记录提现结果（success / insufficient_funds / error）
#[inline]
pub fn record_withdrawal(outcome: &str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录后台 Worker 最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    metrics::gauge!("worker_last_run_timestamp", "worker" => worker.to_string()).set(now);
}

/// 记录已停止自动轮询的订单数
#[inline]
pub fn set_stalled_orders(count: usize) {
    metrics::gauge!("accrual_stalled_orders").set(count as f64);
}
