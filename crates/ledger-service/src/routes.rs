//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post},
};

use loyalty_shared::observability::middleware as obs_middleware;

use crate::{handlers, state::AppState};

/// 构建用户侧 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/user/orders", post(handlers::orders::upload_order))
        .route("/user/orders", get(handlers::orders::list_orders))
        .route("/user/balance", get(handlers::balance::get_balance))
        .route("/user/balance/withdraw", post(handlers::balance::withdraw))
        .route("/user/withdrawals", get(handlers::balance::list_withdrawals))
}

/// 构建完整应用：API 路由、存活探针与追踪中间件
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(handlers::health::health_check))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
