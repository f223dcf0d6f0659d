//! 集成测试共用的模拟积分系统
//!
//! 在随机端口上启动一个 axum 服务，按订单号返回预设的响应序列。
//! 序列中只剩最后一个响应时不再出队，后续请求都返回它。

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// 预设的积分系统响应
#[derive(Debug, Clone)]
pub enum Scripted {
    /// 200 + JSON 响应体
    Body(Value),
    /// 只返回状态码
    Status(StatusCode),
    /// 返回原始文本（用于构造格式错误的响应）
    Raw(StatusCode, String),
    /// 延迟后再返回下一个动作
    Delay(Duration, Box<Scripted>),
}

#[derive(Clone, Default)]
struct OracleState {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    hits: Arc<AtomicUsize>,
}

/// 模拟积分系统
pub struct MockOracle {
    pub addr: SocketAddr,
    state: OracleState,
    _server: tokio::task::JoinHandle<()>,
}

impl MockOracle {
    pub async fn start() -> Self {
        let state = OracleState::default();
        let app = Router::new()
            .route("/api/orders/{number}", get(get_order))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            _server: server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// 为订单号设置响应序列
    pub async fn script(&self, number: &str, responses: Vec<Scripted>) {
        self.state
            .scripts
            .lock()
            .await
            .insert(number.to_string(), responses.into());
    }

    /// 收到的请求总数
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn get_order(State(state): State<OracleState>, Path(number): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let next = {
        let mut scripts = state.scripts.lock().await;
        match scripts.get_mut(&number) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    match next {
        Some(action) => respond(action).await,
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn respond(mut action: Scripted) -> Response {
    loop {
        match action {
            Scripted::Body(body) => return (StatusCode::OK, Json(body)).into_response(),
            Scripted::Status(status) => return status.into_response(),
            Scripted::Raw(status, text) => return (status, text).into_response(),
            Scripted::Delay(delay, then) => {
                tokio::time::sleep(delay).await;
                action = *then;
            }
        }
    }
}

/// 积分系统响应体
pub fn verdict(number: &str, status: &str, accrual: Option<f64>) -> Scripted {
    let mut body = serde_json::json!({ "order": number, "status": status });
    if let Some(accrual) = accrual {
        body["accrual"] = serde_json::json!(accrual);
    }
    Scripted::Body(body)
}
