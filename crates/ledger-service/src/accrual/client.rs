//! 积分计算系统客户端
//!
//! 通过 `GET {base}/api/orders/{number}` 查询订单积分结论：
//! - 200：返回 `{order, status, accrual}`
//! - 204：积分系统尚不知道该订单
//! - 其他状态码、网络错误、超时、响应格式错误都视为调用失败

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::{debug, instrument};

use loyalty_shared::config::AccrualConfig;
use loyalty_shared::observability::metrics;

use crate::error::{LedgerError, Result};
use crate::models::{AMOUNT_SCALE, AccrualVerdict, OrderStatus};

/// 积分系统返回的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl From<OracleStatus> for OrderStatus {
    fn from(status: OracleStatus) -> Self {
        match status {
            OracleStatus::Registered | OracleStatus::Processing => OrderStatus::Processing,
            OracleStatus::Processed => OrderStatus::Processed,
            OracleStatus::Invalid => OrderStatus::Invalid,
        }
    }
}

/// 积分系统响应体
#[derive(Debug, Clone, Deserialize)]
pub struct OracleResponse {
    pub order: String,
    pub status: OracleStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

impl OracleResponse {
    /// 积分按库表精度四舍五入后再参与入账
    pub fn into_verdict(self) -> AccrualVerdict {
        let accrual = self
            .accrual
            .unwrap_or_default()
            .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);

        AccrualVerdict {
            status: self.status.into(),
            accrual,
        }
    }
}

/// 积分系统客户端接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// 查询订单的积分结论
    async fn fetch(&self, number: &str) -> Result<AccrualVerdict>;
}

/// 基于 reqwest 的积分系统客户端
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// 创建客户端，单次请求超时由 `request_timeout` 控制
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AccrualConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }

    async fn request(&self, number: &str) -> Result<AccrualVerdict> {
        let resp = self
            .client
            .get(self.order_url(number))
            .send()
            .await
            .map_err(map_transport_error)?;

        match resp.status() {
            StatusCode::OK => {
                let body: OracleResponse = resp
                    .json()
                    .await
                    .map_err(|e| LedgerError::Integration(format!("积分系统响应格式错误: {e}")))?;

                if body.order != number {
                    return Err(LedgerError::Integration(format!(
                        "积分系统返回的订单号不匹配: 期望 {number}, 实际 {}",
                        body.order
                    )));
                }

                Ok(body.into_verdict())
            }
            StatusCode::NO_CONTENT => Ok(AccrualVerdict::unknown()),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => Err(
                LedgerError::IntegrationUnavailable(format!("积分系统返回 HTTP {status}")),
            ),
            status => Err(LedgerError::Integration(format!(
                "积分系统返回 HTTP {status}"
            ))),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::IntegrationTimeout
    } else {
        LedgerError::IntegrationUnavailable(format!("积分系统请求失败: {err}"))
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    #[instrument(skip(self))]
    async fn fetch(&self, number: &str) -> Result<AccrualVerdict> {
        let start = Instant::now();
        let result = self.request(number).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(verdict) => verdict.status.as_str(),
            Err(e) => e.error_code(),
        };
        metrics::record_accrual_fetch(outcome, elapsed);
        debug!(order_number = number, outcome, elapsed, "积分系统查询完成");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_status_mapping() {
        assert_eq!(OrderStatus::from(OracleStatus::Registered), OrderStatus::Processing);
        assert_eq!(OrderStatus::from(OracleStatus::Processing), OrderStatus::Processing);
        assert_eq!(OrderStatus::from(OracleStatus::Processed), OrderStatus::Processed);
        assert_eq!(OrderStatus::from(OracleStatus::Invalid), OrderStatus::Invalid);
    }

    #[test]
    fn test_parse_processed_response() {
        let body = r#"{"order":"79927398713","status":"PROCESSED","accrual":729.98}"#;
        let resp: OracleResponse = serde_json::from_str(body).unwrap();
        let verdict = resp.into_verdict();

        assert_eq!(verdict.status, OrderStatus::Processed);
        assert_eq!(verdict.accrual, Decimal::new(72998, 2));
    }

    #[test]
    fn test_accrual_rounded_to_cents() {
        let body = r#"{"order":"79927398713","status":"PROCESSED","accrual":10.125}"#;
        let resp: OracleResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.into_verdict().accrual, Decimal::new(1013, 2));

        let resp = OracleResponse {
            order: "79927398713".to_string(),
            status: OracleStatus::Processed,
            accrual: Some(Decimal::new(1004, 3)),
        };
        assert_eq!(resp.into_verdict().accrual, Decimal::ONE);
    }

    #[test]
    fn test_parse_response_without_accrual() {
        let body = r#"{"order":"79927398713","status":"REGISTERED"}"#;
        let resp: OracleResponse = serde_json::from_str(body).unwrap();
        let verdict = resp.into_verdict();

        assert_eq!(verdict.status, OrderStatus::Processing);
        assert_eq!(verdict.accrual, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let body = r#"{"order":"79927398713","status":"REFUNDED","accrual":1}"#;
        assert!(serde_json::from_str::<OracleResponse>(body).is_err());
    }

    #[test]
    fn test_order_url_trims_trailing_slash() {
        let client =
            HttpAccrualClient::new("http://localhost:8080/", Duration::from_secs(2)).unwrap();
        assert_eq!(
            client.order_url("79927398713"),
            "http://localhost:8080/api/orders/79927398713"
        );
    }
}
