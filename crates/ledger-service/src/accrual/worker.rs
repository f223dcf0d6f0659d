//! 积分结算 Worker
//!
//! 订单登记成功后在后台查询积分系统并结算：
//! 1. 带重试地查询积分结论（单次请求超时由客户端控制）
//! 2. 在一个事务内写入订单状态、余额与入账流水
//!
//! 后台任务与触发它的请求解耦，拥有独立的整体超时。
//! 查询失败只记录在订单上，不会返回给上传订单的用户。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use loyalty_shared::config::AccrualConfig;
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};

use super::client::AccrualClient;
use crate::error::{LedgerError, Result};
use crate::models::Order;
use crate::repository::{LedgerStoreTrait, OrderRepositoryTrait, SettlementOutcome};

/// 积分结算 Worker
#[derive(Clone)]
pub struct AccrualWorker {
    client: Arc<dyn AccrualClient>,
    orders: Arc<dyn OrderRepositoryTrait>,
    ledger: Arc<dyn LedgerStoreTrait>,
    retry_policy: RetryPolicy,
    /// 单个后台任务的整体期限
    task_timeout: Duration,
}

impl AccrualWorker {
    pub fn new(
        client: Arc<dyn AccrualClient>,
        orders: Arc<dyn OrderRepositoryTrait>,
        ledger: Arc<dyn LedgerStoreTrait>,
        retry_policy: RetryPolicy,
        task_timeout: Duration,
    ) -> Self {
        Self {
            client,
            orders,
            ledger,
            retry_policy,
            task_timeout,
        }
    }

    pub fn from_config(
        client: Arc<dyn AccrualClient>,
        orders: Arc<dyn OrderRepositoryTrait>,
        ledger: Arc<dyn LedgerStoreTrait>,
        config: &AccrualConfig,
    ) -> Self {
        Self::new(
            client,
            orders,
            ledger,
            config.retry_policy(),
            config.task_timeout(),
        )
    }

    /// 为订单启动后台结算任务
    ///
    /// 任务与调用方的生命周期无关，调用方取消不会中断结算
    pub fn schedule(&self, order: &Order) -> JoinHandle<()> {
        let worker = self.clone();
        let number = order.number.clone();
        let user_id = order.user_id;
        let span = info_span!("accrual_task", order_number = %number, %user_id);

        tokio::spawn(async move { worker.run(&number, user_id).await }.instrument(span))
    }

    /// 在整体期限内完成一次结算，失败只记录不返回
    pub async fn run(&self, number: &str, user_id: Uuid) {
        match tokio::time::timeout(self.task_timeout, self.resolve(number, user_id)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(order_number = number, error = %e, "订单积分结算失败");
            }
            Err(_) => {
                warn!(
                    order_number = number,
                    timeout = ?self.task_timeout,
                    "订单积分结算超时"
                );
                metrics::record_accrual_settlement("timeout");
                self.record_failure(number, &LedgerError::IntegrationTimeout)
                    .await;
            }
        }
    }

    /// 查询积分结论并结算
    pub async fn resolve(&self, number: &str, user_id: Uuid) -> Result<SettlementOutcome> {
        let verdict = retry_with_policy(
            &self.retry_policy,
            "accrual_fetch",
            LedgerError::is_retryable,
            move || self.client.fetch(number),
        )
        .await;

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(e) => {
                metrics::record_accrual_settlement("fetch_failed");
                self.record_failure(number, &e).await;
                return Err(e);
            }
        };

        let outcome = match self.ledger.settle_accrual(number, user_id, verdict).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order_number = number, error = %e, "写入结算结果失败，事务已回滚");
                metrics::record_accrual_settlement("failed");
                self.record_failure(number, &e).await;
                return Err(e);
            }
        };

        match outcome {
            SettlementOutcome::Applied { status, credited } => {
                info!(
                    order_number = number,
                    %status,
                    credited = ?credited,
                    "订单积分结论已写入"
                );
                metrics::record_accrual_settlement("settled");
            }
            SettlementOutcome::AlreadySettled(status) => {
                info!(order_number = number, %status, "订单已是终态，跳过结算");
                metrics::record_accrual_settlement("already_settled");
            }
            SettlementOutcome::OrderMissing => {
                warn!(order_number = number, %user_id, "结算时未找到订单");
                metrics::record_accrual_settlement("order_missing");
            }
        }

        Ok(outcome)
    }

    /// 把失败原因记录到订单上，记录本身失败时只打日志
    async fn record_failure(&self, number: &str, err: &LedgerError) {
        if let Err(e) = self
            .orders
            .record_fetch_failure(number, &err.to_string())
            .await
        {
            error!(order_number = number, error = %e, "记录积分查询失败原因出错");
        }
    }
}
