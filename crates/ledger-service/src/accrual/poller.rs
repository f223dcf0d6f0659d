//! 待结算订单轮询 Worker
//!
//! 定期扫描仍处于 NEW / PROCESSING 的订单并重新结算，
//! 使得首次查询失败或积分系统尚未给出终态结论的订单最终都能被处理。
//! 结算本身是幂等的，重复处理同一订单不会重复入账。
//!
//! 每轮取最久未处理的订单，处理后即排到队尾；
//! 查询次数达到上限的订单不再轮询，只通过指标与日志暴露出来。

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};

use loyalty_shared::config::AccrualConfig;
use loyalty_shared::observability::metrics;

use super::worker::AccrualWorker;
use crate::error::Result;
use crate::repository::OrderRepositoryTrait;

/// 同一批次内并发结算的订单数
const MAX_CONCURRENT_RESOLVES: usize = 8;

/// 每轮上报的停滞订单数上限
const STALLED_REPORT_LIMIT: i64 = 1_000;

pub struct PendingOrderPoller {
    worker: AccrualWorker,
    orders: Arc<dyn OrderRepositoryTrait>,
    poll_interval: Duration,
    batch_size: i64,
    max_attempts: i32,
}

impl PendingOrderPoller {
    pub fn new(
        worker: AccrualWorker,
        orders: Arc<dyn OrderRepositoryTrait>,
        poll_interval: Duration,
        batch_size: i64,
        max_attempts: i32,
    ) -> Self {
        Self {
            worker,
            orders,
            poll_interval,
            batch_size,
            max_attempts,
        }
    }

    pub fn from_config(
        worker: AccrualWorker,
        orders: Arc<dyn OrderRepositoryTrait>,
        config: &AccrualConfig,
    ) -> Self {
        Self::new(
            worker,
            orders,
            config.poll_interval(),
            config.batch_size,
            config.max_fetch_attempts,
        )
    }

    /// 主循环：持续处理待结算订单直到进程退出
    pub async fn run(&self) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            max_attempts = self.max_attempts,
            "PendingOrderPoller 已启动"
        );

        loop {
            tokio::time::sleep(self.poll_interval).await;

            if let Err(e) = self.run_once().await {
                error!(error = %e, "轮询待结算订单出错");
            }

            if let Err(e) = self.report_stalled().await {
                error!(error = %e, "查询停滞订单出错");
            }

            metrics::set_worker_last_run("pending_order_poller");
        }
    }

    /// 处理一批待结算订单，返回本批次订单数
    pub async fn run_once(&self) -> Result<usize> {
        let pending = self
            .orders
            .list_pending(self.batch_size, self.max_attempts)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let count = pending.len();
        info!(count, "发现待结算订单");

        futures::stream::iter(pending)
            .for_each_concurrent(MAX_CONCURRENT_RESOLVES, |order| {
                let worker = &self.worker;
                async move { worker.run(&order.number, order.user_id).await }
            })
            .await;

        Ok(count)
    }

    /// 上报查询次数已达上限的订单，返回其数量
    pub async fn report_stalled(&self) -> Result<usize> {
        let stalled = self
            .orders
            .list_stalled(self.max_attempts, STALLED_REPORT_LIMIT)
            .await?;

        metrics::set_stalled_orders(stalled.len());
        if !stalled.is_empty() {
            let numbers: Vec<&str> = stalled.iter().map(|o| o.number.as_str()).collect();
            warn!(
                count = stalled.len(),
                max_attempts = self.max_attempts,
                orders = ?numbers,
                "订单查询次数已达上限，停止自动轮询"
            );
        }

        Ok(stalled.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::client::MockAccrualClient;
    use crate::error::LedgerError;
    use crate::models::{AccrualVerdict, OrderStatus};
    use crate::repository::{MemoryLedger, ScoreRepositoryTrait};
    use loyalty_shared::retry::RetryPolicy;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn poller(
        client: MockAccrualClient,
        store: Arc<MemoryLedger>,
        batch_size: i64,
        max_attempts: i32,
    ) -> PendingOrderPoller {
        let worker = AccrualWorker::new(
            Arc::new(client),
            store.clone(),
            store.clone(),
            RetryPolicy::none(),
            Duration::from_secs(5),
        );
        PendingOrderPoller::new(
            worker,
            store,
            Duration::from_secs(30),
            batch_size,
            max_attempts,
        )
    }

    #[tokio::test]
    async fn test_run_once_without_pending_orders() {
        let mut client = MockAccrualClient::new();
        client.expect_fetch().never();
        let store = Arc::new(MemoryLedger::new());

        let processed = poller(client, store, 100, 10).run_once().await.unwrap();
        assert_eq!(processed, 0);
    }

    #[tokio::test]
    async fn test_run_once_settles_pending_orders_once() {
        let store = Arc::new(MemoryLedger::new());
        let user = Uuid::now_v7();
        for number in ["79927398713", "12345678903"] {
            OrderRepositoryTrait::insert(store.as_ref(), number, user)
                .await
                .unwrap();
        }

        let mut client = MockAccrualClient::new();
        client.expect_fetch().times(2).returning(|number| {
            if number == "79927398713" {
                Ok(AccrualVerdict {
                    status: OrderStatus::Processed,
                    accrual: Decimal::from(100),
                })
            } else {
                Err(LedgerError::Integration("HTTP 404".to_string()))
            }
        });
        let poller = poller(client, store.clone(), 100, 10);

        assert_eq!(poller.run_once().await.unwrap(), 2);

        let score = store.get_by_user(user).await.unwrap().unwrap();
        assert_eq!(score.total, Decimal::from(100));

        let pending = store.list_pending(10, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number, "12345678903");
        assert_eq!(pending[0].fetch_attempts, 1);
    }

    #[tokio::test]
    async fn test_undecided_order_does_not_starve_newer_ones() {
        let store = Arc::new(MemoryLedger::new());
        let user = Uuid::now_v7();
        for number in ["79927398713", "12345678903"] {
            OrderRepositoryTrait::insert(store.as_ref(), number, user)
                .await
                .unwrap();
        }

        let mut client = MockAccrualClient::new();
        client.expect_fetch().returning(|number| {
            if number == "79927398713" {
                Ok(AccrualVerdict::unknown())
            } else {
                Ok(AccrualVerdict {
                    status: OrderStatus::Processed,
                    accrual: Decimal::from(100),
                })
            }
        });
        let poller = poller(client, store.clone(), 1, 10);

        for _ in 0..3 {
            poller.run_once().await.unwrap();
        }

        let newer = store.get_by_number("12345678903").await.unwrap().unwrap();
        assert_eq!(newer.status, OrderStatus::Processed);
        let score = store.get_by_user(user).await.unwrap().unwrap();
        assert_eq!(score.total, Decimal::from(100));

        let older = store.get_by_number("79927398713").await.unwrap().unwrap();
        assert_eq!(older.status, OrderStatus::New);
        assert_eq!(older.fetch_attempts, 2);
    }

    #[tokio::test]
    async fn test_orders_stop_polling_at_attempt_cap() {
        let store = Arc::new(MemoryLedger::new());
        OrderRepositoryTrait::insert(store.as_ref(), "79927398713", Uuid::now_v7())
            .await
            .unwrap();

        let mut client = MockAccrualClient::new();
        client
            .expect_fetch()
            .times(3)
            .returning(|_| Err(LedgerError::Integration("HTTP 404".to_string())));
        let poller = poller(client, store.clone(), 10, 3);

        for _ in 0..3 {
            assert_eq!(poller.run_once().await.unwrap(), 1);
        }
        assert_eq!(poller.run_once().await.unwrap(), 0);

        assert_eq!(poller.report_stalled().await.unwrap(), 1);
        let stalled = store.list_stalled(3, 10).await.unwrap();
        assert_eq!(stalled[0].number, "79927398713");
        assert!(stalled[0].last_error.as_deref().unwrap().contains("HTTP 404"));
    }
}
