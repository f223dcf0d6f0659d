//! 订单登记服务
//!
//! - `submit`：校验并登记订单，不区分重复上传者是谁
//! - `upload`：面向用户的上传流程，区分同一用户的重复上传与他人的冲突，并启动后台结算

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use loyalty_shared::observability::metrics;

use crate::accrual::AccrualWorker;
use crate::error::{LedgerError, Result};
use crate::models::Order;
use crate::repository::OrderRepositoryTrait;
use crate::service::dto::UploadOutcome;
use crate::validation::is_valid_order_number;

/// 订单登记服务
pub struct OrderService<R>
where
    R: OrderRepositoryTrait + ?Sized,
{
    order_repo: Arc<R>,
    accrual_worker: AccrualWorker,
}

impl<R> OrderService<R>
where
    R: OrderRepositoryTrait + ?Sized,
{
    pub fn new(order_repo: Arc<R>, accrual_worker: AccrualWorker) -> Self {
        Self {
            order_repo,
            accrual_worker,
        }
    }

    /// 登记订单
    ///
    /// 上传与提现共用的登记入口，空订单号在这里返回 `Validation`。
    /// 订单号已存在时返回 `OrderAlreadyExists`，由调用方判断是否为同一用户。
    /// 并发登记中插入落败时重新读取归属，以唯一约束的结果为准。
    #[instrument(skip(self))]
    pub async fn submit(&self, number: &str, owner_id: Uuid) -> Result<Order> {
        if number.is_empty() {
            return Err(LedgerError::Validation("订单号不能为空".to_string()));
        }

        if let Some(existing) = self.order_repo.exists(number).await? {
            return Err(LedgerError::OrderAlreadyExists {
                number: number.to_string(),
                owner_id: existing.user_id,
            });
        }

        match self.order_repo.insert(number, owner_id).await {
            Ok(order) => Ok(order),
            Err(LedgerError::DuplicateOrder(_)) => {
                let existing = self
                    .order_repo
                    .exists(number)
                    .await?
                    .ok_or_else(|| LedgerError::DuplicateOrder(number.to_string()))?;

                Err(LedgerError::OrderAlreadyExists {
                    number: number.to_string(),
                    owner_id: existing.user_id,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// 用户上传订单
    #[instrument(skip(self))]
    pub async fn upload(&self, number: &str, owner_id: Uuid) -> Result<UploadOutcome> {
        let result = self.admit(number, owner_id).await;

        let outcome = match &result {
            Ok(UploadOutcome::Accepted(_)) => "accepted",
            Ok(UploadOutcome::AlreadyUploaded) => "duplicate",
            Err(LedgerError::OrderOwnedByAnotherUser(_)) => "conflict",
            Err(e) if e.is_business_error() => "invalid",
            Err(_) => "error",
        };
        metrics::record_order_upload(outcome);

        result
    }

    /// 空订单号可以通过校验位检查，由 `submit` 统一拒绝
    async fn admit(&self, number: &str, owner_id: Uuid) -> Result<UploadOutcome> {
        if !is_valid_order_number(number) {
            return Err(LedgerError::InvalidOrderNumber(number.to_string()));
        }

        match self.submit(number, owner_id).await {
            Ok(order) => {
                info!(order_number = number, %owner_id, "订单已登记，启动积分结算");
                self.accrual_worker.schedule(&order);
                Ok(UploadOutcome::Accepted(order))
            }
            Err(LedgerError::OrderAlreadyExists {
                owner_id: existing_owner,
                ..
            }) if existing_owner == owner_id => Ok(UploadOutcome::AlreadyUploaded),
            Err(LedgerError::OrderAlreadyExists { .. }) => {
                warn!(order_number = number, %owner_id, "订单已被其他用户上传");
                Err(LedgerError::OrderOwnedByAnotherUser(number.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::client::MockAccrualClient;
    use crate::models::{AccrualVerdict, OrderOwnership, OrderStatus};
    use crate::repository::{MemoryLedger, MockOrderRepositoryTrait, ScoreRepositoryTrait};
    use loyalty_shared::retry::RetryPolicy;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn worker_with(client: MockAccrualClient, store: Arc<MemoryLedger>) -> AccrualWorker {
        AccrualWorker::new(
            Arc::new(client),
            store.clone(),
            store,
            RetryPolicy::none(),
            Duration::from_secs(5),
        )
    }

    fn idle_worker() -> AccrualWorker {
        let mut client = MockAccrualClient::new();
        client
            .expect_fetch()
            .returning(|_| Ok(AccrualVerdict::unknown()));
        worker_with(client, Arc::new(MemoryLedger::new()))
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_number() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_exists().never();
        let service = OrderService::new(Arc::new(repo), idle_worker());

        let err = service.submit("", Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_reports_existing_owner() {
        let store = Arc::new(MemoryLedger::new());
        let service = OrderService::new(store.clone(), idle_worker());
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        service.submit("79927398713", first).await.unwrap();

        for caller in [first, second] {
            let err = service.submit("79927398713", caller).await.unwrap_err();
            assert!(matches!(
                err,
                LedgerError::OrderAlreadyExists { ref number, owner_id }
                    if number == "79927398713" && owner_id == first
            ));
        }
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_submit_lost_insert_race_rereads_owner() {
        let winner = Uuid::now_v7();
        let order_id = Uuid::now_v7();
        let mut repo = MockOrderRepositoryTrait::new();
        let mut exists_calls = 0;
        repo.expect_exists().times(2).returning(move |_| {
            exists_calls += 1;
            Ok((exists_calls > 1).then_some(OrderOwnership {
                order_id,
                user_id: winner,
            }))
        });
        repo.expect_insert()
            .times(1)
            .returning(|number, _| Err(LedgerError::DuplicateOrder(number.to_string())));
        let service = OrderService::new(Arc::new(repo), idle_worker());

        let err = service
            .submit("79927398713", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OrderAlreadyExists { owner_id, .. } if owner_id == winner
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_checksum_before_store_access() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_exists().never();
        repo.expect_insert().never();
        let service = OrderService::new(Arc::new(repo), idle_worker());

        let err = service
            .upload("79927398710", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOrderNumber(_)));

        let err = service.upload("", Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_same_owner_is_benign_duplicate() {
        let store = Arc::new(MemoryLedger::new());
        let service = OrderService::new(store.clone(), idle_worker());
        let owner = Uuid::now_v7();

        let first = service.upload("79927398713", owner).await.unwrap();
        let second = service.upload("79927398713", owner).await.unwrap();

        assert!(matches!(first, UploadOutcome::Accepted(ref o) if o.status == OrderStatus::New));
        assert_eq!(second, UploadOutcome::AlreadyUploaded);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_upload_other_owner_conflicts() {
        let store = Arc::new(MemoryLedger::new());
        let service = OrderService::new(store.clone(), idle_worker());

        service.upload("79927398713", Uuid::now_v7()).await.unwrap();
        let err = service
            .upload("79927398713", Uuid::now_v7())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::OrderOwnedByAnotherUser(_)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_upload_schedules_accrual_settlement() {
        let store = Arc::new(MemoryLedger::new());
        let mut client = MockAccrualClient::new();
        client.expect_fetch().times(1).returning(|_| {
            Ok(AccrualVerdict {
                status: OrderStatus::Processed,
                accrual: Decimal::from(500),
            })
        });
        let service = OrderService::new(store.clone(), worker_with(client, store.clone()));
        let owner = Uuid::now_v7();

        service.upload("79927398713", owner).await.unwrap();

        let mut settled = None;
        for _ in 0..100 {
            settled = store.get_by_user(owner).await.unwrap();
            if settled.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(settled.map(|s| s.total), Some(Decimal::from(500)));
    }
}
