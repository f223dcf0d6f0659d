//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use crate::accrual::AccrualWorker;
use crate::repository::{
    LedgerStoreTrait, OrderRepositoryTrait, ScoreRepositoryTrait, TransactionRepositoryTrait,
};
use crate::service::{LedgerQueryService, OrderService, WithdrawalService};

pub type SharedOrderService = OrderService<dyn OrderRepositoryTrait>;
pub type SharedWithdrawalService = WithdrawalService<dyn OrderRepositoryTrait, dyn LedgerStoreTrait>;
pub type SharedQueryService = LedgerQueryService<
    dyn OrderRepositoryTrait,
    dyn ScoreRepositoryTrait,
    dyn TransactionRepositoryTrait,
>;

/// Axum 应用共享状态
///
/// 所有服务在启动时构造一次，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<SharedOrderService>,
    pub withdrawal_service: Arc<SharedWithdrawalService>,
    pub query_service: Arc<SharedQueryService>,
}

impl AppState {
    pub fn new(
        order_service: Arc<SharedOrderService>,
        withdrawal_service: Arc<SharedWithdrawalService>,
        query_service: Arc<SharedQueryService>,
    ) -> Self {
        Self {
            order_service,
            withdrawal_service,
            query_service,
        }
    }

    /// 由仓储与结算 Worker 组装全部服务
    pub fn assemble(
        order_repo: Arc<dyn OrderRepositoryTrait>,
        score_repo: Arc<dyn ScoreRepositoryTrait>,
        transaction_repo: Arc<dyn TransactionRepositoryTrait>,
        ledger: Arc<dyn LedgerStoreTrait>,
        accrual_worker: AccrualWorker,
    ) -> Self {
        let order_service = Arc::new(OrderService::new(order_repo.clone(), accrual_worker));
        let withdrawal_service = Arc::new(WithdrawalService::new(
            order_service.clone(),
            order_repo.clone(),
            ledger,
        ));
        let query_service = Arc::new(LedgerQueryService::new(
            order_repo,
            score_repo,
            transaction_repo,
        ));

        Self::new(order_service, withdrawal_service, query_service)
    }
}
