//! 数据库仓储层
//!
//! 提供订单、积分账户与交易流水的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 单表仓储只负责数据持久化，不包含业务逻辑
//! - 跨表的余额变更统一走 `LedgerStoreTrait`，在一个事务内完成
//! - 定义 trait 接口以支持 mock 测试，`memory` 提供无数据库的完整实现

mod ledger_store;
pub mod memory;
mod order_repo;
mod score_repo;
mod traits;
mod transaction_repo;

pub use ledger_store::PgLedgerStore;
pub use memory::MemoryLedger;
pub use order_repo::OrderRepository;
pub use score_repo::ScoreRepository;
pub use traits::*;
pub use transaction_repo::TransactionRepository;
