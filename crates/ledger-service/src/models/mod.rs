//! 积分账本领域模型
//!
//! 包含订单、积分账户和交易流水的实体定义

pub mod enums;
pub mod order;
pub mod score;
pub mod transaction;

// 重新导出常用类型
pub use enums::{OrderStatus, TransactionKind};
pub use order::{AccrualVerdict, Order, OrderOwnership};
pub use score::Score;
pub use transaction::{DebitRecord, Transaction};

/// 金额保留的小数位数，与库表 NUMERIC(20, 2) 一致
pub const AMOUNT_SCALE: u32 = 2;
