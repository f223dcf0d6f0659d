//! 服务层
//!
//! 实现订单登记、积分提现与账本查询的业务逻辑，协调仓储层与积分结算 Worker。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `order_service`: 订单登记与上传
//! - `withdrawal_service`: 积分提现
//! - `query_service`: 账本查询（只读操作）

pub mod dto;
pub mod order_service;
pub mod query_service;
pub mod withdrawal_service;

pub use dto::*;
pub use order_service::OrderService;
pub use query_service::LedgerQueryService;
pub use withdrawal_service::WithdrawalService;
