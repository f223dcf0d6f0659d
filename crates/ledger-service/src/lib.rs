//! 积分账本服务
//!
//! 用户上传订单号，服务在后台向积分计算系统查询该订单应得的积分并入账，
//! 用户可以用已入账的积分针对新订单提现。
//!
//! ## 核心功能
//!
//! - **订单登记**：Luhn 校验、订单号全局唯一、区分重复上传与他人冲突
//! - **积分结算**：后台查询积分系统，订单状态、余额与入账流水在一个事务内写入
//! - **积分提现**：行级锁下检查余额并扣减，余额必须严格大于提现金额
//! - **补偿轮询**：周期性重新结算未得到终态结论的订单
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `validation`: 订单号校验
//! - `repository`: 数据库仓储层与内存实现
//! - `accrual`: 积分计算系统客户端与结算 Worker
//! - `service`: 业务服务层
//! - `handlers` / `routes` / `state`: HTTP 接口

pub mod accrual;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod validation;

pub use accrual::{AccrualClient, AccrualWorker, HttpAccrualClient, PendingOrderPoller};
pub use error::{LedgerError, Result};
pub use models::*;
pub use repository::{
    MemoryLedger, OrderRepository, PgLedgerStore, ScoreRepository, TransactionRepository,
};
pub use service::{LedgerQueryService, OrderService, WithdrawalService, dto};
pub use state::AppState;
pub use validation::is_valid_order_number;
