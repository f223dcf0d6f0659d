//! 积分计算系统集成
//!
//! - `client`: 积分系统 HTTP 客户端
//! - `worker`: 单个订单的后台结算任务
//! - `poller`: 待结算订单的周期性补偿

pub mod client;
pub mod poller;
pub mod worker;

pub use client::{AccrualClient, HttpAccrualClient, OracleResponse, OracleStatus};
pub use poller::PendingOrderPoller;
pub use worker::AccrualWorker;
