//! 深度挂单做市策略
//!
//! 按固定轮次在中间价外若干层级双边挂 post-only 限价单，
//! 每轮开始前撤掉残留挂单并市价平掉残留仓位。

pub mod config;
pub mod controller;
pub mod guards;
pub mod quoter;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod testkit;

pub use config::{LevelParams, StinkBidConfig};
pub use controller::StinkBidStrategy;
pub use guards::{FlattenAction, OrderGuard, PositionGuard};
pub use quoter::{LevelQuoter, LevelSlot, QuoteOutcome, StinkBidQuoter, WorkerFault};
pub use supervisor::{CycleReport, CycleSupervisor, SupervisorPhase, SupervisorProgress};
pub use worker::{LevelWorker, WorkerExit, WorkerHandle, WorkerId};
