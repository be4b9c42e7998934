use anyhow::Result;
use async_trait::async_trait;

use super::{
    deps::StrategyDeps,
    status::{StrategyState, StrategyStatus},
};

#[async_trait]
pub trait StrategyInstance: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn status(&self) -> Result<StrategyStatus>;
    /// 等待策略自行结束（正常停止或异常退出），返回最终状态
    async fn wait_terminated(&self) -> StrategyState;
}

pub trait Strategy: StrategyInstance + Sized {
    type Config: Send + Sync + 'static;

    fn create(config: Self::Config, deps: StrategyDeps) -> Result<Self>
    where
        Self: Sized;
}
