use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};

/// 统一的策略依赖容器：执行网关 + 共享行情/账户状态
#[derive(Clone)]
pub struct StrategyDeps {
    pub exchange: Arc<dyn Exchange>,
    pub market: Arc<MarketDataState>,
    pub account: Arc<AccountState>,
}

impl StrategyDeps {
    pub fn builder() -> StrategyDepsBuilder {
        StrategyDepsBuilder::default()
    }
}

/// 构建策略依赖的辅助结构
#[derive(Default)]
pub struct StrategyDepsBuilder {
    exchange: Option<Arc<dyn Exchange>>,
    market: Option<Arc<MarketDataState>>,
    account: Option<Arc<AccountState>>,
}

impl StrategyDepsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn Exchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn with_market_state(mut self, market: Arc<MarketDataState>) -> Self {
        self.market = Some(market);
        self
    }

    pub fn with_account_state(mut self, account: Arc<AccountState>) -> Self {
        self.account = Some(account);
        self
    }

    pub fn build(self) -> Result<StrategyDeps> {
        Ok(StrategyDeps {
            exchange: self
                .exchange
                .ok_or_else(|| anyhow!("StrategyDeps 缺少 exchange"))?,
            market: self
                .market
                .ok_or_else(|| anyhow!("StrategyDeps 缺少 market state"))?,
            account: self
                .account
                .ok_or_else(|| anyhow!("StrategyDeps 缺少 account state"))?,
        })
    }
}
