use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};
use crate::strategies::common::application::{
    deps::StrategyDeps,
    status::{StrategyPosition, StrategyState, StrategyStatus},
    strategy::{Strategy, StrategyInstance},
};
use crate::utils::order_id::OrderIdGenerator;

use super::config::StinkBidConfig;
use super::guards::{OrderGuard, PositionGuard};
use super::quoter::{LevelQuoter, StinkBidQuoter};
use super::supervisor::{CycleSupervisor, SupervisorProgress};

pub struct StinkBidStrategy {
    config: Arc<StinkBidConfig>,
    exchange: Arc<dyn Exchange>,
    market: Arc<MarketDataState>,
    account: Arc<AccountState>,
    quoter: Arc<dyn LevelQuoter>,
    running: Arc<RwLock<bool>>,
    started_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_error: Arc<RwLock<Option<String>>>,
    state: Arc<watch::Sender<StrategyState>>,
    shutdown: watch::Sender<bool>,
    progress: RwLock<Option<watch::Receiver<SupervisorProgress>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StinkBidStrategy {
    fn new(config: StinkBidConfig, deps: StrategyDeps) -> Result<Self> {
        config.validate()?;

        let order_ids = Arc::new(OrderIdGenerator::new(
            &config.strategy.name,
            deps.exchange.name(),
        ));
        let quoter = StinkBidQuoter::new(
            config.trading.symbol.clone(),
            deps.exchange.clone(),
            deps.market.clone(),
            deps.account.clone(),
            order_ids,
        )
        .with_post_only(config.execution.post_only);

        let (state, _) = watch::channel(StrategyState::Initializing);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            exchange: deps.exchange,
            market: deps.market,
            account: deps.account,
            quoter: Arc::new(quoter),
            running: Arc::new(RwLock::new(false)),
            started_at: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
            state: Arc::new(state),
            shutdown,
            progress: RwLock::new(None),
            handle: Mutex::new(None),
        })
    }

    /// 替换层级报价逻辑（必须在 start 之前调用）
    pub fn with_quoter(mut self, quoter: Arc<dyn LevelQuoter>) -> Self {
        self.quoter = quoter;
        self
    }

    fn symbol(&self) -> &str {
        &self.config.trading.symbol
    }

    /// 确保行情状态中有交易对精度
    async fn ensure_symbol_info(&self) -> Result<()> {
        if self.market.symbol_info(self.symbol()).await.is_some() {
            return Ok(());
        }
        let info = self.exchange.get_symbol_info(self.symbol()).await?;
        self.market.set_symbol_info(self.symbol(), info).await;
        log::info!(
            "[stink_bid] {} 精度: tick={} step={}",
            self.symbol(),
            info.tick_size,
            info.step_size
        );
        Ok(())
    }

    async fn cancel_all_on_startup(&self) {
        if !self.config.execution.startup_cancel_all {
            return;
        }
        match self.exchange.cancel_all_orders(self.symbol()).await {
            Ok(count) => log::info!("[stink_bid] 启动时全撤 {} 挂单 {} 个", self.symbol(), count),
            Err(err) => log::warn!("[stink_bid] 启动时取消 {} 挂单失败: {}", self.symbol(), err),
        }
    }

    async fn cancel_all_on_shutdown(&self) {
        if !self.config.execution.shutdown_cancel_all {
            return;
        }
        match self.exchange.cancel_all_orders(self.symbol()).await {
            Ok(count) => log::info!("[stink_bid] 停止时全撤 {} 挂单 {} 个", self.symbol(), count),
            Err(err) => log::warn!("[stink_bid] 停止时取消 {} 挂单失败: {}", self.symbol(), err),
        }
    }

    fn build_supervisor(
        &self,
        progress: watch::Sender<SupervisorProgress>,
    ) -> CycleSupervisor {
        let order_guard = OrderGuard::new(
            self.symbol(),
            self.exchange.clone(),
            self.account.clone(),
        );
        let position_guard = PositionGuard::new(
            self.symbol(),
            self.exchange.clone(),
            self.market.clone(),
            self.account.clone(),
        );
        CycleSupervisor::new(
            self.symbol(),
            self.config.levels.clone(),
            self.config.timing.clone(),
            self.config.execution.worker_poll_interval(),
            order_guard,
            position_guard,
            self.quoter.clone(),
            progress,
            self.shutdown.subscribe(),
        )
    }
}

impl Strategy for StinkBidStrategy {
    type Config = StinkBidConfig;

    fn create(config: Self::Config, deps: StrategyDeps) -> Result<Self> {
        Self::new(config, deps)
    }
}

#[async_trait]
impl StrategyInstance for StinkBidStrategy {
    async fn start(&self) -> Result<()> {
        if !self.config.strategy.enabled {
            log::warn!("[stink_bid] 策略未启用，跳过启动");
            return Ok(());
        }

        {
            let mut running = self.running.write().await;
            if *running {
                return Err(anyhow!("策略 {} 已在运行", self.config.strategy.name));
            }
            *running = true;
        }

        if let Err(e) = self.ensure_symbol_info().await {
            *self.running.write().await = false;
            return Err(e);
        }
        self.cancel_all_on_startup().await;

        *self.started_at.write().await = Some(Utc::now());
        *self.last_error.write().await = None;
        self.shutdown.send_replace(false);

        let (progress_tx, progress_rx) = watch::channel(SupervisorProgress::default());
        *self.progress.write().await = Some(progress_rx);
        let mut supervisor = self.build_supervisor(progress_tx);

        let running = self.running.clone();
        let last_error = self.last_error.clone();
        let state = self.state.clone();
        state.send_replace(StrategyState::Running);

        let handle = tokio::spawn(async move {
            match supervisor.run().await {
                Ok(_) => {
                    state.send_replace(StrategyState::Stopped);
                }
                Err(e) => {
                    *last_error.write().await = Some(e.to_string());
                    *running.write().await = false;
                    state.send_replace(StrategyState::Error);
                }
            }
        });
        *self.handle.lock().await = Some(handle);

        log::info!(
            "[stink_bid] 策略 {} 已启动 | 交易对: {} | 层级: {} | 窗口: {}s",
            self.config.strategy.name,
            self.symbol(),
            self.config.levels.len(),
            self.config.timing.cycle_window_secs
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.running.write().await = false;
        self.shutdown.send_replace(true);

        if let Some(mut handle) = self.handle.lock().await.take() {
            let timeout = Duration::from_secs(self.config.execution.stop_timeout_secs);
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                log::warn!("[stink_bid] 主循环 {:?} 内未退出，强制终止", timeout);
                handle.abort();
            }
        }

        self.cancel_all_on_shutdown().await;

        if *self.state.borrow() != StrategyState::Error {
            self.state.send_replace(StrategyState::Stopped);
        }
        log::info!("[stink_bid] 策略 {} 已停止", self.config.strategy.name);
        Ok(())
    }

    async fn status(&self) -> Result<StrategyStatus> {
        let state = *self.state.borrow();
        let mut status = StrategyStatus::new(self.config.strategy.name.clone())
            .with_state(state)
            .with_positions(vec![StrategyPosition {
                symbol: self.symbol().to_string(),
                net_position: self.account.position(self.symbol()).await,
                open_orders: self.account.open_order_count(self.symbol()).await,
            }]);

        if let Some(progress) = self.progress.read().await.as_ref() {
            let snapshot = progress.borrow().clone();
            status = status
                .with_phase(format!("{:?}", snapshot.phase))
                .with_cycles(snapshot.cycles_completed);
        }
        if let Some(started) = *self.started_at.read().await {
            if let Ok(uptime) = (Utc::now() - started).to_std() {
                status = status.with_uptime(uptime);
            }
        }
        if let Some(err) = self.last_error.read().await.clone() {
            status = status.with_last_error(err);
        }
        Ok(status)
    }

    async fn wait_terminated(&self) -> StrategyState {
        let mut rx = self.state.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{parse_config_str, ConfigFormat};
    use crate::strategies::stink_bid::testkit::{ExchangeCall, Harness};

    fn config() -> StinkBidConfig {
        let text = format!(
            r#"
strategy:
  name: stink_bid_test
trading:
  symbol: {}
timing:
  warmup_secs: 1
  cycle_window_secs: 10
levels:
  - name: L1
    distance_bps: 100
    quantity: 1
  - name: L2
    distance_bps: 300
    quantity: 2
"#,
            Harness::SYMBOL
        );
        parse_config_str(&text, ConfigFormat::Yaml).unwrap()
    }

    fn strategy(h: &Harness, config: StinkBidConfig) -> StinkBidStrategy {
        StinkBidStrategy::create(config, h.deps()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_cycles_and_cleans_up_on_stop() {
        let h = Harness::new(1.0).await;
        let strategy = strategy(&h, config());

        strategy.start().await.unwrap();
        // 预热1s + 0.5s 后进入第一轮窗口
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = strategy.status().await.unwrap();
        assert_eq!(status.state, StrategyState::Running);
        assert_eq!(status.phase.as_deref(), Some("Active"));
        assert_eq!(h.account.open_order_count(Harness::SYMBOL).await, 4);

        // 第二轮开始前守卫会清掉上一轮的挂单
        tokio::time::sleep(Duration::from_secs(10)).await;
        let status = strategy.status().await.unwrap();
        assert_eq!(status.cycles_completed, 1);
        assert!(h.calls().contains(&ExchangeCall::CancelAll));

        strategy.stop().await.unwrap();
        assert_eq!(h.account.open_order_count(Harness::SYMBOL).await, 0);
        assert_eq!(strategy.wait_terminated().await, StrategyState::Stopped);
        assert_eq!(h.calls().last(), Some(&ExchangeCall::CancelAll));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_failure_surfaces_as_error_state() {
        let h = Harness::new(1.0).await;
        let mut cfg = config();
        cfg.execution.startup_cancel_all = false;
        let strategy = strategy(&h, cfg);

        h.account.set_position(Harness::SYMBOL, 3.0).await;
        h.exchange.inner().fail_next_market_order();
        strategy.start().await.unwrap();

        assert_eq!(strategy.wait_terminated().await, StrategyState::Error);
        let status = strategy.status().await.unwrap();
        assert_eq!(status.phase.as_deref(), Some("Failed"));
        assert!(status.last_error.unwrap().contains("拒绝"));
        assert_eq!(h.account.open_order_count(Harness::SYMBOL).await, 0);

        strategy.stop().await.unwrap();
        assert_eq!(strategy.status().await.unwrap().state, StrategyState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_is_rejected() {
        let h = Harness::new(1.0).await;
        let strategy = strategy(&h, config());

        strategy.start().await.unwrap();
        assert!(strategy.start().await.is_err());
        strategy.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_strategy_does_not_start() {
        let h = Harness::new(1.0).await;
        let mut cfg = config();
        cfg.strategy.enabled = false;
        let strategy = strategy(&h, cfg);

        strategy.start().await.unwrap();
        let status = strategy.status().await.unwrap();
        assert_eq!(status.state, StrategyState::Initializing);
        assert!(h.calls().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_at_create() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let h = rt.block_on(Harness::new(1.0));
        let mut cfg = config();
        cfg.levels.clear();
        assert!(StinkBidStrategy::create(cfg, h.deps()).is_err());
    }
}
