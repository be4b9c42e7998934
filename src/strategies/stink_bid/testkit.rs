//! 测试用记录器：包装模拟交易所与报价器，把调用顺序写进同一份事件日志

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};
use crate::core::types::*;
use crate::exchanges::PaperExchange;
use crate::strategies::common::application::StrategyDeps;
use crate::utils::order_id::OrderIdGenerator;

use super::config::{LevelParams, TimingConfig};
use super::guards::{OrderGuard, PositionGuard};
use super::quoter::{LevelQuoter, LevelSlot, QuoteOutcome, StinkBidQuoter, WorkerFault};
use super::supervisor::{CycleSupervisor, SupervisorPhase, SupervisorProgress};

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCall {
    CancelAll,
    MarketOrder { side: OrderSide, quantity: f64 },
    LimitOrder { side: OrderSide, price: f64, quantity: f64 },
    CancelOrder { order_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Exchange(ExchangeCall),
    Quote {
        worker: String,
        phase: SupervisorPhase,
        at: Instant,
    },
}

type EventLog = Arc<Mutex<Vec<Event>>>;

/// 记录调用后转发给模拟交易所
pub struct RecordingExchange {
    inner: PaperExchange,
    log: EventLog,
    partial_fill_ratio: Mutex<f64>,
    filled: Mutex<f64>,
}

impl RecordingExchange {
    pub fn inner(&self) -> &PaperExchange {
        &self.inner
    }

    /// 市价单只成交一部分
    pub fn set_partial_fill_ratio(&self, ratio: f64) {
        *self.partial_fill_ratio.lock().unwrap() = ratio;
    }

    pub fn filled_quantity(&self) -> f64 {
        *self.filled.lock().unwrap()
    }

    fn record(&self, call: ExchangeCall) {
        self.log.lock().unwrap().push(Event::Exchange(call));
    }
}

#[async_trait]
impl Exchange for RecordingExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        self.inner.get_symbol_info(symbol).await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<Order> {
        self.record(ExchangeCall::MarketOrder {
            side,
            quantity: amount,
        });
        let ratio = *self.partial_fill_ratio.lock().unwrap();
        let mut order = self
            .inner
            .place_market_order(symbol, side, amount * ratio)
            .await?;
        *self.filled.lock().unwrap() += order.filled;
        if ratio < 1.0 {
            order.amount = amount;
            order.status = OrderStatus::PartiallyFilled;
        }
        Ok(order)
    }

    async fn place_limit_order(&self, request: OrderRequest) -> Result<Order> {
        self.record(ExchangeCall::LimitOrder {
            side: request.side,
            price: request.price.unwrap_or_default(),
            quantity: request.amount,
        });
        self.inner.place_limit_order(request).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        self.record(ExchangeCall::CancelOrder {
            order_id: order_id.to_string(),
        });
        self.inner.cancel_order(symbol, order_id).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize> {
        self.record(ExchangeCall::CancelAll);
        self.inner.cancel_all_orders(symbol).await
    }
}

/// 只记录调用时所处阶段的报价器，不触碰交易所
pub struct RecordingQuoter {
    log: EventLog,
    progress: watch::Receiver<SupervisorProgress>,
}

#[async_trait]
impl LevelQuoter for RecordingQuoter {
    async fn quote(
        &self,
        level: &LevelParams,
        side: OrderSide,
        _slot: &mut LevelSlot,
    ) -> std::result::Result<QuoteOutcome, WorkerFault> {
        let phase = self.progress.borrow().phase;
        self.log.lock().unwrap().push(Event::Quote {
            worker: format!("{}-{}", level.name, side),
            phase,
            at: Instant::now(),
        });
        Ok(QuoteOutcome::Holding)
    }
}

pub struct Harness {
    pub market: Arc<MarketDataState>,
    pub account: Arc<AccountState>,
    pub exchange: Arc<RecordingExchange>,
    log: EventLog,
}

impl Harness {
    pub const SYMBOL: &'static str = "BTCUSDT";

    /// 中间价 100，最小价格变动 0.01
    pub async fn new(step_size: f64) -> Self {
        let h = Self::without_price(step_size).await;
        h.market.update_price(Self::SYMBOL, 100.0).await;
        h
    }

    pub async fn without_price(step_size: f64) -> Self {
        let market = Arc::new(MarketDataState::new());
        let account = Arc::new(AccountState::new());
        let inner = PaperExchange::new(market.clone(), account.clone());
        inner
            .register_symbol(
                Self::SYMBOL,
                SymbolInfo {
                    tick_size: 0.01,
                    step_size,
                },
            )
            .await;
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let exchange = Arc::new(RecordingExchange {
            inner,
            log: log.clone(),
            partial_fill_ratio: Mutex::new(1.0),
            filled: Mutex::new(0.0),
        });
        Self {
            market,
            account,
            exchange,
            log,
        }
    }

    pub fn exchange_dyn(&self) -> Arc<dyn Exchange> {
        self.exchange.clone()
    }

    pub fn deps(&self) -> StrategyDeps {
        StrategyDeps {
            exchange: self.exchange_dyn(),
            market: self.market.clone(),
            account: self.account.clone(),
        }
    }

    pub fn position_guard(&self) -> PositionGuard {
        PositionGuard::new(
            Self::SYMBOL,
            self.exchange_dyn(),
            self.market.clone(),
            self.account.clone(),
        )
    }

    pub fn order_guard(&self) -> OrderGuard {
        OrderGuard::new(Self::SYMBOL, self.exchange_dyn(), self.account.clone())
    }

    pub fn stink_bid_quoter(&self) -> StinkBidQuoter {
        StinkBidQuoter::new(
            Self::SYMBOL,
            self.exchange_dyn(),
            self.market.clone(),
            self.account.clone(),
            Arc::new(OrderIdGenerator::new("stink_bid", "paper")),
        )
    }

    /// 默认节奏（预热5s/窗口30s/等待0.5s），任务每700ms检查一次
    pub fn recording_supervisor(
        &self,
        levels: Vec<LevelParams>,
    ) -> (
        CycleSupervisor,
        watch::Receiver<SupervisorProgress>,
        watch::Sender<bool>,
    ) {
        self.recording_supervisor_with_timing(levels, TimingConfig::default())
    }

    pub fn recording_supervisor_with_timing(
        &self,
        levels: Vec<LevelParams>,
        timing: TimingConfig,
    ) -> (
        CycleSupervisor,
        watch::Receiver<SupervisorProgress>,
        watch::Sender<bool>,
    ) {
        let (progress_tx, progress_rx) = watch::channel(SupervisorProgress::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let quoter = Arc::new(RecordingQuoter {
            log: self.log.clone(),
            progress: progress_rx.clone(),
        });
        let supervisor = CycleSupervisor::new(
            Self::SYMBOL,
            levels,
            timing,
            Duration::from_millis(700),
            self.order_guard(),
            self.position_guard(),
            quoter,
            progress_tx,
            shutdown_rx,
        );
        (supervisor, progress_rx, shutdown_tx)
    }

    /// 直接写入挂单集合，模拟上一轮遗留
    pub async fn seed_resting_orders(&self, ids: &[&str]) {
        for id in ids {
            self.account
                .insert_order(
                    Self::SYMBOL,
                    RestingOrder {
                        id: id.to_string(),
                        side: OrderSide::Buy,
                        price: 90.0,
                        amount: 1.0,
                        placed_at: Utc::now(),
                    },
                )
                .await;
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Exchange(call) => Some(call),
                Event::Quote { .. } => None,
            })
            .collect()
    }

    pub fn market_order_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ExchangeCall::MarketOrder { .. }))
            .count()
    }

    pub fn quote_phases(&self) -> Vec<SupervisorPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Quote { phase, .. } => Some(phase),
                Event::Exchange(_) => None,
            })
            .collect()
    }

    pub fn first_quote_at(&self) -> Option<Instant> {
        self.events().into_iter().find_map(|e| match e {
            Event::Quote { at, .. } => Some(at),
            Event::Exchange(_) => None,
        })
    }
}
