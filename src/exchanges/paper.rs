//! 模拟撮合交易所
//!
//! 不连接真实交易所，直接读写共享行情/账户状态：
//! 市价单按当前中间价立即成交，限价单进入挂单集合，
//! `on_price` 推进价格时撮合被穿越的挂单。

use crate::core::error::ExecutionError;
use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};
use crate::core::types::*;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

pub struct PaperExchange {
    market: Arc<MarketDataState>,
    account: Arc<AccountState>,
    symbols: RwLock<HashMap<String, SymbolInfo>>,
    sequence: AtomicU64,
    latency: Duration,
    fail_next_market_order: AtomicBool,
    fail_next_cancel_all: AtomicBool,
}

impl PaperExchange {
    pub fn new(market: Arc<MarketDataState>, account: Arc<AccountState>) -> Self {
        Self {
            market,
            account,
            symbols: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            latency: Duration::ZERO,
            fail_next_market_order: AtomicBool::new(false),
            fail_next_cancel_all: AtomicBool::new(false),
        }
    }

    /// 模拟网络往返延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 注册交易对精度，并同步到行情状态
    pub async fn register_symbol(&self, symbol: &str, info: SymbolInfo) {
        self.symbols.write().await.insert(symbol.to_string(), info);
        self.market.set_symbol_info(symbol, info).await;
    }

    /// 下一次市价单返回拒绝
    pub fn fail_next_market_order(&self) {
        self.fail_next_market_order.store(true, Ordering::SeqCst);
    }

    /// 下一次全撤返回网络错误
    pub fn fail_next_cancel_all(&self) {
        self.fail_next_cancel_all.store(true, Ordering::SeqCst);
    }

    /// 推进价格并撮合被穿越的挂单
    pub async fn on_price(&self, symbol: &str, mid_price: f64) -> Vec<Fill> {
        self.market.update_price(symbol, mid_price).await;

        let mut fills = Vec::new();
        for order in self.account.open_orders(symbol).await {
            let crossed = match order.side {
                OrderSide::Buy => mid_price <= order.price,
                OrderSide::Sell => mid_price >= order.price,
            };
            if !crossed {
                continue;
            }
            let fill = Fill {
                order_id: order.id.clone(),
                symbol: symbol.to_string(),
                side: order.side,
                price: order.price,
                amount: order.amount,
                timestamp: Utc::now(),
            };
            let position = self.account.apply_fill(&fill).await;
            log::info!(
                "[paper] 挂单成交 {} {} {:.6} @ {:.6} | 持仓: {:.6}",
                fill.order_id,
                fill.side,
                fill.amount,
                fill.price,
                position
            );
            fills.push(fill);
        }
        fills
    }

    fn next_order_id(&self) -> String {
        format!("P{:08}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        self.symbols
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| ExecutionError::SymbolNotFound(symbol.to_string()))
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<Order> {
        self.simulate_latency().await;

        if self.fail_next_market_order.swap(false, Ordering::SeqCst) {
            return Err(ExecutionError::Rejected {
                symbol: symbol.to_string(),
                reason: "simulated market order rejection".to_string(),
            });
        }
        if amount <= 0.0 || !amount.is_finite() {
            return Err(ExecutionError::InvalidQuantity {
                symbol: symbol.to_string(),
                amount,
            });
        }

        let price = self.market.mid_price(symbol).await;
        let id = self.next_order_id();
        let fill = Fill {
            order_id: id.clone(),
            symbol: symbol.to_string(),
            side,
            price: price.unwrap_or_default(),
            amount,
            timestamp: Utc::now(),
        };
        self.account.apply_fill(&fill).await;

        Ok(Order {
            id,
            client_order_id: None,
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            amount,
            price,
            filled: amount,
            status: OrderStatus::Closed,
            timestamp: fill.timestamp,
        })
    }

    async fn place_limit_order(&self, request: OrderRequest) -> Result<Order> {
        self.simulate_latency().await;

        let price = match request.price {
            Some(p) if p > 0.0 && p.is_finite() => p,
            _ => {
                return Err(ExecutionError::Rejected {
                    symbol: request.symbol.clone(),
                    reason: "limit order without valid price".to_string(),
                })
            }
        };
        if request.amount <= 0.0 || !request.amount.is_finite() {
            return Err(ExecutionError::InvalidQuantity {
                symbol: request.symbol.clone(),
                amount: request.amount,
            });
        }

        // post-only 不能吃单
        if request.post_only.unwrap_or(false) {
            if let Some(mid) = self.market.mid_price(&request.symbol).await {
                let would_take = match request.side {
                    OrderSide::Buy => price >= mid,
                    OrderSide::Sell => price <= mid,
                };
                if would_take {
                    return Err(ExecutionError::Rejected {
                        symbol: request.symbol.clone(),
                        reason: format!("post-only {} @ {} would cross mid {}", request.side, price, mid),
                    });
                }
            }
        }

        let order = Order {
            id: self.next_order_id(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: OrderType::Limit,
            amount: request.amount,
            price: Some(price),
            filled: 0.0,
            status: OrderStatus::Open,
            timestamp: Utc::now(),
        };
        self.account
            .insert_order(&request.symbol, RestingOrder::from(&order))
            .await;
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        self.simulate_latency().await;

        match self.account.remove_order(symbol, order_id).await {
            Some(_) => Ok(()),
            None => Err(ExecutionError::OrderNotFound {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
            }),
        }
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize> {
        self.simulate_latency().await;

        if self.fail_next_cancel_all.swap(false, Ordering::SeqCst) {
            return Err(ExecutionError::Network(
                "simulated cancel-all failure".to_string(),
            ));
        }
        Ok(self.account.clear_orders(symbol).await)
    }
}

/// 随机游走行情源（演练模式）
///
/// 每个 `interval` 以 `step_bps` 为标准幅度推动中间价，直到 `shutdown` 置为 true。
pub fn spawn_random_walk_feed(
    exchange: Arc<PaperExchange>,
    symbol: String,
    start_price: f64,
    step_bps: f64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut price = start_price;
        exchange.on_price(&symbol, price).await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            let shock: f64 = rng.gen_range(-1.0..=1.0);
            price = (price * (1.0 + shock * step_bps / 10_000.0)).max(f64::MIN_POSITIVE);
            exchange.on_price(&symbol, price).await;
        }
        log::debug!("[paper] {} 行情源已停止", symbol);
    })
}
