use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::error::ExecutionError;
use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};
use crate::core::types::{OrderRequest, OrderSide};
use crate::utils::order_id::OrderIdGenerator;
use crate::utils::precision::floor_to_step;

use super::config::LevelParams;

/// 单个做市任务内部的报价错误，只影响该任务本身
#[derive(Error, Debug)]
pub enum WorkerFault {
    #[error("{symbol} 暂无参考价格")]
    NoPrice { symbol: String },

    #[error("{symbol} 缺少交易对精度信息")]
    NoSymbolInfo { symbol: String },

    #[error("{level} 下单数量 {quantity} 小于最小步长 {step_size}")]
    QuantityBelowStep {
        level: String,
        quantity: f64,
        step_size: f64,
    },

    #[error("{level} 目标价格无效: {price}")]
    InvalidTarget { level: String, price: f64 },

    #[error("执行失败: {0}")]
    Execution(#[from] ExecutionError),
}

/// 任务持有的挂单记录
#[derive(Debug, Clone, PartialEq)]
pub struct LiveQuote {
    pub order_id: String,
    pub price: f64,
}

/// 单个 (层级, 方向) 任务的本地状态，随任务创建和销毁
#[derive(Debug, Clone, Default)]
pub struct LevelSlot {
    pub live: Option<LiveQuote>,
    /// 本轮已成交，不再重新挂单
    pub filled: bool,
    pub placed: u32,
}

/// 一次报价检查的结果
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Placed { order_id: String, price: f64 },
    Repriced { order_id: String, price: f64 },
    Holding,
    Filled { order_id: String },
    Idle,
}

/// 层级报价逻辑：每次调用保证该层级该方向至多一张挂单
#[async_trait]
pub trait LevelQuoter: Send + Sync {
    async fn quote(
        &self,
        level: &LevelParams,
        side: OrderSide,
        slot: &mut LevelSlot,
    ) -> Result<QuoteOutcome, WorkerFault>;
}

/// 默认深度挂单报价：中间价外 `distance_bps` 处挂 post-only 限价单，
/// 价格偏离超过 `reprice_bps` 时撤单重挂；成交后本轮不再挂单。
pub struct StinkBidQuoter {
    symbol: String,
    exchange: Arc<dyn Exchange>,
    market: Arc<MarketDataState>,
    account: Arc<AccountState>,
    order_ids: Arc<OrderIdGenerator>,
    post_only: bool,
}

impl StinkBidQuoter {
    pub fn new(
        symbol: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        market: Arc<MarketDataState>,
        account: Arc<AccountState>,
        order_ids: Arc<OrderIdGenerator>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            market,
            account,
            order_ids,
            post_only: true,
        }
    }

    pub fn with_post_only(mut self, post_only: bool) -> Self {
        self.post_only = post_only;
        self
    }

    fn order_tag(level: &LevelParams, side: OrderSide) -> String {
        let side_code = match side {
            OrderSide::Buy => "B",
            OrderSide::Sell => "S",
        };
        format!("{}{}", level.name, side_code)
    }
}

#[async_trait]
impl LevelQuoter for StinkBidQuoter {
    async fn quote(
        &self,
        level: &LevelParams,
        side: OrderSide,
        slot: &mut LevelSlot,
    ) -> Result<QuoteOutcome, WorkerFault> {
        if slot.filled {
            return Ok(QuoteOutcome::Idle);
        }

        let mid_price = self
            .market
            .mid_price(&self.symbol)
            .await
            .ok_or_else(|| WorkerFault::NoPrice {
                symbol: self.symbol.clone(),
            })?;
        let info = self
            .market
            .symbol_info(&self.symbol)
            .await
            .ok_or_else(|| WorkerFault::NoSymbolInfo {
                symbol: self.symbol.clone(),
            })?;
        let target = level.target_price(mid_price, side, info.tick_size);
        if !(target > 0.0 && target.is_finite()) {
            return Err(WorkerFault::InvalidTarget {
                level: level.name.clone(),
                price: target,
            });
        }

        let mut repricing = false;
        if let Some(live) = slot.live.clone() {
            match self.account.get_order(&self.symbol, &live.order_id).await {
                None => {
                    // 挂单已不在集合中，视为成交
                    slot.live = None;
                    slot.filled = true;
                    return Ok(QuoteOutcome::Filled {
                        order_id: live.order_id,
                    });
                }
                Some(resting) => {
                    let drift_bps = (resting.price - target).abs() / target * 10_000.0;
                    if drift_bps <= level.reprice_bps {
                        return Ok(QuoteOutcome::Holding);
                    }
                    log::debug!(
                        "[stink_bid] {}-{} 价格偏离 {:.1}bp，撤单重挂 {} -> {}",
                        level.name,
                        side,
                        drift_bps,
                        resting.price,
                        target
                    );
                    match self.exchange.cancel_order(&self.symbol, &live.order_id).await {
                        Ok(()) => {}
                        Err(ExecutionError::OrderNotFound { .. }) => {
                            slot.live = None;
                            slot.filled = true;
                            return Ok(QuoteOutcome::Filled {
                                order_id: live.order_id,
                            });
                        }
                        Err(e) => return Err(e.into()),
                    }
                    slot.live = None;
                    repricing = true;
                }
            }
        }

        let quantity = floor_to_step(level.quantity, info.step_size);
        if quantity <= 0.0 {
            return Err(WorkerFault::QuantityBelowStep {
                level: level.name.clone(),
                quantity: level.quantity,
                step_size: info.step_size,
            });
        }

        let request = OrderRequest::limit(self.symbol.clone(), side, quantity, target)
            .with_client_order_id(self.order_ids.generate_with_tag(&Self::order_tag(level, side)))
            .with_post_only(self.post_only);
        let order = self.exchange.place_limit_order(request).await?;

        slot.placed += 1;
        slot.live = Some(LiveQuote {
            order_id: order.id.clone(),
            price: target,
        });

        if repricing {
            Ok(QuoteOutcome::Repriced {
                order_id: order.id,
                price: target,
            })
        } else {
            Ok(QuoteOutcome::Placed {
                order_id: order.id,
                price: target,
            })
        }
    }
}
