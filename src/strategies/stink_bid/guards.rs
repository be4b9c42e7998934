//! 轮前守卫：清理残留挂单与残留持仓
//!
//! 正常情况下进入检查时持仓应接近0、挂单集合应为空，
//! 守卫只是兜底；一旦触发即说明上一轮做市没有自行收干净。

use std::sync::Arc;

use serde::Serialize;

use crate::core::error::ExecutionError;
use crate::core::exchange::Exchange;
use crate::core::state::{AccountState, MarketDataState};
use crate::core::types::OrderSide;
use crate::utils::precision::floor_to_step;

/// 一次平仓动作的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenAction {
    pub side: OrderSide,
    pub quantity: f64,
    /// 平仓前记录的持仓
    pub previous_position: f64,
    pub order_id: String,
}

/// 持仓守卫：发现残留持仓时市价平掉
pub struct PositionGuard {
    symbol: String,
    exchange: Arc<dyn Exchange>,
    market: Arc<MarketDataState>,
    account: Arc<AccountState>,
}

impl PositionGuard {
    pub fn new(
        symbol: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        market: Arc<MarketDataState>,
        account: Arc<AccountState>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            market,
            account,
        }
    }

    /// 持仓非0时按数量步长向下取整后市价反向平仓，并把本地持仓记录置0。
    ///
    /// 置0是乐观写入：只代表平仓单已提交，不代表成交已确认。
    /// 下单失败时错误原样返回，本地记录保持不变。
    /// 持仓不足一个步长或不是有限值时返回错误，由主循环停止派发。
    pub async fn flatten_if_needed(&self) -> Result<Option<FlattenAction>, ExecutionError> {
        let position = self.account.position(&self.symbol).await;
        if position == 0.0 {
            return Ok(None);
        }
        if !position.is_finite() {
            log::error!("[guard] ❌ {} 本地持仓记录异常: {}", self.symbol, position);
            return Err(ExecutionError::Other(format!(
                "{} 持仓记录非有限值: {}",
                self.symbol, position
            )));
        }

        let side = if position < 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let step_size = self.step_size().await?;
        let quantity = floor_to_step(position.abs(), step_size);

        // 不足一个步长的残留无法下单，也不能当作已平仓继续做市
        if quantity <= 0.0 {
            log::error!(
                "[guard] ❌ {} 残留持仓 {} 小于最小数量步长 {}，无法平仓",
                self.symbol,
                position,
                step_size
            );
            return Err(ExecutionError::InvalidQuantity {
                symbol: self.symbol.clone(),
                amount: position,
            });
        }

        log::warn!(
            "[guard] ⚠️ {} 检测到残留持仓 {}，市价{}平仓 {}",
            self.symbol,
            position,
            side,
            quantity
        );

        let order = self
            .exchange
            .place_market_order(&self.symbol, side, quantity)
            .await?;

        self.account.set_position(&self.symbol, 0.0).await;

        log::warn!(
            "[guard] ✅ {} 平仓单已提交 {}，本地持仓记录置0",
            self.symbol,
            order.id
        );

        Ok(Some(FlattenAction {
            side,
            quantity,
            previous_position: position,
            order_id: order.id,
        }))
    }

    /// 优先读行情状态中的精度，缺失时向交易所查询并回填
    async fn step_size(&self) -> Result<f64, ExecutionError> {
        if let Some(info) = self.market.symbol_info(&self.symbol).await {
            return Ok(info.step_size);
        }
        let info = self.exchange.get_symbol_info(&self.symbol).await?;
        self.market.set_symbol_info(&self.symbol, info).await;
        Ok(info.step_size)
    }
}

/// 挂单守卫：发现残留挂单时全撤
pub struct OrderGuard {
    symbol: String,
    exchange: Arc<dyn Exchange>,
    account: Arc<AccountState>,
}

impl OrderGuard {
    pub fn new(
        symbol: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        account: Arc<AccountState>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            account,
        }
    }

    /// 挂单数大于0时调用一次全撤，返回检查时看到的挂单数。
    /// 只依赖全撤接口本身的保证，不逐单等待确认。
    pub async fn cancel_all_if_needed(&self) -> Result<Option<usize>, ExecutionError> {
        let count = self.account.open_order_count(&self.symbol).await;
        if count == 0 {
            return Ok(None);
        }

        log::warn!(
            "[guard] ⚠️ {} 发现 {} 个残留挂单，执行全撤",
            self.symbol,
            count
        );
        let confirmed = self.exchange.cancel_all_orders(&self.symbol).await?;
        log::warn!(
            "[guard] ✅ {} 全撤完成，交易所确认 {} 个",
            self.symbol,
            confirmed
        );

        Ok(Some(count))
    }
}
