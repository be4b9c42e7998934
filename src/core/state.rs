//! 共享行情/账户状态
//!
//! 由交易所回报异步写入，策略守卫与做市任务只读取快照。
//! 所有读取都可能已过期，调用方不得假设跨两次调用的一致性。

use crate::core::types::{Fill, RestingOrder, SymbolInfo};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct MarketEntry {
    mid_price: Option<f64>,
    info: Option<SymbolInfo>,
}

/// 行情共享状态
#[derive(Debug, Default)]
pub struct MarketDataState {
    entries: RwLock<HashMap<String, MarketEntry>>,
}

impl MarketDataState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入交易对精度
    pub async fn set_symbol_info(&self, symbol: &str, info: SymbolInfo) {
        let mut guard = self.entries.write().await;
        guard.entry(symbol.to_string()).or_default().info = Some(info);
    }

    /// 读取交易对精度
    pub async fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo> {
        self.entries.read().await.get(symbol).and_then(|e| e.info)
    }

    /// 更新中间价
    pub async fn update_price(&self, symbol: &str, mid_price: f64) {
        let mut guard = self.entries.write().await;
        guard.entry(symbol.to_string()).or_default().mid_price = Some(mid_price);
    }

    /// 读取中间价，无数据时返回 None
    pub async fn mid_price(&self, symbol: &str) -> Option<f64> {
        self.entries
            .read()
            .await
            .get(symbol)
            .and_then(|e| e.mid_price)
            .filter(|p| *p > 0.0)
    }
}

#[derive(Debug, Clone, Default)]
struct AccountEntry {
    position: f64,
    orders: HashMap<String, RestingOrder>,
}

/// 账户共享状态：净持仓 + 当前挂单集合
#[derive(Debug, Default)]
pub struct AccountState {
    entries: RwLock<HashMap<String, AccountEntry>>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前净持仓（带符号）
    pub async fn position(&self, symbol: &str) -> f64 {
        self.entries
            .read()
            .await
            .get(symbol)
            .map(|e| e.position)
            .unwrap_or(0.0)
    }

    /// 直接写入本地持仓记录
    pub async fn set_position(&self, symbol: &str, position: f64) {
        let mut guard = self.entries.write().await;
        guard.entry(symbol.to_string()).or_default().position = position;
    }

    /// 应用成交：调整持仓并扣减对应挂单，返回新持仓
    pub async fn apply_fill(&self, fill: &Fill) -> f64 {
        let mut guard = self.entries.write().await;
        let entry = guard.entry(fill.symbol.clone()).or_default();
        entry.position += fill.side.sign() * fill.amount;

        let fully_filled = match entry.orders.get_mut(&fill.order_id) {
            Some(order) => {
                order.amount -= fill.amount;
                order.amount <= f64::EPSILON
            }
            None => false,
        };
        if fully_filled {
            entry.orders.remove(&fill.order_id);
        }

        entry.position
    }

    /// 记录新挂单
    pub async fn insert_order(&self, symbol: &str, order: RestingOrder) {
        let mut guard = self.entries.write().await;
        guard
            .entry(symbol.to_string())
            .or_default()
            .orders
            .insert(order.id.clone(), order);
    }

    /// 移除挂单（撤单或成交）
    pub async fn remove_order(&self, symbol: &str, order_id: &str) -> Option<RestingOrder> {
        let mut guard = self.entries.write().await;
        guard
            .get_mut(symbol)
            .and_then(|entry| entry.orders.remove(order_id))
    }

    /// 清空交易对所有挂单，返回被清除的数量
    pub async fn clear_orders(&self, symbol: &str) -> usize {
        let mut guard = self.entries.write().await;
        match guard.get_mut(symbol) {
            Some(entry) => {
                let count = entry.orders.len();
                entry.orders.clear();
                count
            }
            None => 0,
        }
    }

    pub async fn open_order_count(&self, symbol: &str) -> usize {
        self.entries
            .read()
            .await
            .get(symbol)
            .map(|e| e.orders.len())
            .unwrap_or(0)
    }

    pub async fn open_orders(&self, symbol: &str) -> Vec<RestingOrder> {
        self.entries
            .read()
            .await
            .get(symbol)
            .map(|e| e.orders.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Option<RestingOrder> {
        self.entries
            .read()
            .await
            .get(symbol)
            .and_then(|e| e.orders.get(order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderSide;
    use chrono::Utc;

    fn resting(id: &str, side: OrderSide, amount: f64) -> RestingOrder {
        RestingOrder {
            id: id.to_string(),
            side,
            price: 100.0,
            amount,
            placed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn partial_fill_keeps_order_resting() {
        let account = AccountState::new();
        account
            .insert_order("ETHUSDT", resting("o1", OrderSide::Buy, 2.0))
            .await;

        let fill = Fill {
            order_id: "o1".to_string(),
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Buy,
            price: 100.0,
            amount: 0.5,
            timestamp: Utc::now(),
        };
        assert_eq!(account.apply_fill(&fill).await, 0.5);
        let left = account.get_order("ETHUSDT", "o1").await.unwrap();
        assert!((left.amount - 1.5).abs() < 1e-12);

        let rest = Fill {
            amount: 1.5,
            ..fill
        };
        assert_eq!(account.apply_fill(&rest).await, 2.0);
        assert_eq!(account.open_order_count("ETHUSDT").await, 0);
    }

    #[tokio::test]
    async fn unknown_symbol_reads_as_flat_and_empty() {
        let account = AccountState::new();
        assert_eq!(account.position("XRPUSDT").await, 0.0);
        assert_eq!(account.open_order_count("XRPUSDT").await, 0);
        assert_eq!(account.clear_orders("XRPUSDT").await, 0);

        let market = MarketDataState::new();
        market.update_price("XRPUSDT", 0.0).await;
        assert!(market.mid_price("XRPUSDT").await.is_none());
    }
}
