use chrono::{DateTime, Utc};
/// 统一的类型定义模块
/// 做市循环所需的交易数据结构
use serde::{Deserialize, Serialize};

// ============= 基础类型定义 =============

/// 结果类型别名
pub type Result<T> = std::result::Result<T, crate::core::error::ExecutionError>;

// ============= 订单相关 =============

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 仓位变化符号：买入 +1，卖出 -1
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
    PartiallyFilled,
}

/// 订单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub post_only: Option<bool>,
}

impl OrderRequest {
    /// 限价单请求
    pub fn limit(symbol: impl Into<String>, side: OrderSide, amount: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
            client_order_id: None,
            post_only: None,
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    pub fn with_post_only(mut self, post_only: bool) -> Self {
        self.post_only = Some(post_only);
        self
    }
}

/// 订单信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    pub filled: f64,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

/// 挂单快照（共享状态中的订单集合元素）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: String,
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
}

impl From<&Order> for RestingOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            side: order.side,
            price: order.price.unwrap_or_default(),
            amount: order.amount - order.filled,
            placed_at: order.timestamp,
        }
    }
}

/// 成交回报
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

// ============= 交易对信息 =============

/// 交易对精度信息
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// 最小价格变动
    pub tick_size: f64,
    /// 最小数量变动
    pub step_size: f64,
}
