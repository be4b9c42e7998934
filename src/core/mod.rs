// 核心模块 - 交易类型、执行网关与共享状态
pub mod config;
pub mod error;
pub mod exchange;
pub mod state;
pub mod types;

pub use config::*;
pub use error::*;
pub use exchange::*;
pub use state::{AccountState, MarketDataState};
pub use types::{
    Fill, Order, OrderRequest, OrderSide, OrderStatus, OrderType, RestingOrder, SymbolInfo,
};
