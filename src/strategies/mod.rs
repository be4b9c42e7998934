// 策略模块
pub mod common;
pub mod stink_bid;

// 导出策略类型
pub use stink_bid::{StinkBidConfig, StinkBidStrategy};
